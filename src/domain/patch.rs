// Copyright (c) 2025 - Cowboy AI, Inc.
//! Create Attributes and Update Patches
//!
//! These are the only shapes a caller can write through. Derived fields
//! (counters, capacity, denormalized refs and names) have no slot here.
//!
//! Patch fields are `None` for "leave unchanged". Nullable references use
//! `Option<Option<_>>` so `Some(None)` clears them.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::ids::{DatacenterId, EntityKind, RackId, RoomId, ServiceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDatacenter {
    pub name: String,
    /// Defaults to the configured datacenter height
    pub height: Option<u32>,
}

impl NewDatacenter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub name: String,
    pub datacenter: DatacenterId,
    /// Defaults to the datacenter height
    pub height: Option<u32>,
}

impl NewRoom {
    pub fn new(name: impl Into<String>, datacenter: DatacenterId) -> Self {
        Self {
            name: name.into(),
            datacenter,
            height: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRack {
    pub name: String,
    pub room: RoomId,
    /// Defaults to the configured rack height
    pub height: Option<u32>,
    pub service: Option<ServiceId>,
}

impl NewRack {
    pub fn new(name: impl Into<String>, room: RoomId) -> Self {
        Self {
            name: name.into(),
            room,
            height: None,
            service: None,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_service(mut self, service: ServiceId) -> Self {
        self.service = Some(service);
        self
    }
}

/// How a new host obtains its address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressRequest {
    /// No address
    #[default]
    None,
    /// This specific pool entry
    Explicit(Ipv4Addr),
    /// Highest free entry of the host's service, if any
    Auto,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHost {
    pub name: String,
    pub rack: RackId,
    pub height: u32,
    /// Lowest free run of `height` units when absent
    pub position: Option<u32>,
    pub running: bool,
    /// Defaults to the rack's service
    pub service: Option<ServiceId>,
    pub address: AddressRequest,
}

impl NewHost {
    pub fn new(name: impl Into<String>, rack: RackId, height: u32) -> Self {
        Self {
            name: name.into(),
            rack,
            height,
            position: None,
            running: true,
            service: None,
            address: AddressRequest::None,
        }
    }

    pub fn at(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_service(mut self, service: ServiceId) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_address(mut self, address: AddressRequest) -> Self {
        self.address = address;
        self
    }

    pub fn stopped(mut self) -> Self {
        self.running = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub owner: String,
}

impl NewService {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterPatch {
    pub name: Option<String>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub height: Option<u32>,
    pub datacenter: Option<DatacenterId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackPatch {
    pub name: Option<String>,
    pub height: Option<u32>,
    pub room: Option<RoomId>,
    pub service: Option<Option<ServiceId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPatch {
    pub name: Option<String>,
    pub height: Option<u32>,
    pub running: Option<bool>,
    pub rack: Option<RackId>,
    pub position: Option<u32>,
    pub service: Option<Option<ServiceId>>,
    pub ip: Option<Option<Ipv4Addr>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub owner: Option<String>,
}

/// Patch for any updatable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPatch {
    Datacenter(DatacenterPatch),
    Room(RoomPatch),
    Rack(RackPatch),
    Host(HostPatch),
    Service(ServicePatch),
}

impl EntityPatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityPatch::Datacenter(_) => EntityKind::Datacenter,
            EntityPatch::Room(_) => EntityKind::Room,
            EntityPatch::Rack(_) => EntityKind::Rack,
            EntityPatch::Host(_) => EntityKind::Host,
            EntityPatch::Service(_) => EntityKind::Service,
        }
    }

    /// Rename of any kind
    pub fn rename(kind: EntityKind, name: impl Into<String>) -> Option<Self> {
        let name = Some(name.into());
        match kind {
            EntityKind::Datacenter => Some(EntityPatch::Datacenter(DatacenterPatch {
                name,
                ..Default::default()
            })),
            EntityKind::Room => Some(EntityPatch::Room(RoomPatch {
                name,
                ..Default::default()
            })),
            EntityKind::Rack => Some(EntityPatch::Rack(RackPatch {
                name,
                ..Default::default()
            })),
            EntityKind::Host => Some(EntityPatch::Host(HostPatch {
                name,
                ..Default::default()
            })),
            EntityKind::Service => Some(EntityPatch::Service(ServicePatch {
                name,
                ..Default::default()
            })),
            EntityKind::Address => None,
        }
    }
}

impl From<DatacenterPatch> for EntityPatch {
    fn from(patch: DatacenterPatch) -> Self {
        EntityPatch::Datacenter(patch)
    }
}

impl From<RoomPatch> for EntityPatch {
    fn from(patch: RoomPatch) -> Self {
        EntityPatch::Room(patch)
    }
}

impl From<RackPatch> for EntityPatch {
    fn from(patch: RackPatch) -> Self {
        EntityPatch::Rack(patch)
    }
}

impl From<HostPatch> for EntityPatch {
    fn from(patch: HostPatch) -> Self {
        EntityPatch::Host(patch)
    }
}

impl From<ServicePatch> for EntityPatch {
    fn from(patch: ServicePatch) -> Self {
        EntityPatch::Service(patch)
    }
}
