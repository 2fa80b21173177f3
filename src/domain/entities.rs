// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Records
//!
//! The physical hierarchy `Datacenter → Room → Rack → Host`, plus services
//! that lease racks/hosts and the per-service address pool.
//!
//! # Derived Fields
//!
//! Counters (`*_count`), rack `capacity` and every denormalized reference
//! (`dc_id`/`room_id` on racks and hosts, all `*_name` copies) are owned by
//! the cascade engine. Callers never write them; patches have no field for
//! them.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::ops::Range;

use super::ids::{DatacenterId, EntityId, EntityKind, HostId, RackId, RoomId, ServiceId};

/// Top of the physical hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datacenter {
    pub id: DatacenterId,
    pub name: String,
    pub height: u32,

    /// Derived: live rooms in this datacenter
    pub rooms_count: u64,
    /// Derived: live racks in this datacenter (full recount per transaction)
    pub racks_count: u64,
    /// Derived: live hosts in this datacenter (full recount per transaction)
    pub hosts_count: u64,
}

/// Room inside a datacenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub height: u32,
    pub dc_id: DatacenterId,

    /// Derived copy of the datacenter name
    pub dc_name: String,
    pub racks_count: u64,
    pub hosts_count: u64,
}

/// Rack inside a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub height: u32,
    pub room_id: RoomId,
    pub service_id: Option<ServiceId>,

    /// Derived: free rack units (height minus occupied units)
    pub capacity: u32,
    /// Derived: always the room's datacenter
    pub dc_id: DatacenterId,
    pub room_name: String,
    pub dc_name: String,
    pub service_name: Option<String>,
    pub hosts_count: u64,
}

/// Host mounted in a rack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub height: u32,
    /// First rack unit occupied (1-based)
    pub position: u32,
    pub running: bool,
    pub rack_id: RackId,
    pub service_id: Option<ServiceId>,

    /// Written only by the address allocator
    pub ip: Option<Ipv4Addr>,

    /// Derived: always copied from the current rack
    pub room_id: RoomId,
    pub dc_id: DatacenterId,
    pub rack_name: String,
    pub room_name: String,
    pub dc_name: String,
    pub service_name: Option<String>,
}

impl Host {
    /// Rack units occupied: `[position, position + height)`
    pub fn slots(&self) -> Range<u32> {
        self.position..self.position + self.height
    }

    /// Whether this host overlaps the given slot range
    pub fn overlaps(&self, position: u32, height: u32) -> bool {
        let other = position..position + height;
        self.slots().start < other.end && other.start < self.slots().end
    }
}

/// Tenant leasing racks, hosts and addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    /// Opaque reference to the owning user
    pub owner: String,

    pub racks_count: u64,
    pub hosts_count: u64,
    /// Derived: entries in this service's address pool
    pub ips_count: u64,
}

/// Allocation state of a pool entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AddressState {
    Free,
    Assigned { host: HostId },
}

/// One allocatable address owned by a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub address: Ipv4Addr,
    pub service_id: ServiceId,
    pub state: AddressState,
}

impl PoolEntry {
    pub fn is_assigned(&self) -> bool {
        matches!(self.state, AddressState::Assigned { .. })
    }

    /// Host currently bound to this address
    pub fn bound_host(&self) -> Option<HostId> {
        match self.state {
            AddressState::Assigned { host } => Some(host),
            AddressState::Free => None,
        }
    }
}

/// Any inventory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Datacenter(Datacenter),
    Room(Room),
    Rack(Rack),
    Host(Host),
    Service(Service),
    Address(PoolEntry),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Datacenter(dc) => dc.id.into(),
            Entity::Room(room) => room.id.into(),
            Entity::Rack(rack) => rack.id.into(),
            Entity::Host(host) => host.id.into(),
            Entity::Service(service) => service.id.into(),
            Entity::Address(entry) => entry.address.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.id().kind()
    }

    /// Unique name within the kind (pool entries are named by address)
    pub fn name(&self) -> String {
        match self {
            Entity::Datacenter(dc) => dc.name.clone(),
            Entity::Room(room) => room.name.clone(),
            Entity::Rack(rack) => rack.name.clone(),
            Entity::Host(host) => host.name.clone(),
            Entity::Service(service) => service.name.clone(),
            Entity::Address(entry) => entry.address.to_string(),
        }
    }
}
