// Copyright (c) 2025 - Cowboy AI, Inc.
//! Typed identifiers for inventory records
//!
//! Each record kind gets its own UUID v7 newtype so a `RackId` can never be
//! handed where a `RoomId` is expected. [`EntityId`] is the tagged union used
//! by the generic `get`/`update`/`delete` operations; pool entries are keyed
//! by their address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use uuid::Uuid;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Allocate a fresh time-ordered identifier
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }
    };
}

typed_id!(
    /// Datacenter identifier
    DatacenterId,
    "dc"
);
typed_id!(
    /// Room identifier
    RoomId,
    "room"
);
typed_id!(
    /// Rack identifier
    RackId,
    "rack"
);
typed_id!(
    /// Host identifier
    HostId,
    "host"
);
typed_id!(
    /// Service identifier
    ServiceId,
    "service"
);

/// Kind of inventory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Datacenter,
    Room,
    Rack,
    Host,
    Service,
    Address,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Datacenter => "datacenter",
            EntityKind::Room => "room",
            EntityKind::Rack => "rack",
            EntityKind::Host => "host",
            EntityKind::Service => "service",
            EntityKind::Address => "address",
        };
        f.write_str(name)
    }
}

/// Identifier of any inventory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    Datacenter(DatacenterId),
    Room(RoomId),
    Rack(RackId),
    Host(HostId),
    Service(ServiceId),
    Address(Ipv4Addr),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Datacenter(_) => EntityKind::Datacenter,
            EntityId::Room(_) => EntityKind::Room,
            EntityId::Rack(_) => EntityKind::Rack,
            EntityId::Host(_) => EntityKind::Host,
            EntityId::Service(_) => EntityKind::Service,
            EntityId::Address(_) => EntityKind::Address,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Datacenter(id) => write!(f, "{}", id),
            EntityId::Room(id) => write!(f, "{}", id),
            EntityId::Rack(id) => write!(f, "{}", id),
            EntityId::Host(id) => write!(f, "{}", id),
            EntityId::Service(id) => write!(f, "{}", id),
            EntityId::Address(ip) => write!(f, "address:{}", ip),
        }
    }
}

impl From<DatacenterId> for EntityId {
    fn from(id: DatacenterId) -> Self {
        EntityId::Datacenter(id)
    }
}

impl From<RoomId> for EntityId {
    fn from(id: RoomId) -> Self {
        EntityId::Room(id)
    }
}

impl From<RackId> for EntityId {
    fn from(id: RackId) -> Self {
        EntityId::Rack(id)
    }
}

impl From<HostId> for EntityId {
    fn from(id: HostId) -> Self {
        EntityId::Host(id)
    }
}

impl From<ServiceId> for EntityId {
    fn from(id: ServiceId) -> Self {
        EntityId::Service(id)
    }
}

impl From<Ipv4Addr> for EntityId {
    fn from(ip: Ipv4Addr) -> Self {
        EntityId::Address(ip)
    }
}
