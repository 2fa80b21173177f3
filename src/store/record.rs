// Copyright (c) 2025 - Cowboy AI, Inc.
//! Generic access to record tables
//!
//! [`Record`] lets [`Transaction`](super::Transaction) read and stage any
//! kind through one code path: the committed table, the staged overlay slot
//! and the lock scope that covers a record.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::transaction::Overlay;
use super::Inventory;
use crate::domain::{
    Datacenter, DatacenterId, Entity, EntityId, EntityKind, Host, HostId, PoolEntry, Rack, RackId,
    Room, RoomId, Service, ServiceId,
};
use crate::locks::LockScope;

/// A storable inventory record
pub(crate) trait Record: Clone + PartialEq {
    type Id: Copy + Ord + Into<EntityId>;

    const KIND: EntityKind;

    fn key(&self) -> Self::Id;

    /// Unique name, if the kind is named
    fn name(&self) -> Option<&str>;

    /// Scope a transaction must hold to read or write this record
    fn scope(&self) -> LockScope;

    /// Scope covering the slot of `id` even when no record exists
    fn slot_scope(_id: Self::Id) -> Option<LockScope> {
        None
    }

    fn from_entity_id(id: EntityId) -> Option<Self::Id>;

    fn into_entity(self) -> Entity;

    fn table(inventory: &Inventory) -> &BTreeMap<Self::Id, Self>;

    fn staged(overlay: &Overlay) -> &BTreeMap<Self::Id, Option<Self>>;

    fn staged_mut(overlay: &mut Overlay) -> &mut BTreeMap<Self::Id, Option<Self>>;
}

macro_rules! record {
    ($ty:ty, $id:ty, $kind:ident, $table:ident, |$this:ident| $scope:expr) => {
        impl Record for $ty {
            type Id = $id;

            const KIND: EntityKind = EntityKind::$kind;

            fn key(&self) -> Self::Id {
                self.id
            }

            fn name(&self) -> Option<&str> {
                Some(&self.name)
            }

            fn scope(&self) -> LockScope {
                let $this = self;
                $scope
            }

            fn from_entity_id(id: EntityId) -> Option<Self::Id> {
                match id {
                    EntityId::$kind(id) => Some(id),
                    _ => None,
                }
            }

            fn into_entity(self) -> Entity {
                Entity::$kind(self)
            }

            fn table(inventory: &Inventory) -> &BTreeMap<Self::Id, Self> {
                &inventory.$table
            }

            fn staged(overlay: &Overlay) -> &BTreeMap<Self::Id, Option<Self>> {
                &overlay.$table
            }

            fn staged_mut(overlay: &mut Overlay) -> &mut BTreeMap<Self::Id, Option<Self>> {
                &mut overlay.$table
            }
        }
    };
}

record!(Datacenter, DatacenterId, Datacenter, datacenters, |dc| {
    LockScope::Datacenter(dc.id)
});
record!(Room, RoomId, Room, rooms, |room| LockScope::Datacenter(room.dc_id));
record!(Rack, RackId, Rack, racks, |rack| LockScope::Datacenter(rack.dc_id));
record!(Host, HostId, Host, hosts, |host| LockScope::Datacenter(host.dc_id));
record!(Service, ServiceId, Service, services, |service| {
    LockScope::Service(service.id)
});

impl Record for PoolEntry {
    type Id = Ipv4Addr;

    const KIND: EntityKind = EntityKind::Address;

    fn key(&self) -> Self::Id {
        self.address
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn scope(&self) -> LockScope {
        LockScope::Address(self.address)
    }

    fn slot_scope(id: Self::Id) -> Option<LockScope> {
        Some(LockScope::Address(id))
    }

    fn from_entity_id(id: EntityId) -> Option<Self::Id> {
        match id {
            EntityId::Address(ip) => Some(ip),
            _ => None,
        }
    }

    fn into_entity(self) -> Entity {
        Entity::Address(self)
    }

    fn table(inventory: &Inventory) -> &BTreeMap<Self::Id, Self> {
        &inventory.pool
    }

    fn staged(overlay: &Overlay) -> &BTreeMap<Self::Id, Option<Self>> {
        &overlay.pool
    }

    fn staged_mut(overlay: &mut Overlay) -> &mut BTreeMap<Self::Id, Option<Self>> {
        &mut overlay.pool
    }
}
