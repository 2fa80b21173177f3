// Copyright (c) 2025 - Cowboy AI, Inc.
//! Entity Store
//!
//! [`Inventory`] is the committed state: one ordered table per record kind,
//! a parent → children index per relationship and the unique-name index.
//! It is only ever changed by [`Inventory::apply`] with the whole-record
//! writes of one committed transaction, so every index update happens in
//! exactly one place.
//!
//! # Architecture
//!
//! ```text
//! Operation → Transaction (overlay over &Inventory) → ChangeSet
//!                                                        ↓
//!                                          Journal::append → Inventory::apply
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use tracing::debug;

use crate::domain::{
    Datacenter, DatacenterId, Entity, EntityId, EntityKind, Host, HostId, PoolEntry, Rack, RackId,
    Room, RoomId, Service, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};

pub mod journal;
mod record;
pub(crate) mod transaction;

pub use journal::{Change, CommitRecord, FileJournal, Journal, MemoryJournal};
pub(crate) use record::Record;
pub(crate) use transaction::Transaction;

type Children<P, C> = BTreeMap<P, BTreeSet<C>>;

fn link<P: Ord, C: Ord>(index: &mut Children<P, C>, parent: P, child: C) {
    index.entry(parent).or_default().insert(child);
}

fn unlink<P: Ord, C: Ord>(index: &mut Children<P, C>, parent: &P, child: &C) {
    if let Some(children) = index.get_mut(parent) {
        children.remove(child);
        if children.is_empty() {
            index.remove(parent);
        }
    }
}

/// Parent → children relationships of the committed state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Index {
    pub(crate) rooms_by_dc: Children<DatacenterId, RoomId>,
    pub(crate) racks_by_room: Children<RoomId, RackId>,
    pub(crate) hosts_by_rack: Children<RackId, HostId>,
    pub(crate) racks_by_service: Children<ServiceId, RackId>,
    pub(crate) hosts_by_service: Children<ServiceId, HostId>,
    pub(crate) pool_by_service: Children<ServiceId, Ipv4Addr>,
    pub(crate) names: BTreeMap<(EntityKind, String), EntityId>,
}

impl Index {
    fn insert(&mut self, entity: &Entity) {
        match entity {
            Entity::Datacenter(_) => {}
            Entity::Room(room) => link(&mut self.rooms_by_dc, room.dc_id, room.id),
            Entity::Rack(rack) => {
                link(&mut self.racks_by_room, rack.room_id, rack.id);
                if let Some(service) = rack.service_id {
                    link(&mut self.racks_by_service, service, rack.id);
                }
            }
            Entity::Host(host) => {
                link(&mut self.hosts_by_rack, host.rack_id, host.id);
                if let Some(service) = host.service_id {
                    link(&mut self.hosts_by_service, service, host.id);
                }
            }
            Entity::Service(_) => {}
            Entity::Address(entry) => link(&mut self.pool_by_service, entry.service_id, entry.address),
        }
        if entity.kind() != EntityKind::Address {
            self.names.insert((entity.kind(), entity.name()), entity.id());
        }
    }

    fn remove(&mut self, entity: &Entity) {
        match entity {
            Entity::Datacenter(_) => {}
            Entity::Room(room) => unlink(&mut self.rooms_by_dc, &room.dc_id, &room.id),
            Entity::Rack(rack) => {
                unlink(&mut self.racks_by_room, &rack.room_id, &rack.id);
                if let Some(service) = rack.service_id {
                    unlink(&mut self.racks_by_service, &service, &rack.id);
                }
            }
            Entity::Host(host) => {
                unlink(&mut self.hosts_by_rack, &host.rack_id, &host.id);
                if let Some(service) = host.service_id {
                    unlink(&mut self.hosts_by_service, &service, &host.id);
                }
            }
            Entity::Service(_) => {}
            Entity::Address(entry) => {
                unlink(&mut self.pool_by_service, &entry.service_id, &entry.address)
            }
        }
        let key = (entity.kind(), entity.name());
        // Another record may already have taken the name in the same commit.
        if self.names.get(&key) == Some(&entity.id()) {
            self.names.remove(&key);
        }
    }
}

/// Committed inventory state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub(crate) datacenters: BTreeMap<DatacenterId, Datacenter>,
    pub(crate) rooms: BTreeMap<RoomId, Room>,
    pub(crate) racks: BTreeMap<RackId, Rack>,
    pub(crate) hosts: BTreeMap<HostId, Host>,
    pub(crate) services: BTreeMap<ServiceId, Service>,
    pub(crate) pool: BTreeMap<Ipv4Addr, PoolEntry>,
    pub(crate) index: Index,
    version: u64,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild state by folding committed records in sequence order
    pub fn from_records(records: impl IntoIterator<Item = CommitRecord>) -> InventoryResult<Self> {
        let mut inventory = Self::new();
        for record in records {
            let expected = inventory.version + 1;
            if record.sequence != expected {
                return Err(InventoryError::StorageError(format!(
                    "journal sequence gap: expected {}, found {}",
                    expected, record.sequence
                )));
            }
            inventory.apply(&record.changes);
        }
        Ok(inventory)
    }

    /// Number of committed transactions
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Apply the writes of one committed transaction
    pub fn apply(&mut self, changes: &[Change]) {
        for change in changes {
            match change {
                Change::Put(entity) => self.put(entity.clone()),
                Change::Delete(id) => self.delete(*id),
            }
        }
        self.version += 1;
        debug!("Applied {} changes at version {}", changes.len(), self.version);
    }

    fn put(&mut self, entity: Entity) {
        if let Some(previous) = self.entity(entity.id()) {
            self.index.remove(&previous);
        }
        self.index.insert(&entity);
        match entity {
            Entity::Datacenter(dc) => {
                self.datacenters.insert(dc.id, dc);
            }
            Entity::Room(room) => {
                self.rooms.insert(room.id, room);
            }
            Entity::Rack(rack) => {
                self.racks.insert(rack.id, rack);
            }
            Entity::Host(host) => {
                self.hosts.insert(host.id, host);
            }
            Entity::Service(service) => {
                self.services.insert(service.id, service);
            }
            Entity::Address(entry) => {
                self.pool.insert(entry.address, entry);
            }
        }
    }

    fn delete(&mut self, id: EntityId) {
        let removed = match id {
            EntityId::Datacenter(id) => self.datacenters.remove(&id).map(Entity::Datacenter),
            EntityId::Room(id) => self.rooms.remove(&id).map(Entity::Room),
            EntityId::Rack(id) => self.racks.remove(&id).map(Entity::Rack),
            EntityId::Host(id) => self.hosts.remove(&id).map(Entity::Host),
            EntityId::Service(id) => self.services.remove(&id).map(Entity::Service),
            EntityId::Address(ip) => self.pool.remove(&ip).map(Entity::Address),
        };
        if let Some(entity) = removed {
            self.index.remove(&entity);
        }
    }

    /// Look up any record by id
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        match id {
            EntityId::Datacenter(id) => self.datacenters.get(&id).cloned().map(Entity::Datacenter),
            EntityId::Room(id) => self.rooms.get(&id).cloned().map(Entity::Room),
            EntityId::Rack(id) => self.racks.get(&id).cloned().map(Entity::Rack),
            EntityId::Host(id) => self.hosts.get(&id).cloned().map(Entity::Host),
            EntityId::Service(id) => self.services.get(&id).cloned().map(Entity::Service),
            EntityId::Address(ip) => self.pool.get(&ip).cloned().map(Entity::Address),
        }
    }

    /// Look up a record by its unique name; pool entries are named by address
    pub fn find_by_name(&self, kind: EntityKind, name: &str) -> Option<EntityId> {
        if kind == EntityKind::Address {
            let address = name.parse::<Ipv4Addr>().ok()?;
            return self.pool.contains_key(&address).then_some(EntityId::Address(address));
        }
        self.index.names.get(&(kind, name.to_string())).copied()
    }

    /// Direct children of a record, in id order
    ///
    /// Datacenter → rooms, room → racks, rack → hosts, service → leased
    /// racks, hosts and pool entries. Hosts and pool entries have none.
    pub fn children(&self, id: EntityId) -> Option<Vec<Entity>> {
        self.entity(id)?;

        fn collect<C: Copy, T>(
            ids: Option<&BTreeSet<C>>,
            lookup: impl Fn(C) -> Option<T>,
        ) -> Vec<T> {
            ids.into_iter().flatten().filter_map(|id| lookup(*id)).collect()
        }

        let index = &self.index;
        let children = match id {
            EntityId::Datacenter(dc) => collect(index.rooms_by_dc.get(&dc), |id| {
                self.rooms.get(&id).cloned().map(Entity::Room)
            }),
            EntityId::Room(room) => collect(index.racks_by_room.get(&room), |id| {
                self.racks.get(&id).cloned().map(Entity::Rack)
            }),
            EntityId::Rack(rack) => collect(index.hosts_by_rack.get(&rack), |id| {
                self.hosts.get(&id).cloned().map(Entity::Host)
            }),
            EntityId::Service(service) => {
                let mut children = collect(index.racks_by_service.get(&service), |id| {
                    self.racks.get(&id).cloned().map(Entity::Rack)
                });
                children.extend(collect(index.hosts_by_service.get(&service), |id| {
                    self.hosts.get(&id).cloned().map(Entity::Host)
                }));
                children.extend(collect(index.pool_by_service.get(&service), |ip| {
                    self.pool.get(&ip).cloned().map(Entity::Address)
                }));
                children
            }
            EntityId::Host(_) | EntityId::Address(_) => Vec::new(),
        };
        Some(children)
    }

    pub fn datacenter(&self, id: DatacenterId) -> Option<&Datacenter> {
        self.datacenters.get(&id)
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn rack(&self, id: RackId) -> Option<&Rack> {
        self.racks.get(&id)
    }

    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(&id)
    }

    pub fn service(&self, id: ServiceId) -> Option<&Service> {
        self.services.get(&id)
    }

    pub fn pool_entry(&self, address: Ipv4Addr) -> Option<&PoolEntry> {
        self.pool.get(&address)
    }

    pub fn datacenters(&self) -> impl Iterator<Item = &Datacenter> {
        self.datacenters.values()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn racks(&self) -> impl Iterator<Item = &Rack> {
        self.racks.values()
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn pool(&self) -> impl Iterator<Item = &PoolEntry> {
        self.pool.values()
    }
}
