// Copyright (c) 2025 - Cowboy AI, Inc.
//! Staged Transactions
//!
//! A [`Transaction`] is a write overlay over a borrowed committed
//! [`Inventory`]. Reads see staged writes first, then committed state.
//! Nothing reaches the committed state until the engine turns the overlay
//! into a change list with [`Transaction::into_changes`], so dropping a
//! transaction is a complete rollback.
//!
//! Every record read or written is noted with the [`LockScope`] that covers
//! it. The engine compares that set with the scopes it holds; a plan that
//! touched anything outside them is discarded and replanned under the wider
//! set.

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use super::{Change, Inventory, Record};
use crate::cascade::Deferred;
use crate::config::Limits;
use crate::domain::{
    Datacenter, DatacenterId, EntityId, Host, HostId, PoolEntry, Rack, RackId, Room, RoomId,
    Service, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::locks::LockScope;

/// Staged writes; `None` marks a removal
#[derive(Debug, Default)]
pub(crate) struct Overlay {
    pub(crate) datacenters: BTreeMap<DatacenterId, Option<Datacenter>>,
    pub(crate) rooms: BTreeMap<RoomId, Option<Room>>,
    pub(crate) racks: BTreeMap<RackId, Option<Rack>>,
    pub(crate) hosts: BTreeMap<HostId, Option<Host>>,
    pub(crate) services: BTreeMap<ServiceId, Option<Service>>,
    pub(crate) pool: BTreeMap<Ipv4Addr, Option<PoolEntry>>,
}

fn ids_of<P: Ord, C: Copy>(index: &BTreeMap<P, BTreeSet<C>>, parent: &P) -> Vec<C> {
    index
        .get(parent)
        .map(|children| children.iter().copied().collect())
        .unwrap_or_default()
}

/// Write overlay over the committed inventory
#[derive(Debug)]
pub(crate) struct Transaction<'a> {
    base: &'a Inventory,
    limits: &'a Limits,
    overlay: Overlay,
    touched: BTreeSet<LockScope>,
    removed: BTreeSet<EntityId>,
    deferred: BTreeMap<Deferred, EntityId>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(base: &'a Inventory, limits: &'a Limits) -> Self {
        Self {
            base,
            limits,
            overlay: Overlay::default(),
            touched: BTreeSet::new(),
            removed: BTreeSet::new(),
            deferred: BTreeMap::new(),
        }
    }

    pub(crate) fn limits(&self) -> &'a Limits {
        self.limits
    }

    /// Every scope read or written so far
    pub(crate) fn touched(&self) -> &BTreeSet<LockScope> {
        &self.touched
    }

    /// Current view of a record
    pub(crate) fn get<R: Record>(&mut self, id: R::Id) -> Option<R> {
        if let Some(scope) = R::slot_scope(id) {
            self.touched.insert(scope);
        }
        if let Some(staged) = R::staged(&self.overlay).get(&id) {
            return staged.clone();
        }
        let record = R::table(self.base).get(&id)?;
        self.touched.insert(record.scope());
        Some(record.clone())
    }

    /// Current view of a record the caller referenced
    pub(crate) fn require<R: Record>(&mut self, id: R::Id) -> InventoryResult<R> {
        self.get(id).ok_or_else(|| InventoryError::NotFound(id.into()))
    }

    /// Stage a whole-record write
    pub(crate) fn put<R: Record>(&mut self, record: R) {
        let id = record.key();
        let previous_name = match R::staged(&self.overlay).get(&id) {
            Some(staged) => staged.as_ref().and_then(|r| r.name().map(str::to_string)),
            None => R::table(self.base).get(&id).and_then(|r| {
                self.touched.insert(r.scope());
                r.name().map(str::to_string)
            }),
        };

        if let Some(name) = record.name() {
            if previous_name.as_deref() != Some(name) {
                self.touched.insert(LockScope::Name(R::KIND, name.to_string()));
            }
        }
        self.touched.insert(record.scope());
        R::staged_mut(&mut self.overlay).insert(id, Some(record));
    }

    /// Stage a removal
    pub(crate) fn remove<R: Record>(&mut self, id: R::Id) {
        if let Some(record) = R::table(self.base).get(&id) {
            self.touched.insert(record.scope());
        }
        self.removed.insert(id.into());
        R::staged_mut(&mut self.overlay).insert(id, None);
    }

    /// Whether this transaction removed the record
    pub(crate) fn was_removed(&self, id: impl Into<EntityId>) -> bool {
        self.removed.contains(&id.into())
    }

    /// Record of kind `R` currently holding `name`, other than `except`
    pub(crate) fn name_in_use<R: Record>(
        &mut self,
        name: &str,
        except: Option<R::Id>,
    ) -> Option<EntityId> {
        self.touched.insert(LockScope::Name(R::KIND, name.to_string()));

        let staged = R::staged(&self.overlay)
            .iter()
            .filter(|(id, _)| Some(**id) != except)
            .find(|(_, record)| matches!(record, Some(r) if r.name() == Some(name)))
            .map(|(id, _)| (*id).into());
        if staged.is_some() {
            return staged;
        }

        let committed = *self.base.index.names.get(&(R::KIND, name.to_string()))?;
        let id = R::from_entity_id(committed)?;
        if Some(id) == except || R::staged(&self.overlay).contains_key(&id) {
            // Renamed or removed in this transaction.
            return None;
        }
        Some(committed)
    }

    fn related<R: Record>(&mut self, indexed: Vec<R::Id>, belongs: impl Fn(&R) -> bool) -> Vec<R> {
        let mut ids: BTreeSet<R::Id> = indexed.into_iter().collect();
        ids.extend(
            R::staged(&self.overlay)
                .iter()
                .filter(|(_, record)| matches!(record, Some(r) if belongs(r)))
                .map(|(id, _)| *id),
        );
        ids.into_iter()
            .filter_map(|id| self.get::<R>(id))
            .filter(|record| belongs(record))
            .collect()
    }

    pub(crate) fn rooms_in(&mut self, dc: DatacenterId) -> Vec<Room> {
        self.touched.insert(LockScope::Datacenter(dc));
        let indexed = ids_of(&self.base.index.rooms_by_dc, &dc);
        self.related(indexed, |room: &Room| room.dc_id == dc)
    }

    pub(crate) fn racks_in(&mut self, room: RoomId) -> Vec<Rack> {
        self.get::<Room>(room);
        let indexed = ids_of(&self.base.index.racks_by_room, &room);
        self.related(indexed, |rack: &Rack| rack.room_id == room)
    }

    /// Hosts of a rack, ordered by position
    pub(crate) fn hosts_in(&mut self, rack: RackId) -> Vec<Host> {
        self.get::<Rack>(rack);
        let indexed = ids_of(&self.base.index.hosts_by_rack, &rack);
        let mut hosts = self.related(indexed, |host: &Host| host.rack_id == rack);
        hosts.sort_by_key(|host| (host.position, host.id));
        hosts
    }

    pub(crate) fn racks_of(&mut self, service: ServiceId) -> Vec<Rack> {
        self.touched.insert(LockScope::Service(service));
        let indexed = ids_of(&self.base.index.racks_by_service, &service);
        self.related(indexed, |rack: &Rack| rack.service_id == Some(service))
    }

    pub(crate) fn hosts_of(&mut self, service: ServiceId) -> Vec<Host> {
        self.touched.insert(LockScope::Service(service));
        let indexed = ids_of(&self.base.index.hosts_by_service, &service);
        self.related(indexed, |host: &Host| host.service_id == Some(service))
    }

    /// Pool entries of a service in ascending address order
    pub(crate) fn pool_of(&mut self, service: ServiceId) -> Vec<PoolEntry> {
        self.touched.insert(LockScope::Service(service));
        let indexed = ids_of(&self.base.index.pool_by_service, &service);
        self.related(indexed, |entry: &PoolEntry| entry.service_id == service)
    }

    /// Queue a step that runs once per transaction, at settle time
    pub(crate) fn defer(&mut self, step: Deferred, origin: EntityId) {
        self.deferred.entry(step).or_insert(origin);
    }

    pub(crate) fn take_deferred(&mut self) -> BTreeMap<Deferred, EntityId> {
        std::mem::take(&mut self.deferred)
    }

    /// Net whole-record writes against the committed state
    ///
    /// Writes that leave a record unchanged and records created then removed
    /// within the transaction produce nothing.
    pub(crate) fn into_changes(self) -> Vec<Change> {
        fn collect<R: Record>(base: &Inventory, overlay: &Overlay, out: &mut Vec<Change>) {
            for (id, staged) in R::staged(overlay) {
                let committed = R::table(base).get(id);
                match (staged, committed) {
                    (Some(record), Some(previous)) if record == previous => {}
                    (Some(record), _) => out.push(Change::Put(record.clone().into_entity())),
                    (None, Some(_)) => out.push(Change::Delete((*id).into())),
                    (None, None) => {}
                }
            }
        }

        let mut changes = Vec::new();
        collect::<Datacenter>(self.base, &self.overlay, &mut changes);
        collect::<Room>(self.base, &self.overlay, &mut changes);
        collect::<Rack>(self.base, &self.overlay, &mut changes);
        collect::<Host>(self.base, &self.overlay, &mut changes);
        collect::<Service>(self.base, &self.overlay, &mut changes);
        collect::<PoolEntry>(self.base, &self.overlay, &mut changes);
        changes
    }
}
