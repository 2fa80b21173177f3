// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cascade Engine
//!
//! Keeps every derived field correct after a base write: counters on all
//! ancestors, rack capacity and the denormalized ids/names copied from
//! ancestors onto descendants.
//!
//! # Pattern
//!
//! ```text
//! apply(tx, BaseChange)
//!   1. derive the after-image (denormalized refs from current ancestors)
//!   2. stage the write
//!   3. run rules_for(change) in order       ← incremental deltas, resyncs
//!   4. stage the removal (deletes only)
//! settle(tx)
//!   5. run deferred steps once per transaction ← capacity, datacenter recount
//! ```
//!
//! Any step that cannot find its target aborts the transaction with
//! `DanglingReference`, unless the target was removed earlier in the same
//! transaction (bottom-up deletes). Counter underflow is a
//! `ConstraintViolation`.

use std::collections::VecDeque;

use tracing::debug;

use crate::allocator;
use crate::domain::{
    Datacenter, DatacenterId, EntityId, Host, PoolEntry, Rack, RackId, Room, Service, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::store::{Record, Transaction};

pub(crate) mod rules;

pub(crate) use rules::{rules_for, Cascade, Counter};

/// Step run once per transaction after all base changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Deferred {
    RecomputeRackCapacity(RackId),
    RecountDatacenter(DatacenterId),
}

/// Base-record mutation with its before/after images
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BaseChange {
    DatacenterInserted(Datacenter),
    DatacenterUpdated { before: Datacenter, after: Datacenter },
    DatacenterDeleted(Datacenter),
    RoomInserted(Room),
    RoomUpdated { before: Room, after: Room },
    RoomDeleted(Room),
    RackInserted(Rack),
    RackUpdated { before: Rack, after: Rack },
    RackDeleted(Rack),
    HostInserted(Host),
    HostUpdated { before: Host, after: Host },
    HostDeleted(Host),
    ServiceInserted(Service),
    ServiceUpdated { before: Service, after: Service },
    ServiceDeleted(Service),
    AddressAdded(PoolEntry),
    AddressRemoved(PoolEntry),
}

impl BaseChange {
    pub(crate) fn id(&self) -> EntityId {
        match self {
            BaseChange::DatacenterInserted(dc) | BaseChange::DatacenterDeleted(dc) => dc.id.into(),
            BaseChange::DatacenterUpdated { after, .. } => after.id.into(),
            BaseChange::RoomInserted(room) | BaseChange::RoomDeleted(room) => room.id.into(),
            BaseChange::RoomUpdated { after, .. } => after.id.into(),
            BaseChange::RackInserted(rack) | BaseChange::RackDeleted(rack) => rack.id.into(),
            BaseChange::RackUpdated { after, .. } => after.id.into(),
            BaseChange::HostInserted(host) | BaseChange::HostDeleted(host) => host.id.into(),
            BaseChange::HostUpdated { after, .. } => after.id.into(),
            BaseChange::ServiceInserted(service) | BaseChange::ServiceDeleted(service) => {
                service.id.into()
            }
            BaseChange::ServiceUpdated { after, .. } => after.id.into(),
            BaseChange::AddressAdded(entry) | BaseChange::AddressRemoved(entry) => {
                entry.address.into()
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BaseChange::DatacenterInserted(_) => "datacenter inserted",
            BaseChange::DatacenterUpdated { .. } => "datacenter updated",
            BaseChange::DatacenterDeleted(_) => "datacenter deleted",
            BaseChange::RoomInserted(_) => "room inserted",
            BaseChange::RoomUpdated { .. } => "room updated",
            BaseChange::RoomDeleted(_) => "room deleted",
            BaseChange::RackInserted(_) => "rack inserted",
            BaseChange::RackUpdated { .. } => "rack updated",
            BaseChange::RackDeleted(_) => "rack deleted",
            BaseChange::HostInserted(_) => "host inserted",
            BaseChange::HostUpdated { .. } => "host updated",
            BaseChange::HostDeleted(_) => "host deleted",
            BaseChange::ServiceInserted(_) => "service inserted",
            BaseChange::ServiceUpdated { .. } => "service updated",
            BaseChange::ServiceDeleted(_) => "service deleted",
            BaseChange::AddressAdded(_) => "address added",
            BaseChange::AddressRemoved(_) => "address removed",
        }
    }
}

fn ancestor<R: Record>(tx: &mut Transaction<'_>, id: R::Id, from: EntityId) -> InventoryResult<R> {
    tx.get::<R>(id).ok_or_else(|| InventoryError::DanglingReference {
        from,
        to: id.into(),
    })
}

/// Cascade target that may legitimately be gone already
fn target<R: Record>(
    tx: &mut Transaction<'_>,
    id: R::Id,
    from: EntityId,
) -> InventoryResult<Option<R>> {
    match tx.get::<R>(id) {
        Some(record) => Ok(Some(record)),
        None if tx.was_removed(id) => Ok(None),
        None => Err(InventoryError::DanglingReference {
            from,
            to: id.into(),
        }),
    }
}

fn service_name(
    tx: &mut Transaction<'_>,
    service: Option<ServiceId>,
    from: EntityId,
) -> InventoryResult<Option<String>> {
    service
        .map(|id| ancestor::<Service>(tx, id, from).map(|s| s.name))
        .transpose()
}

pub(crate) fn derive_room(tx: &mut Transaction<'_>, room: &mut Room) -> InventoryResult<()> {
    let dc = ancestor::<Datacenter>(tx, room.dc_id, room.id.into())?;
    room.dc_name = dc.name;
    Ok(())
}

pub(crate) fn derive_rack(tx: &mut Transaction<'_>, rack: &mut Rack) -> InventoryResult<()> {
    let from = rack.id.into();
    let room = ancestor::<Room>(tx, rack.room_id, from)?;
    let dc = ancestor::<Datacenter>(tx, room.dc_id, room.id.into())?;
    rack.dc_id = dc.id;
    rack.room_name = room.name;
    rack.dc_name = dc.name;
    rack.service_name = service_name(tx, rack.service_id, from)?;
    Ok(())
}

/// Hosts copy their room/dc refs and names from the current rack
pub(crate) fn derive_host(tx: &mut Transaction<'_>, host: &mut Host) -> InventoryResult<()> {
    let from = host.id.into();
    let rack = ancestor::<Rack>(tx, host.rack_id, from)?;
    host.room_id = rack.room_id;
    host.dc_id = rack.dc_id;
    host.rack_name = rack.name;
    host.room_name = rack.room_name;
    host.dc_name = rack.dc_name;
    host.service_name = service_name(tx, host.service_id, from)?;
    Ok(())
}

fn derive(tx: &mut Transaction<'_>, change: &mut BaseChange) -> InventoryResult<()> {
    match change {
        BaseChange::RoomInserted(room) | BaseChange::RoomUpdated { after: room, .. } => {
            derive_room(tx, room)
        }
        BaseChange::RackInserted(rack) | BaseChange::RackUpdated { after: rack, .. } => {
            derive_rack(tx, rack)
        }
        BaseChange::HostInserted(host) | BaseChange::HostUpdated { after: host, .. } => {
            derive_host(tx, host)
        }
        _ => Ok(()),
    }
}

fn stage_write(tx: &mut Transaction<'_>, change: &BaseChange) {
    match change {
        BaseChange::DatacenterInserted(dc) | BaseChange::DatacenterUpdated { after: dc, .. } => {
            tx.put(dc.clone())
        }
        BaseChange::RoomInserted(room) | BaseChange::RoomUpdated { after: room, .. } => {
            tx.put(room.clone())
        }
        BaseChange::RackInserted(rack) | BaseChange::RackUpdated { after: rack, .. } => {
            tx.put(rack.clone())
        }
        BaseChange::HostInserted(host) | BaseChange::HostUpdated { after: host, .. } => {
            tx.put(host.clone())
        }
        BaseChange::ServiceInserted(service) | BaseChange::ServiceUpdated { after: service, .. } => {
            tx.put(service.clone())
        }
        BaseChange::AddressAdded(entry) => tx.put(entry.clone()),
        _ => {}
    }
}

fn stage_removal(tx: &mut Transaction<'_>, change: &BaseChange) {
    match change {
        BaseChange::DatacenterDeleted(dc) => tx.remove::<Datacenter>(dc.id),
        BaseChange::RoomDeleted(room) => tx.remove::<Room>(room.id),
        BaseChange::RackDeleted(rack) => tx.remove::<Rack>(rack.id),
        BaseChange::HostDeleted(host) => tx.remove::<Host>(host.id),
        BaseChange::ServiceDeleted(service) => tx.remove::<Service>(service.id),
        BaseChange::AddressRemoved(entry) => tx.remove::<PoolEntry>(entry.address),
        _ => {}
    }
}

/// Stage a base change and run its cascade
pub(crate) fn apply(tx: &mut Transaction<'_>, mut change: BaseChange) -> InventoryResult<()> {
    derive(tx, &mut change)?;
    stage_write(tx, &change);

    let steps = rules_for(&change);
    debug!("Cascading {} {} over {} steps", change.label(), change.id(), steps.len());
    run(tx, change.id(), steps)?;

    stage_removal(tx, &change);
    Ok(())
}

fn adjust<R: Record>(
    tx: &mut Transaction<'_>,
    id: R::Id,
    from: EntityId,
    delta: i64,
    field: fn(&mut R) -> &mut u64,
) -> InventoryResult<()> {
    let Some(mut record) = target::<R>(tx, id, from)? else {
        return Ok(());
    };
    let counter = field(&mut record);
    let current = *counter;
    *counter = current.checked_add_signed(delta).ok_or_else(|| {
        InventoryError::violation(
            id,
            format!("counter {} cannot be adjusted by {}", current, delta),
        )
    })?;
    tx.put(record);
    Ok(())
}

fn adjust_counter(
    tx: &mut Transaction<'_>,
    counter: Counter,
    from: EntityId,
    delta: i64,
) -> InventoryResult<()> {
    match counter {
        Counter::DatacenterRooms(id) => {
            adjust::<Datacenter>(tx, id, from, delta, |dc| &mut dc.rooms_count)
        }
        Counter::RoomRacks(id) => adjust::<Room>(tx, id, from, delta, |room| &mut room.racks_count),
        Counter::RoomHosts(id) => adjust::<Room>(tx, id, from, delta, |room| &mut room.hosts_count),
        Counter::RackHosts(id) => adjust::<Rack>(tx, id, from, delta, |rack| &mut rack.hosts_count),
        Counter::ServiceRacks(id) => {
            adjust::<Service>(tx, id, from, delta, |service| &mut service.racks_count)
        }
        Counter::ServiceHosts(id) => {
            adjust::<Service>(tx, id, from, delta, |service| &mut service.hosts_count)
        }
        Counter::ServiceAddresses(id) => {
            adjust::<Service>(tx, id, from, delta, |service| &mut service.ips_count)
        }
    }
}

/// Re-derive a record and stage it only if something changed
fn resync<R: Record>(
    tx: &mut Transaction<'_>,
    id: R::Id,
    from: EntityId,
    derive: fn(&mut Transaction<'_>, &mut R) -> InventoryResult<()>,
) -> InventoryResult<bool> {
    let Some(current) = target::<R>(tx, id, from)? else {
        return Ok(false);
    };
    let mut derived = current.clone();
    derive(tx, &mut derived)?;
    if derived != current {
        tx.put(derived);
    }
    Ok(true)
}

/// Execute cascade steps in order; resyncs enqueue their descendants
pub(crate) fn run(
    tx: &mut Transaction<'_>,
    origin: EntityId,
    steps: Vec<Cascade>,
) -> InventoryResult<()> {
    let mut queue: VecDeque<Cascade> = steps.into();

    while let Some(step) = queue.pop_front() {
        match step {
            Cascade::Adjust(counter, delta) => adjust_counter(tx, counter, origin, delta)?,
            Cascade::ReleaseAddress(address) => allocator::release(tx, address)?,
            Cascade::ResyncDatacenter(id) => {
                if target::<Datacenter>(tx, id, origin)?.is_some() {
                    let rooms = tx.rooms_in(id);
                    queue.extend(rooms.iter().map(|room| Cascade::ResyncRoom(room.id)));
                }
            }
            Cascade::ResyncRoom(id) => {
                if resync::<Room>(tx, id, origin, derive_room)? {
                    let racks = tx.racks_in(id);
                    queue.extend(racks.iter().map(|rack| Cascade::ResyncRack(rack.id)));
                }
            }
            Cascade::ResyncRack(id) => {
                if resync::<Rack>(tx, id, origin, derive_rack)? {
                    let hosts = tx.hosts_in(id);
                    queue.extend(hosts.iter().map(|host| Cascade::ResyncHost(host.id)));
                }
            }
            Cascade::ResyncHost(id) => {
                resync::<Host>(tx, id, origin, derive_host)?;
            }
            Cascade::ResyncService(id) => {
                for rack in tx.racks_of(id) {
                    resync::<Rack>(tx, rack.id, origin, derive_rack)?;
                }
                for host in tx.hosts_of(id) {
                    resync::<Host>(tx, host.id, origin, derive_host)?;
                }
            }
            Cascade::Defer(deferred) => tx.defer(deferred, origin),
        }
    }
    Ok(())
}

fn recompute_capacity(tx: &mut Transaction<'_>, id: RackId, from: EntityId) -> InventoryResult<()> {
    let Some(mut rack) = target::<Rack>(tx, id, from)? else {
        return Ok(());
    };
    let occupied: u64 = tx.hosts_in(id).iter().map(|host| u64::from(host.height)).sum();
    let capacity = u64::from(rack.height)
        .checked_sub(occupied)
        .and_then(|free| u32::try_from(free).ok())
        .ok_or_else(|| {
            InventoryError::violation(
                id,
                format!("{} occupied units exceed rack height {}", occupied, rack.height),
            )
        })?;
    if rack.capacity != capacity {
        rack.capacity = capacity;
        tx.put(rack);
    }
    Ok(())
}

fn recount_datacenter(
    tx: &mut Transaction<'_>,
    id: DatacenterId,
    from: EntityId,
) -> InventoryResult<()> {
    let Some(mut dc) = target::<Datacenter>(tx, id, from)? else {
        return Ok(());
    };

    let rooms = tx.rooms_in(id);
    if dc.rooms_count != rooms.len() as u64 {
        return Err(InventoryError::violation(
            id,
            format!(
                "rooms_count {} disagrees with {} live rooms",
                dc.rooms_count,
                rooms.len()
            ),
        ));
    }

    let mut racks = 0u64;
    let mut hosts = 0u64;
    for room in &rooms {
        for rack in tx.racks_in(room.id) {
            racks += 1;
            hosts += tx.hosts_in(rack.id).len() as u64;
        }
    }

    if dc.racks_count != racks || dc.hosts_count != hosts {
        debug!(
            "Recounted {}: racks {} -> {}, hosts {} -> {}",
            id, dc.racks_count, racks, dc.hosts_count, hosts
        );
        dc.racks_count = racks;
        dc.hosts_count = hosts;
        tx.put(dc);
    }
    Ok(())
}

/// Run deferred steps; capacity before datacenter recounts
pub(crate) fn settle(tx: &mut Transaction<'_>) -> InventoryResult<()> {
    loop {
        let deferred = tx.take_deferred();
        if deferred.is_empty() {
            return Ok(());
        }
        for (step, origin) in deferred {
            match step {
                Deferred::RecomputeRackCapacity(rack) => recompute_capacity(tx, rack, origin)?,
                Deferred::RecountDatacenter(dc) => recount_datacenter(tx, dc, origin)?,
            }
        }
    }
}
