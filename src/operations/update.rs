// Copyright (c) 2025 - Cowboy AI, Inc.
//! Update planners
//!
//! Each planner builds the after-image from the current record plus the
//! patch, validates it and hands both images to the cascade engine, which
//! propagates renames, moves and counter changes. A patch that changes
//! nothing stages nothing.

use std::net::Ipv4Addr;

use super::ensure_unique;
use crate::allocator;
use crate::cascade::{self, BaseChange};
use crate::domain::{
    Datacenter, DatacenterId, DatacenterPatch, EntityId, EntityKind, EntityPatch, Host, HostId,
    HostPatch, PoolEntry, Rack, RackId, RackPatch, Room, RoomId, RoomPatch, Service, ServiceId,
    ServicePatch,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::store::{Record, Transaction};
use crate::validator;

pub(super) fn entity(
    tx: &mut Transaction<'_>,
    id: EntityId,
    patch: &EntityPatch,
) -> InventoryResult<()> {
    match (id, patch) {
        (EntityId::Datacenter(id), EntityPatch::Datacenter(patch)) => datacenter(tx, id, patch),
        (EntityId::Room(id), EntityPatch::Room(patch)) => room(tx, id, patch),
        (EntityId::Rack(id), EntityPatch::Rack(patch)) => rack(tx, id, patch),
        (EntityId::Host(id), EntityPatch::Host(patch)) => host(tx, id, patch),
        (EntityId::Service(id), EntityPatch::Service(patch)) => service(tx, id, patch),
        (id, patch) => Err(InventoryError::violation(
            id,
            format!("a {} patch cannot update a {}", patch.kind(), id.kind()),
        )),
    }
}

/// Validate and apply a rename
fn rename<R: Record>(
    tx: &mut Transaction<'_>,
    id: R::Id,
    name: Option<&String>,
    current: &mut String,
) -> InventoryResult<()> {
    let Some(name) = name.filter(|name| name.as_str() != current.as_str()) else {
        return Ok(());
    };
    validator::check_name(R::KIND, name, tx.limits())?;
    ensure_unique::<R>(tx, name, Some(id))?;
    *current = name.clone();
    Ok(())
}

fn datacenter(
    tx: &mut Transaction<'_>,
    id: DatacenterId,
    patch: &DatacenterPatch,
) -> InventoryResult<()> {
    let before = tx.require::<Datacenter>(id)?;
    let mut after = before.clone();

    rename::<Datacenter>(tx, id, patch.name.as_ref(), &mut after.name)?;
    if let Some(height) = patch.height {
        validator::check_positive_height(EntityKind::Datacenter, &after.name, height)?;
        after.height = height;
    }

    if after == before {
        return Ok(());
    }
    cascade::apply(tx, BaseChange::DatacenterUpdated { before, after })
}

fn room(tx: &mut Transaction<'_>, id: RoomId, patch: &RoomPatch) -> InventoryResult<()> {
    let before = tx.require::<Room>(id)?;
    let mut after = before.clone();

    rename::<Room>(tx, id, patch.name.as_ref(), &mut after.name)?;
    if let Some(dc) = patch.datacenter {
        after.dc_id = tx.require::<Datacenter>(dc)?.id;
    }
    if let Some(height) = patch.height {
        validator::check_positive_height(EntityKind::Room, &after.name, height)?;
        let racks = tx.racks_in(id);
        validator::check_room_shrink(height, &racks)?;
        after.height = height;
    }

    if after == before {
        return Ok(());
    }
    cascade::apply(tx, BaseChange::RoomUpdated { before, after })
}

fn rack(tx: &mut Transaction<'_>, id: RackId, patch: &RackPatch) -> InventoryResult<()> {
    let before = tx.require::<Rack>(id)?;
    let mut after = before.clone();

    rename::<Rack>(tx, id, patch.name.as_ref(), &mut after.name)?;
    if let Some(room) = patch.room {
        after.room_id = tx.require::<Room>(room)?.id;
    }
    if let Some(service) = patch.service {
        if let Some(service) = service {
            tx.require::<Service>(service)?;
        }
        after.service_id = service;
    }
    if let Some(height) = patch.height {
        after.height = height;
    }

    if after.height != before.height || after.room_id != before.room_id {
        let room = tx.require::<Room>(after.room_id)?;
        validator::check_rack_height(&after.name, after.height, room.height, tx.limits())?;
    }
    if after.height < before.height {
        let hosts = tx.hosts_in(id);
        validator::check_rack_shrink(&after, after.height, &hosts)?;
    }

    if after == before {
        return Ok(());
    }
    cascade::apply(tx, BaseChange::RackUpdated { before, after })
}

fn host(tx: &mut Transaction<'_>, id: HostId, patch: &HostPatch) -> InventoryResult<()> {
    let before = tx.require::<Host>(id)?;
    let mut after = before.clone();

    rename::<Host>(tx, id, patch.name.as_ref(), &mut after.name)?;
    if let Some(height) = patch.height {
        validator::check_host_height(&after.name, height, tx.limits())?;
        after.height = height;
    }
    if let Some(running) = patch.running {
        after.running = running;
    }
    if let Some(rack) = patch.rack {
        after.rack_id = rack;
    }
    if let Some(position) = patch.position {
        after.position = position;
    }
    if let Some(service) = patch.service {
        if let Some(service) = service {
            tx.require::<Service>(service)?;
        }
        after.service_id = service;
    }

    let rack = tx.require::<Rack>(after.rack_id)?;
    if after.service_id.is_none() {
        after.service_id = rack.service_id;
    }

    let moved = after.rack_id != before.rack_id
        || after.position != before.position
        || after.height != before.height;
    if moved {
        validator::check_slot_fit(&rack, &after.name, after.position, after.height)?;
        let occupants = tx.hosts_in(rack.id);
        validator::check_slot_free(
            &rack,
            id,
            &after.name,
            after.position,
            after.height,
            &occupants,
        )?;
    }

    let service_changed = after.service_id != before.service_id;
    if after != before {
        cascade::apply(
            tx,
            BaseChange::HostUpdated {
                before: before.clone(),
                after: after.clone(),
            },
        )?;
    }

    match patch.ip {
        Some(None) => match before.ip {
            Some(address) => allocator::release(tx, address),
            None => Ok(()),
        },
        Some(Some(address)) => allocator::claim(tx, id, address),
        None => match before.ip {
            Some(address) if service_changed => ensure_owned_by(tx, address, after.service_id),
            _ => Ok(()),
        },
    }
}

/// A host that keeps its address must stay in the address's service
fn ensure_owned_by(
    tx: &mut Transaction<'_>,
    address: Ipv4Addr,
    service: Option<ServiceId>,
) -> InventoryResult<()> {
    match tx.get::<PoolEntry>(address) {
        Some(entry) if Some(entry.service_id) != service => Err(InventoryError::ServiceMismatch {
            address,
            owner: entry.service_id,
            requested: service,
        }),
        _ => Ok(()),
    }
}

fn service(tx: &mut Transaction<'_>, id: ServiceId, patch: &ServicePatch) -> InventoryResult<()> {
    let before = tx.require::<Service>(id)?;
    let mut after = before.clone();

    rename::<Service>(tx, id, patch.name.as_ref(), &mut after.name)?;
    if let Some(owner) = &patch.owner {
        after.owner = owner.clone();
    }

    if after == before {
        return Ok(());
    }
    cascade::apply(tx, BaseChange::ServiceUpdated { before, after })
}
