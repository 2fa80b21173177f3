// Copyright (c) 2025 - Cowboy AI, Inc.
//! Create planners
//!
//! # Business Rules
//! - Names are valid and unique within their kind
//! - Referenced parents must exist (`NotFound`)
//! - Heights follow the validator rules; unset heights take their defaults
//! - A host without a service inherits its rack's service
//! - A host without a position takes the lowest free run of its height

use super::ensure_unique;
use crate::allocator;
use crate::cascade::{self, BaseChange};
use crate::domain::{
    AddressRequest, Datacenter, DatacenterId, EntityKind, Host, HostId, NewDatacenter, NewHost,
    NewRack, NewRoom, NewService, Rack, RackId, Room, RoomId, Service, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::store::Transaction;
use crate::validator;

pub(super) fn datacenter(
    tx: &mut Transaction<'_>,
    id: DatacenterId,
    attrs: &NewDatacenter,
) -> InventoryResult<()> {
    let limits = tx.limits();
    validator::check_name(EntityKind::Datacenter, &attrs.name, limits)?;
    ensure_unique::<Datacenter>(tx, &attrs.name, None)?;

    let height = attrs.height.unwrap_or(limits.default_datacenter_height);
    validator::check_positive_height(EntityKind::Datacenter, &attrs.name, height)?;

    cascade::apply(
        tx,
        BaseChange::DatacenterInserted(Datacenter {
            id,
            name: attrs.name.clone(),
            height,
            rooms_count: 0,
            racks_count: 0,
            hosts_count: 0,
        }),
    )
}

pub(super) fn room(tx: &mut Transaction<'_>, id: RoomId, attrs: &NewRoom) -> InventoryResult<()> {
    validator::check_name(EntityKind::Room, &attrs.name, tx.limits())?;
    ensure_unique::<Room>(tx, &attrs.name, None)?;

    let dc = tx.require::<Datacenter>(attrs.datacenter)?;
    let height = attrs.height.unwrap_or(dc.height);
    validator::check_positive_height(EntityKind::Room, &attrs.name, height)?;

    cascade::apply(
        tx,
        BaseChange::RoomInserted(Room {
            id,
            name: attrs.name.clone(),
            height,
            dc_id: dc.id,
            dc_name: String::new(),
            racks_count: 0,
            hosts_count: 0,
        }),
    )
}

pub(super) fn rack(tx: &mut Transaction<'_>, id: RackId, attrs: &NewRack) -> InventoryResult<()> {
    let limits = tx.limits();
    validator::check_name(EntityKind::Rack, &attrs.name, limits)?;
    ensure_unique::<Rack>(tx, &attrs.name, None)?;

    let room = tx.require::<Room>(attrs.room)?;
    let height = attrs.height.unwrap_or(limits.default_rack_height);
    validator::check_rack_height(&attrs.name, height, room.height, limits)?;

    if let Some(service) = attrs.service {
        tx.require::<Service>(service)?;
    }

    cascade::apply(
        tx,
        BaseChange::RackInserted(Rack {
            id,
            name: attrs.name.clone(),
            height,
            room_id: room.id,
            service_id: attrs.service,
            capacity: height,
            dc_id: room.dc_id,
            room_name: String::new(),
            dc_name: String::new(),
            service_name: None,
            hosts_count: 0,
        }),
    )
}

pub(super) fn host(tx: &mut Transaction<'_>, id: HostId, attrs: &NewHost) -> InventoryResult<()> {
    let limits = tx.limits();
    validator::check_name(EntityKind::Host, &attrs.name, limits)?;
    ensure_unique::<Host>(tx, &attrs.name, None)?;
    validator::check_host_height(&attrs.name, attrs.height, limits)?;

    let rack = tx.require::<Rack>(attrs.rack)?;
    let service = match attrs.service {
        Some(service) => Some(tx.require::<Service>(service)?.id),
        None => rack.service_id,
    };

    let occupants = tx.hosts_in(rack.id);
    let position = match attrs.position {
        Some(position) => position,
        None => validator::first_free_position(rack.height, attrs.height, &occupants).ok_or_else(
            || {
                InventoryError::violation(
                    rack.id,
                    format!("no free run of {} units in rack '{}'", attrs.height, rack.name),
                )
            },
        )?,
    };
    validator::check_slot_fit(&rack, &attrs.name, position, attrs.height)?;
    validator::check_slot_free(&rack, id, &attrs.name, position, attrs.height, &occupants)?;

    cascade::apply(
        tx,
        BaseChange::HostInserted(Host {
            id,
            name: attrs.name.clone(),
            height: attrs.height,
            position,
            running: attrs.running,
            rack_id: rack.id,
            service_id: service,
            ip: None,
            room_id: rack.room_id,
            dc_id: rack.dc_id,
            rack_name: String::new(),
            room_name: String::new(),
            dc_name: String::new(),
            service_name: None,
        }),
    )?;

    match attrs.address {
        AddressRequest::None => Ok(()),
        AddressRequest::Explicit(address) => allocator::claim(tx, id, address),
        AddressRequest::Auto => {
            let free = service.and_then(|service| allocator::highest_free(tx, service));
            match free {
                Some(address) => allocator::claim(tx, id, address),
                None => Ok(()),
            }
        }
    }
}

pub(super) fn service(
    tx: &mut Transaction<'_>,
    id: ServiceId,
    attrs: &NewService,
) -> InventoryResult<()> {
    validator::check_name(EntityKind::Service, &attrs.name, tx.limits())?;
    ensure_unique::<Service>(tx, &attrs.name, None)?;

    cascade::apply(
        tx,
        BaseChange::ServiceInserted(Service {
            id,
            name: attrs.name.clone(),
            owner: attrs.owner.clone(),
            racks_count: 0,
            hosts_count: 0,
            ips_count: 0,
        }),
    )
}
