// Copyright (c) 2025 - Cowboy AI, Inc.
//! Delete planners
//!
//! Deletes run bottom-up inside one transaction: hosts (releasing their
//! addresses), then racks, rooms and finally the datacenter, so every
//! counter step still finds its ancestor.
//!
//! Deleting a service detaches it from racks and hosts, releases the
//! hosts' addresses and drops its pool before removing the record.

use std::net::Ipv4Addr;

use crate::allocator;
use crate::cascade::{self, BaseChange};
use crate::domain::{
    Datacenter, DatacenterId, EntityId, Host, HostId, HostPatch, PoolEntry, Rack, RackId, Room,
    RoomId, Service, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult, Unavailable};
use crate::store::Transaction;

pub(super) fn entity(tx: &mut Transaction<'_>, id: EntityId) -> InventoryResult<()> {
    match id {
        EntityId::Datacenter(id) => datacenter(tx, id),
        EntityId::Room(id) => room(tx, id),
        EntityId::Rack(id) => rack(tx, id),
        EntityId::Host(id) => host(tx, id),
        EntityId::Service(id) => service(tx, id),
        EntityId::Address(address) => pool_entry(tx, address),
    }
}

fn datacenter(tx: &mut Transaction<'_>, id: DatacenterId) -> InventoryResult<()> {
    tx.require::<Datacenter>(id)?;
    for room in tx.rooms_in(id) {
        self::room(tx, room.id)?;
    }
    let dc = tx.require::<Datacenter>(id)?;
    cascade::apply(tx, BaseChange::DatacenterDeleted(dc))
}

fn room(tx: &mut Transaction<'_>, id: RoomId) -> InventoryResult<()> {
    tx.require::<Room>(id)?;
    for rack in tx.racks_in(id) {
        self::rack(tx, rack.id)?;
    }
    let room = tx.require::<Room>(id)?;
    cascade::apply(tx, BaseChange::RoomDeleted(room))
}

fn rack(tx: &mut Transaction<'_>, id: RackId) -> InventoryResult<()> {
    tx.require::<Rack>(id)?;
    for host in tx.hosts_in(id) {
        self::host(tx, host.id)?;
    }
    let rack = tx.require::<Rack>(id)?;
    cascade::apply(tx, BaseChange::RackDeleted(rack))
}

fn host(tx: &mut Transaction<'_>, id: HostId) -> InventoryResult<()> {
    let host = tx.require::<Host>(id)?;
    cascade::apply(tx, BaseChange::HostDeleted(host))
}

fn service(tx: &mut Transaction<'_>, id: ServiceId) -> InventoryResult<()> {
    tx.require::<Service>(id)?;

    for rack in tx.racks_of(id) {
        let mut after = rack.clone();
        after.service_id = None;
        cascade::apply(tx, BaseChange::RackUpdated { before: rack, after })?;
    }

    for host in tx.hosts_of(id) {
        if let Some(address) = host.ip {
            allocator::release(tx, address)?;
        }
        // Same path as a caller clearing the service, so the rack default applies.
        super::update::entity(
            tx,
            host.id.into(),
            &HostPatch {
                service: Some(None),
                ..Default::default()
            }
            .into(),
        )?;
    }

    for entry in tx.pool_of(id) {
        allocator::release(tx, entry.address)?;
        let entry = tx.require::<PoolEntry>(entry.address)?;
        cascade::apply(tx, BaseChange::AddressRemoved(entry))?;
    }

    let service = tx.require::<Service>(id)?;
    cascade::apply(tx, BaseChange::ServiceDeleted(service))
}

fn pool_entry(tx: &mut Transaction<'_>, address: Ipv4Addr) -> InventoryResult<()> {
    let entry = tx.require::<PoolEntry>(address)?;
    if entry.is_assigned() {
        return Err(InventoryError::AddressUnavailable {
            address,
            reason: Unavailable::Assigned,
        });
    }
    cascade::apply(tx, BaseChange::AddressRemoved(entry))
}
