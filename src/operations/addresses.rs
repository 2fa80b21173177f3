// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address pool planners

use std::net::Ipv4Addr;

use crate::allocator;
use crate::cascade::{self, BaseChange};
use crate::domain::{AddressRange, AddressState, EntityKind, Host, HostId, PoolEntry, Service, ServiceId};
use crate::errors::{InventoryError, InventoryResult, Unavailable};
use crate::store::Transaction;

/// Bind an address of `service` to `host`
///
/// # Business Rules
/// - Host and service must exist
/// - The address must be in `service`'s pool and free (or already this host's)
/// - The host's own service must own the address
pub(super) fn assign(
    tx: &mut Transaction<'_>,
    service: ServiceId,
    address: Ipv4Addr,
    host: HostId,
) -> InventoryResult<()> {
    tx.require::<Host>(host)?;
    tx.require::<Service>(service)?;

    let entry = tx
        .get::<PoolEntry>(address)
        .ok_or(InventoryError::AddressUnavailable {
            address,
            reason: Unavailable::NotInPool,
        })?;
    if entry.service_id != service {
        return Err(InventoryError::ServiceMismatch {
            address,
            owner: entry.service_id,
            requested: Some(service),
        });
    }

    allocator::claim(tx, host, address)
}

pub(super) fn release(tx: &mut Transaction<'_>, address: Ipv4Addr) -> InventoryResult<()> {
    allocator::release(tx, address)
}

/// Add every address of `range` to `service`'s pool
///
/// Any address already in a pool aborts the whole range.
pub(super) fn add_range(
    tx: &mut Transaction<'_>,
    service: ServiceId,
    range: &AddressRange,
) -> InventoryResult<()> {
    tx.require::<Service>(service)?;
    range.ensure_at_most(tx.limits().max_pool_range)?;

    for address in range.iter() {
        if tx.get::<PoolEntry>(address).is_some() {
            return Err(InventoryError::DuplicateKey {
                kind: EntityKind::Address,
                name: address.to_string(),
            });
        }
        cascade::apply(
            tx,
            BaseChange::AddressAdded(PoolEntry {
                address,
                service_id: service,
                state: AddressState::Free,
            }),
        )?;
    }
    Ok(())
}
