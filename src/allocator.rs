// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Allocator
//!
//! Sole writer of pool entry state and of `Host::ip`. Every transition goes
//! through the [`AddressState`] state machine, so an entry is either free or
//! bound to exactly one host, and the host side always agrees.
//!
//! # Business Rules
//! - An address can only be claimed from its own service's pool
//! - A host holds at most one address; claiming a new one releases the old
//!   one in the same transaction
//! - Release is idempotent

use std::net::Ipv4Addr;

use crate::domain::{AddressState, Host, HostId, PoolEntry, ServiceId};
use crate::errors::{InventoryError, InventoryResult, Unavailable};
use crate::state_machine::{AddressCommand, AddressEffect, StateMachine};
use crate::store::Transaction;

/// Bind `address` to `host`
///
/// # Errors
/// - `AddressUnavailable` if the entry is missing or bound to another host
/// - `ServiceMismatch` if the entry's service is not the host's service
pub(crate) fn claim(tx: &mut Transaction<'_>, host_id: HostId, address: Ipv4Addr) -> InventoryResult<()> {
    let host = tx.require::<Host>(host_id)?;
    let mut entry = tx
        .get::<PoolEntry>(address)
        .ok_or(InventoryError::AddressUnavailable {
            address,
            reason: Unavailable::NotInPool,
        })?;

    if host.service_id != Some(entry.service_id) {
        return Err(InventoryError::ServiceMismatch {
            address,
            owner: entry.service_id,
            requested: host.service_id,
        });
    }

    let (state, effect) = entry
        .state
        .transition(&AddressCommand::Assign(host_id))
        .map_err(|_| InventoryError::AddressUnavailable {
            address,
            reason: Unavailable::Assigned,
        })?;

    if let Some(previous) = host.ip.filter(|ip| *ip != address) {
        release(tx, previous)?;
    }

    if effect != AddressEffect::Unchanged {
        entry.state = state;
        tx.put(entry);
    }

    let mut host = tx.require::<Host>(host_id)?;
    if host.ip != Some(address) {
        host.ip = Some(address);
        tx.put(host);
    }
    Ok(())
}

/// Return `address` to its pool; a free or unknown address is left alone
pub(crate) fn release(tx: &mut Transaction<'_>, address: Ipv4Addr) -> InventoryResult<()> {
    let Some(mut entry) = tx.get::<PoolEntry>(address) else {
        return Ok(());
    };

    let (state, effect) = entry
        .state
        .transition(&AddressCommand::Release)
        .map_err(|err| InventoryError::violation(address, err.to_string()))?;

    if let AddressEffect::Released(host_id) = effect {
        entry.state = state;
        tx.put(entry);

        if let Some(mut host) = tx.get::<Host>(host_id) {
            if host.ip == Some(address) {
                host.ip = None;
                tx.put(host);
            }
        }
    }
    Ok(())
}

/// Highest-numbered free entry of a service's pool
pub(crate) fn highest_free(tx: &mut Transaction<'_>, service: ServiceId) -> Option<Ipv4Addr> {
    tx.pool_of(service)
        .into_iter()
        .rev()
        .find(|entry| entry.state == AddressState::Free)
        .map(|entry| entry.address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::domain::{DatacenterId, Entity, RackId, RoomId};
    use crate::store::{Change, Inventory};

    fn host(service: Option<ServiceId>) -> Host {
        Host {
            id: HostId::new(),
            name: "H1".into(),
            height: 1,
            position: 1,
            running: true,
            rack_id: RackId::new(),
            service_id: service,
            ip: None,
            room_id: RoomId::new(),
            dc_id: DatacenterId::new(),
            rack_name: "K1".into(),
            room_name: "R1".into(),
            dc_name: "D1".into(),
            service_name: None,
        }
    }

    fn entry(address: Ipv4Addr, service: ServiceId) -> PoolEntry {
        PoolEntry {
            address,
            service_id: service,
            state: AddressState::Free,
        }
    }

    fn inventory(entities: Vec<Entity>) -> Inventory {
        let mut inventory = Inventory::new();
        let changes: Vec<Change> = entities.into_iter().map(Change::Put).collect();
        inventory.apply(&changes);
        inventory
    }

    const A1: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const A2: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

    #[test]
    fn test_claim_binds_both_sides() {
        let service = ServiceId::new();
        let h1 = host(Some(service));
        let base = inventory(vec![
            Entity::Host(h1.clone()),
            Entity::Address(entry(A1, service)),
        ]);
        let limits = Limits::default();
        let mut tx = Transaction::new(&base, &limits);

        claim(&mut tx, h1.id, A1).unwrap();

        assert_eq!(tx.get::<Host>(h1.id).unwrap().ip, Some(A1));
        assert_eq!(
            tx.get::<PoolEntry>(A1).unwrap().state,
            AddressState::Assigned { host: h1.id }
        );
    }

    #[test]
    fn test_claim_checks_pool_and_service() {
        let service = ServiceId::new();
        let other = ServiceId::new();
        let h1 = host(Some(service));
        let base = inventory(vec![
            Entity::Host(h1.clone()),
            Entity::Address(entry(A1, other)),
        ]);
        let limits = Limits::default();
        let mut tx = Transaction::new(&base, &limits);

        assert_eq!(
            claim(&mut tx, h1.id, A2).unwrap_err(),
            InventoryError::AddressUnavailable {
                address: A2,
                reason: Unavailable::NotInPool
            }
        );
        assert_eq!(
            claim(&mut tx, h1.id, A1).unwrap_err(),
            InventoryError::ServiceMismatch {
                address: A1,
                owner: other,
                requested: Some(service)
            }
        );
    }

    #[test]
    fn test_claim_replaces_previous_address() {
        let service = ServiceId::new();
        let h1 = host(Some(service));
        let base = inventory(vec![
            Entity::Host(h1.clone()),
            Entity::Address(entry(A1, service)),
            Entity::Address(entry(A2, service)),
        ]);
        let limits = Limits::default();
        let mut tx = Transaction::new(&base, &limits);

        claim(&mut tx, h1.id, A1).unwrap();
        claim(&mut tx, h1.id, A2).unwrap();

        assert_eq!(tx.get::<Host>(h1.id).unwrap().ip, Some(A2));
        assert_eq!(tx.get::<PoolEntry>(A1).unwrap().state, AddressState::Free);
    }

    #[test]
    fn test_release_is_idempotent() {
        let service = ServiceId::new();
        let h1 = host(Some(service));
        let base = inventory(vec![
            Entity::Host(h1.clone()),
            Entity::Address(entry(A1, service)),
        ]);
        let limits = Limits::default();
        let mut tx = Transaction::new(&base, &limits);

        claim(&mut tx, h1.id, A1).unwrap();
        release(&mut tx, A1).unwrap();
        release(&mut tx, A1).unwrap();
        release(&mut tx, A2).unwrap();

        assert_eq!(tx.get::<Host>(h1.id).unwrap().ip, None);
        assert_eq!(tx.get::<PoolEntry>(A1).unwrap().state, AddressState::Free);
    }

    #[test]
    fn test_highest_free_skips_assigned() {
        let service = ServiceId::new();
        let h1 = host(Some(service));
        let base = inventory(vec![
            Entity::Host(h1.clone()),
            Entity::Address(entry(A1, service)),
            Entity::Address(entry(A2, service)),
        ]);
        let limits = Limits::default();
        let mut tx = Transaction::new(&base, &limits);

        assert_eq!(highest_free(&mut tx, service), Some(A2));
        claim(&mut tx, h1.id, A2).unwrap();
        assert_eq!(highest_free(&mut tx, service), Some(A1));
    }
}
