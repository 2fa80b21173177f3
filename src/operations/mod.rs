// Copyright (c) 2025 - Cowboy AI, Inc.
//! Operations and their Planners
//!
//! An [`Operation`] is one caller request: a create, update or delete of a
//! single record, or an address pool action. Planning an operation stages
//! all of its writes in a [`Transaction`]: validation first, then the base
//! write through the cascade engine, then any address binding it implies.
//!
//! # Planner Pattern
//!
//! ```text
//! plan(Transaction, Operation) → Result<(), InventoryError>
//! ```
//!
//! Planners never touch committed state. They may be run more than once for
//! the same operation (once to discover lock scopes, again under the locks),
//! so all inputs, including fresh ids, are carried by the operation itself.

use std::net::Ipv4Addr;

use crate::domain::{
    AddressRange, DatacenterId, EntityId, EntityPatch, HostId, NewDatacenter, NewHost, NewRack,
    NewRoom, NewService, RackId, RoomId, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::store::{Record, Transaction};

mod addresses;
mod create;
mod delete;
mod update;

/// A caller request, planned as one atomic transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    CreateDatacenter { id: DatacenterId, attrs: NewDatacenter },
    CreateRoom { id: RoomId, attrs: NewRoom },
    CreateRack { id: RackId, attrs: NewRack },
    CreateHost { id: HostId, attrs: NewHost },
    CreateService { id: ServiceId, attrs: NewService },
    Update { id: EntityId, patch: EntityPatch },
    Delete(EntityId),
    AssignIp {
        service: ServiceId,
        address: Ipv4Addr,
        host: HostId,
    },
    ReleaseIp(Ipv4Addr),
    AddPool {
        service: ServiceId,
        range: AddressRange,
    },
}

impl Operation {
    /// Name recorded in the journal
    pub(crate) fn label(&self) -> String {
        match self {
            Operation::CreateDatacenter { .. } => "create_datacenter".into(),
            Operation::CreateRoom { .. } => "create_room".into(),
            Operation::CreateRack { .. } => "create_rack".into(),
            Operation::CreateHost { .. } => "create_host".into(),
            Operation::CreateService { .. } => "create_service".into(),
            Operation::Update { id, .. } => format!("update_{}", id.kind()),
            Operation::Delete(id) => format!("delete_{}", id.kind()),
            Operation::AssignIp { .. } => "assign_ip".into(),
            Operation::ReleaseIp(_) => "release_ip".into(),
            Operation::AddPool { .. } => "add_pool".into(),
        }
    }

    /// Stage every write of this operation
    pub(crate) fn plan(&self, tx: &mut Transaction<'_>) -> InventoryResult<()> {
        match self {
            Operation::CreateDatacenter { id, attrs } => create::datacenter(tx, *id, attrs),
            Operation::CreateRoom { id, attrs } => create::room(tx, *id, attrs),
            Operation::CreateRack { id, attrs } => create::rack(tx, *id, attrs),
            Operation::CreateHost { id, attrs } => create::host(tx, *id, attrs),
            Operation::CreateService { id, attrs } => create::service(tx, *id, attrs),
            Operation::Update { id, patch } => update::entity(tx, *id, patch),
            Operation::Delete(id) => delete::entity(tx, *id),
            Operation::AssignIp {
                service,
                address,
                host,
            } => addresses::assign(tx, *service, *address, *host),
            Operation::ReleaseIp(address) => addresses::release(tx, *address),
            Operation::AddPool { service, range } => addresses::add_range(tx, *service, range),
        }
    }
}

/// Reject a name already held by another record of the same kind
fn ensure_unique<R: Record>(
    tx: &mut Transaction<'_>,
    name: &str,
    except: Option<R::Id>,
) -> InventoryResult<()> {
    match tx.name_in_use::<R>(name, except) {
        Some(_) => Err(InventoryError::DuplicateKey {
            kind: R::KIND,
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}
