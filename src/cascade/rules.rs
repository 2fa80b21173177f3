// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cascade Rule Table
//!
//! Maps each base change to the ordered list of derived updates it implies.
//! The table is a pure function of the before/after images; executing the
//! steps is the job of [`super::run`].
//!
//! ```text
//! rules_for(BaseChange) → [Cascade]
//! ```
//!
//! Counter rules are incremental deltas. Datacenter rack/host totals and
//! rack capacity are deferred to one full recomputation per transaction.

use std::net::Ipv4Addr;

use super::{BaseChange, Deferred};
use crate::domain::{DatacenterId, HostId, RackId, RoomId, ServiceId};

/// A maintained counter field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    DatacenterRooms(DatacenterId),
    RoomRacks(RoomId),
    RoomHosts(RoomId),
    RackHosts(RackId),
    ServiceRacks(ServiceId),
    ServiceHosts(ServiceId),
    ServiceAddresses(ServiceId),
}

/// One derived update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cascade {
    Adjust(Counter, i64),
    /// Free an address before its host goes away
    ReleaseAddress(Ipv4Addr),
    /// Rewrite denormalized fields of every room below a datacenter
    ResyncDatacenter(DatacenterId),
    /// Rewrite a room's denormalized fields, then its racks
    ResyncRoom(RoomId),
    /// Rewrite a rack's denormalized fields, then its hosts
    ResyncRack(RackId),
    ResyncHost(HostId),
    /// Rewrite service names copied onto racks and hosts
    ResyncService(ServiceId),
    Defer(Deferred),
}

fn moved<T: Copy + PartialEq>(before: T, after: T, counter: fn(T) -> Counter, by: i64) -> Vec<Cascade> {
    if before == after {
        return Vec::new();
    }
    vec![
        Cascade::Adjust(counter(before), -by),
        Cascade::Adjust(counter(after), by),
    ]
}

fn optional(id: Option<ServiceId>, counter: fn(ServiceId) -> Counter, by: i64) -> Vec<Cascade> {
    id.map(|id| Cascade::Adjust(counter(id), by)).into_iter().collect()
}

fn reassigned(
    before: Option<ServiceId>,
    after: Option<ServiceId>,
    counter: fn(ServiceId) -> Counter,
) -> Vec<Cascade> {
    if before == after {
        return Vec::new();
    }
    let mut steps = optional(before, counter, -1);
    steps.extend(optional(after, counter, 1));
    steps
}

fn count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Derived updates implied by a base change, in execution order
pub(crate) fn rules_for(change: &BaseChange) -> Vec<Cascade> {
    use Cascade::*;
    use Counter::*;

    let mut steps = Vec::new();
    match change {
        BaseChange::DatacenterInserted(_) | BaseChange::DatacenterDeleted(_) => {}
        BaseChange::DatacenterUpdated { before, after } => {
            if before.name != after.name {
                steps.push(ResyncDatacenter(after.id));
            }
        }

        BaseChange::RoomInserted(room) => {
            steps.push(Adjust(DatacenterRooms(room.dc_id), 1));
            steps.push(Defer(Deferred::RecountDatacenter(room.dc_id)));
        }
        BaseChange::RoomUpdated { before, after } => {
            steps.extend(moved(before.dc_id, after.dc_id, DatacenterRooms, 1));
            if before.dc_id != after.dc_id || before.name != after.name {
                steps.push(ResyncRoom(after.id));
            }
            steps.push(Defer(Deferred::RecountDatacenter(before.dc_id)));
            steps.push(Defer(Deferred::RecountDatacenter(after.dc_id)));
        }
        BaseChange::RoomDeleted(room) => {
            steps.push(Adjust(DatacenterRooms(room.dc_id), -1));
            steps.push(Defer(Deferred::RecountDatacenter(room.dc_id)));
        }

        BaseChange::RackInserted(rack) => {
            steps.push(Adjust(RoomRacks(rack.room_id), 1));
            steps.extend(optional(rack.service_id, ServiceRacks, 1));
            steps.push(Defer(Deferred::RecomputeRackCapacity(rack.id)));
            steps.push(Defer(Deferred::RecountDatacenter(rack.dc_id)));
        }
        BaseChange::RackUpdated { before, after } => {
            steps.extend(moved(before.room_id, after.room_id, RoomRacks, 1));
            // Hosts travel with their rack.
            steps.extend(moved(
                before.room_id,
                after.room_id,
                RoomHosts,
                count(before.hosts_count),
            ));
            steps.extend(reassigned(before.service_id, after.service_id, ServiceRacks));
            if before.room_id != after.room_id || before.name != after.name {
                steps.push(ResyncRack(after.id));
            }
            if before.height != after.height {
                steps.push(Defer(Deferred::RecomputeRackCapacity(after.id)));
            }
            steps.push(Defer(Deferred::RecountDatacenter(before.dc_id)));
            steps.push(Defer(Deferred::RecountDatacenter(after.dc_id)));
        }
        BaseChange::RackDeleted(rack) => {
            steps.push(Adjust(RoomRacks(rack.room_id), -1));
            steps.extend(optional(rack.service_id, ServiceRacks, -1));
            steps.push(Defer(Deferred::RecountDatacenter(rack.dc_id)));
        }

        BaseChange::HostInserted(host) => {
            steps.push(Adjust(RackHosts(host.rack_id), 1));
            steps.push(Adjust(RoomHosts(host.room_id), 1));
            steps.extend(optional(host.service_id, ServiceHosts, 1));
            steps.push(Defer(Deferred::RecomputeRackCapacity(host.rack_id)));
            steps.push(Defer(Deferred::RecountDatacenter(host.dc_id)));
        }
        BaseChange::HostUpdated { before, after } => {
            steps.extend(moved(before.rack_id, after.rack_id, RackHosts, 1));
            steps.extend(moved(before.room_id, after.room_id, RoomHosts, 1));
            steps.extend(reassigned(before.service_id, after.service_id, ServiceHosts));
            steps.push(Defer(Deferred::RecomputeRackCapacity(before.rack_id)));
            steps.push(Defer(Deferred::RecomputeRackCapacity(after.rack_id)));
            steps.push(Defer(Deferred::RecountDatacenter(before.dc_id)));
            steps.push(Defer(Deferred::RecountDatacenter(after.dc_id)));
        }
        BaseChange::HostDeleted(host) => {
            if let Some(address) = host.ip {
                steps.push(ReleaseAddress(address));
            }
            steps.push(Adjust(RackHosts(host.rack_id), -1));
            steps.push(Adjust(RoomHosts(host.room_id), -1));
            steps.extend(optional(host.service_id, ServiceHosts, -1));
            steps.push(Defer(Deferred::RecomputeRackCapacity(host.rack_id)));
            steps.push(Defer(Deferred::RecountDatacenter(host.dc_id)));
        }

        BaseChange::ServiceInserted(_) | BaseChange::ServiceDeleted(_) => {}
        BaseChange::ServiceUpdated { before, after } => {
            if before.name != after.name {
                steps.push(ResyncService(after.id));
            }
        }

        BaseChange::AddressAdded(entry) => {
            steps.push(Adjust(ServiceAddresses(entry.service_id), 1));
        }
        BaseChange::AddressRemoved(entry) => {
            steps.push(Adjust(ServiceAddresses(entry.service_id), -1));
        }
    }
    steps
}
