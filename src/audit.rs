// Copyright (c) 2025 - Cowboy AI, Inc.
//! Full-Recount Consistency Audit
//!
//! Pure functions that recompute every derived field from scratch and compare
//! it with what the cascade engine stored. The audit never trusts a counter:
//! every count, capacity, denormalized reference and address binding is
//! rebuilt from the base records.
//!
//! # Invariant Categories
//!
//! 1. **Hierarchy**: parents exist, copied refs and names match them
//! 2. **Counters**: `*_count`, rack `capacity`, service `ips_count`
//! 3. **Geometry**: rack and host heights, slot fit, slot overlap
//! 4. **Addresses**: host `ip` and pool entry agree in both directions
//! 5. **Names**: unique within each kind

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::Limits;
use crate::domain::{EntityId, EntityKind, Host, RackId, ServiceId};
use crate::store::Inventory;

/// One broken invariant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub entity: EntityId,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.detail)
    }
}

#[derive(Default)]
struct Report(Vec<Violation>);

impl Report {
    fn flag(&mut self, entity: impl Into<EntityId>, detail: impl Into<String>) {
        self.0.push(Violation {
            entity: entity.into(),
            detail: detail.into(),
        });
    }

    fn count(&mut self, entity: impl Into<EntityId>, field: &str, stored: u64, actual: u64) {
        if stored != actual {
            self.flag(entity, format!("{} is {} but recount gives {}", field, stored, actual));
        }
    }

    fn same<T: PartialEq + fmt::Debug>(
        &mut self,
        entity: impl Into<EntityId>,
        field: &str,
        stored: &T,
        actual: &T,
    ) {
        if stored != actual {
            self.flag(entity, format!("{} is {:?}, expected {:?}", field, stored, actual));
        }
    }
}

fn tally<K: Ord>(keys: impl Iterator<Item = K>) -> BTreeMap<K, u64> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn lookup<K: Ord>(counts: &BTreeMap<K, u64>, key: &K) -> u64 {
    counts.get(key).copied().unwrap_or(0)
}

/// Check every invariant of `inventory`; an empty result means consistent
pub fn audit(inventory: &Inventory, limits: &Limits) -> Vec<Violation> {
    let mut report = Report::default();
    hierarchy(inventory, &mut report);
    counters(inventory, &mut report);
    geometry(inventory, limits, &mut report);
    addresses(inventory, &mut report);
    names(inventory, &mut report);
    report.0
}

fn hierarchy(inventory: &Inventory, report: &mut Report) {
    for room in inventory.rooms() {
        match inventory.datacenter(room.dc_id) {
            Some(dc) => report.same(room.id, "dc_name", &room.dc_name, &dc.name),
            None => report.flag(room.id, format!("datacenter {} is missing", room.dc_id)),
        }
    }

    for rack in inventory.racks() {
        match inventory.room(rack.room_id) {
            Some(room) => {
                report.same(rack.id, "dc_id", &rack.dc_id, &room.dc_id);
                report.same(rack.id, "room_name", &rack.room_name, &room.name);
                if let Some(dc) = inventory.datacenter(room.dc_id) {
                    report.same(rack.id, "dc_name", &rack.dc_name, &dc.name);
                }
            }
            None => report.flag(rack.id, format!("room {} is missing", rack.room_id)),
        }
        service_ref(inventory, rack.id, rack.service_id, &rack.service_name, report);
    }

    for host in inventory.hosts() {
        match inventory.rack(host.rack_id) {
            Some(rack) => {
                report.same(host.id, "room_id", &host.room_id, &rack.room_id);
                report.same(host.id, "dc_id", &host.dc_id, &rack.dc_id);
                report.same(host.id, "rack_name", &host.rack_name, &rack.name);
                report.same(host.id, "room_name", &host.room_name, &rack.room_name);
                report.same(host.id, "dc_name", &host.dc_name, &rack.dc_name);
            }
            None => report.flag(host.id, format!("rack {} is missing", host.rack_id)),
        }
        service_ref(inventory, host.id, host.service_id, &host.service_name, report);
    }

    for entry in inventory.pool() {
        if inventory.service(entry.service_id).is_none() {
            report.flag(
                entry.address,
                format!("service {} is missing", entry.service_id),
            );
        }
    }
}

fn service_ref(
    inventory: &Inventory,
    entity: impl Into<EntityId>,
    service: Option<ServiceId>,
    stored_name: &Option<String>,
    report: &mut Report,
) {
    let entity = entity.into();
    match service.map(|id| (id, inventory.service(id))) {
        None => report.same(entity, "service_name", stored_name, &None),
        Some((_, Some(service))) => {
            report.same(entity, "service_name", stored_name, &Some(service.name.clone()))
        }
        Some((id, None)) => report.flag(entity, format!("service {} is missing", id)),
    }
}

fn counters(inventory: &Inventory, report: &mut Report) {
    let rooms_by_dc = tally(inventory.rooms().map(|room| room.dc_id));
    let racks_by_dc = tally(inventory.racks().map(|rack| rack.dc_id));
    let hosts_by_dc = tally(inventory.hosts().map(|host| host.dc_id));
    for dc in inventory.datacenters() {
        report.count(dc.id, "rooms_count", dc.rooms_count, lookup(&rooms_by_dc, &dc.id));
        report.count(dc.id, "racks_count", dc.racks_count, lookup(&racks_by_dc, &dc.id));
        report.count(dc.id, "hosts_count", dc.hosts_count, lookup(&hosts_by_dc, &dc.id));
    }

    let racks_by_room = tally(inventory.racks().map(|rack| rack.room_id));
    let hosts_by_room = tally(inventory.hosts().map(|host| host.room_id));
    for room in inventory.rooms() {
        report.count(room.id, "racks_count", room.racks_count, lookup(&racks_by_room, &room.id));
        report.count(room.id, "hosts_count", room.hosts_count, lookup(&hosts_by_room, &room.id));
    }

    let hosts_by_rack = tally(inventory.hosts().map(|host| host.rack_id));
    let mut used: BTreeMap<RackId, u32> = BTreeMap::new();
    for host in inventory.hosts() {
        *used.entry(host.rack_id).or_insert(0) += host.height;
    }
    for rack in inventory.racks() {
        report.count(rack.id, "hosts_count", rack.hosts_count, lookup(&hosts_by_rack, &rack.id));
        let occupied = used.get(&rack.id).copied().unwrap_or(0);
        let free = rack.height.saturating_sub(occupied);
        if rack.capacity != free {
            report.flag(
                rack.id,
                format!("capacity is {} but {} units are free", rack.capacity, free),
            );
        }
    }

    let racks_by_service = tally(inventory.racks().filter_map(|rack| rack.service_id));
    let hosts_by_service = tally(inventory.hosts().filter_map(|host| host.service_id));
    let pool_by_service = tally(inventory.pool().map(|entry| entry.service_id));
    for service in inventory.services() {
        let id = service.id;
        report.count(id, "racks_count", service.racks_count, lookup(&racks_by_service, &id));
        report.count(id, "hosts_count", service.hosts_count, lookup(&hosts_by_service, &id));
        report.count(id, "ips_count", service.ips_count, lookup(&pool_by_service, &id));
    }
}

fn geometry(inventory: &Inventory, limits: &Limits, report: &mut Report) {
    for dc in inventory.datacenters() {
        if dc.height == 0 {
            report.flag(dc.id, "height is zero");
        }
    }
    for room in inventory.rooms() {
        if room.height == 0 {
            report.flag(room.id, "height is zero");
        }
    }

    for rack in inventory.racks() {
        if rack.height < limits.min_rack_height {
            report.flag(
                rack.id,
                format!("height {} below minimum {}", rack.height, limits.min_rack_height),
            );
        }
        if let Some(room) = inventory.room(rack.room_id) {
            if rack.height > room.height {
                report.flag(
                    rack.id,
                    format!("height {} above room height {}", rack.height, room.height),
                );
            }
        }
    }

    let mut by_rack: BTreeMap<RackId, Vec<&Host>> = BTreeMap::new();
    for host in inventory.hosts() {
        if host.height < limits.min_host_height || host.height > limits.max_host_height {
            report.flag(host.id, format!("height {} out of range", host.height));
        }
        by_rack.entry(host.rack_id).or_default().push(host);
    }

    for (rack_id, mut hosts) in by_rack {
        let Some(rack) = inventory.rack(rack_id) else {
            continue;
        };
        hosts.sort_by_key(|host| host.position);
        for host in &hosts {
            if host.position == 0 || host.slots().end - 1 > rack.height {
                report.flag(
                    host.id,
                    format!(
                        "slots [{}, {}) outside rack of height {}",
                        host.position,
                        host.slots().end,
                        rack.height
                    ),
                );
            }
        }
        for pair in hosts.windows(2) {
            if pair[0].overlaps(pair[1].position, pair[1].height) {
                report.flag(pair[1].id, format!("overlaps host '{}'", pair[0].name));
            }
        }
    }
}

fn addresses(inventory: &Inventory, report: &mut Report) {
    for host in inventory.hosts() {
        let Some(address) = host.ip else {
            continue;
        };
        match inventory.pool_entry(address) {
            None => report.flag(host.id, format!("ip {} is not in any pool", address)),
            Some(entry) => {
                if entry.bound_host() != Some(host.id) {
                    report.flag(host.id, format!("ip {} is not bound to this host", address));
                }
                if Some(entry.service_id) != host.service_id {
                    report.flag(
                        host.id,
                        format!("ip {} belongs to service {}", address, entry.service_id),
                    );
                }
            }
        }
    }

    for entry in inventory.pool() {
        if let Some(host_id) = entry.bound_host() {
            match inventory.host(host_id) {
                Some(host) if host.ip == Some(entry.address) => {}
                Some(_) => report.flag(entry.address, format!("{} does not hold it", host_id)),
                None => report.flag(entry.address, format!("bound to missing {}", host_id)),
            }
        }
    }
}

fn names(inventory: &Inventory, report: &mut Report) {
    let named: Vec<(EntityKind, &str, EntityId)> = inventory
        .datacenters()
        .map(|r| (EntityKind::Datacenter, r.name.as_str(), EntityId::from(r.id)))
        .chain(inventory.rooms().map(|r| (EntityKind::Room, r.name.as_str(), EntityId::from(r.id))))
        .chain(inventory.racks().map(|r| (EntityKind::Rack, r.name.as_str(), EntityId::from(r.id))))
        .chain(inventory.hosts().map(|r| (EntityKind::Host, r.name.as_str(), EntityId::from(r.id))))
        .chain(
            inventory
                .services()
                .map(|r| (EntityKind::Service, r.name.as_str(), EntityId::from(r.id))),
        )
        .collect();

    let mut seen: BTreeMap<(EntityKind, &str), EntityId> = BTreeMap::new();
    for (kind, name, id) in named {
        if let Some(first) = seen.insert((kind, name), id) {
            report.flag(id, format!("{} name '{}' also used by {}", kind, name, first));
        }
    }
}
