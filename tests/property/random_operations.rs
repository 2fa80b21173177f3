// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Randomized Operation Sequences
//!
//! Operations refer to earlier records by index, so a sequence can aim at
//! records that were never created or already deleted; those calls fail
//! and must leave no trace. Whatever the sequence, the audit must come back
//! empty and replaying the journal must rebuild the same inventory.

use std::net::Ipv4Addr;
use std::sync::Arc;

use proptest::prelude::*;

use cim_inventory::{
    AddressRange, AddressRequest, DatacenterId, EngineConfig, EntityId, EntityKind, EntityPatch,
    HostId, HostPatch, Inventory, InventoryEngine, Journal, MemoryJournal, NewDatacenter, NewHost,
    NewRack, NewRoom, NewService, RackId, RackPatch, RoomId, RoomPatch, ServiceId,
};

// ============================================================================
// Operation Model
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    CreateDatacenter { height: Option<u32> },
    CreateRoom { dc: usize, height: Option<u32> },
    CreateRack { room: usize, height: u32, service: Option<usize> },
    CreateHost {
        rack: usize,
        height: u32,
        position: Option<u32>,
        service: Option<usize>,
        auto_ip: bool,
    },
    CreateService,
    AddPool { service: usize, start: u8, len: u8 },
    MoveRoom { room: usize, dc: usize },
    MoveRack { rack: usize, room: usize },
    MoveHost { host: usize, rack: usize, position: u32 },
    ResizeRoom { room: usize, height: u32 },
    ResizeRack { rack: usize, height: u32 },
    SetRackService { rack: usize, service: Option<usize> },
    SetHostService { host: usize, service: Option<usize> },
    Rename { target: Target, index: usize, name: u8 },
    AssignIp { service: usize, host: usize, last: u8 },
    SetHostIp { host: usize, last: Option<u8> },
    ReleaseIp { last: u8 },
    Delete { target: Target, index: usize },
    DeleteAddress { last: u8 },
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Datacenter,
    Room,
    Rack,
    Host,
    Service,
}

fn address(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

fn target() -> impl Strategy<Value = Target> {
    prop_oneof![
        1 => Just(Target::Datacenter),
        1 => Just(Target::Room),
        1 => Just(Target::Rack),
        1 => Just(Target::Host),
        1 => Just(Target::Service),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    let idx = 0usize..6;
    prop_oneof![
        1 => prop::option::of(30u32..80).prop_map(|height| Op::CreateDatacenter { height }),
        1 => (idx.clone(), prop::option::of(30u32..80))
            .prop_map(|(dc, height)| Op::CreateRoom { dc, height }),
        1 => (idx.clone(), 10u32..70, prop::option::of(0usize..3))
            .prop_map(|(room, height, service)| Op::CreateRack { room, height, service }),
        3 => (
            idx.clone(),
            1u32..5,
            prop::option::of(1u32..50),
            prop::option::of(0usize..3),
            any::<bool>()
        )
            .prop_map(|(rack, height, position, service, auto_ip)| Op::CreateHost {
                rack,
                height,
                position,
                service,
                auto_ip
            }),
        1 => Just(Op::CreateService),
        1 => (0usize..3, 1u8..20, 1u8..6).prop_map(|(service, start, len)| Op::AddPool {
            service,
            start,
            len
        }),
        1 => (idx.clone(), idx.clone()).prop_map(|(room, dc)| Op::MoveRoom { room, dc }),
        1 => (idx.clone(), idx.clone()).prop_map(|(rack, room)| Op::MoveRack { rack, room }),
        1 => (idx.clone(), idx.clone(), 1u32..50)
            .prop_map(|(host, rack, position)| Op::MoveHost { host, rack, position }),
        1 => (idx.clone(), 10u32..80).prop_map(|(room, height)| Op::ResizeRoom { room, height }),
        1 => (idx.clone(), 10u32..70).prop_map(|(rack, height)| Op::ResizeRack { rack, height }),
        1 => (idx.clone(), prop::option::of(0usize..3))
            .prop_map(|(rack, service)| Op::SetRackService { rack, service }),
        1 => (idx.clone(), prop::option::of(0usize..3))
            .prop_map(|(host, service)| Op::SetHostService { host, service }),
        1 => (target(), idx.clone(), 0u8..4).prop_map(|(target, index, name)| Op::Rename {
            target,
            index,
            name
        }),
        2 => (0usize..3, idx.clone(), 1u8..20)
            .prop_map(|(service, host, last)| Op::AssignIp { service, host, last }),
        1 => (idx.clone(), prop::option::of(1u8..20))
            .prop_map(|(host, last)| Op::SetHostIp { host, last }),
        1 => (1u8..20).prop_map(|last| Op::ReleaseIp { last }),
        1 => (target(), idx).prop_map(|(target, index)| Op::Delete { target, index }),
        1 => (1u8..20).prop_map(|last| Op::DeleteAddress { last }),
    ]
}

fn op_sequence() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 1..40)
}

// ============================================================================
// Driver
// ============================================================================

/// Ids handed out so far, deleted ones included
#[derive(Default)]
struct Created {
    datacenters: Vec<DatacenterId>,
    rooms: Vec<RoomId>,
    racks: Vec<RackId>,
    hosts: Vec<HostId>,
    services: Vec<ServiceId>,
    names: usize,
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()])
    }
}

impl Created {
    fn name(&mut self, prefix: &str) -> String {
        self.names += 1;
        format!("{}{}", prefix, self.names)
    }

    fn id(&self, target: Target, index: usize) -> Option<EntityId> {
        match target {
            Target::Datacenter => pick(&self.datacenters, index).map(EntityId::from),
            Target::Room => pick(&self.rooms, index).map(EntityId::from),
            Target::Rack => pick(&self.racks, index).map(EntityId::from),
            Target::Host => pick(&self.hosts, index).map(EntityId::from),
            Target::Service => pick(&self.services, index).map(EntityId::from),
        }
    }
}

fn kind(target: Target) -> EntityKind {
    match target {
        Target::Datacenter => EntityKind::Datacenter,
        Target::Room => EntityKind::Room,
        Target::Rack => EntityKind::Rack,
        Target::Host => EntityKind::Host,
        Target::Service => EntityKind::Service,
    }
}

/// Run one operation; rejected operations are part of the model
async fn run(engine: &InventoryEngine, created: &mut Created, op: Op) {
    match op {
        Op::CreateDatacenter { height } => {
            let mut attrs = NewDatacenter::new(created.name("D"));
            attrs.height = height;
            if let Ok(id) = engine.create_datacenter(attrs).await {
                created.datacenters.push(id);
            }
        }
        Op::CreateRoom { dc, height } => {
            let Some(dc) = pick(&created.datacenters, dc) else { return };
            let mut attrs = NewRoom::new(created.name("R"), dc);
            attrs.height = height;
            if let Ok(id) = engine.create_room(attrs).await {
                created.rooms.push(id);
            }
        }
        Op::CreateRack { room, height, service } => {
            let Some(room) = pick(&created.rooms, room) else { return };
            let mut attrs = NewRack::new(created.name("K"), room).with_height(height);
            attrs.service = service.and_then(|s| pick(&created.services, s));
            if let Ok(id) = engine.create_rack(attrs).await {
                created.racks.push(id);
            }
        }
        Op::CreateHost { rack, height, position, service, auto_ip } => {
            let Some(rack) = pick(&created.racks, rack) else { return };
            let mut attrs = NewHost::new(created.name("H"), rack, height);
            attrs.position = position;
            attrs.service = service.and_then(|s| pick(&created.services, s));
            if auto_ip {
                attrs.address = AddressRequest::Auto;
            }
            if let Ok(id) = engine.create_host(attrs).await {
                created.hosts.push(id);
            }
        }
        Op::CreateService => {
            let name = created.name("svc");
            if let Ok(id) = engine.create_service(NewService::new(name, "owner")).await {
                created.services.push(id);
            }
        }
        Op::AddPool { service, start, len } => {
            let Some(service) = pick(&created.services, service) else { return };
            let end = start.saturating_add(len - 1);
            if let Ok(range) = AddressRange::from_bounds(address(start), address(end)) {
                let _ = engine.add_pool_range(service, range).await;
            }
        }
        Op::MoveRoom { room, dc } => {
            let (Some(room), Some(dc)) = (pick(&created.rooms, room), pick(&created.datacenters, dc))
            else {
                return;
            };
            let patch = RoomPatch { datacenter: Some(dc), ..Default::default() };
            let _ = engine.update_entity(room.into(), patch.into()).await;
        }
        Op::MoveRack { rack, room } => {
            let (Some(rack), Some(room)) = (pick(&created.racks, rack), pick(&created.rooms, room))
            else {
                return;
            };
            let patch = RackPatch { room: Some(room), ..Default::default() };
            let _ = engine.update_entity(rack.into(), patch.into()).await;
        }
        Op::MoveHost { host, rack, position } => {
            let (Some(host), Some(rack)) = (pick(&created.hosts, host), pick(&created.racks, rack))
            else {
                return;
            };
            let patch = HostPatch {
                rack: Some(rack),
                position: Some(position),
                ..Default::default()
            };
            let _ = engine.update_entity(host.into(), patch.into()).await;
        }
        Op::ResizeRoom { room, height } => {
            let Some(room) = pick(&created.rooms, room) else { return };
            let patch = RoomPatch { height: Some(height), ..Default::default() };
            let _ = engine.update_entity(room.into(), patch.into()).await;
        }
        Op::ResizeRack { rack, height } => {
            let Some(rack) = pick(&created.racks, rack) else { return };
            let patch = RackPatch { height: Some(height), ..Default::default() };
            let _ = engine.update_entity(rack.into(), patch.into()).await;
        }
        Op::SetRackService { rack, service } => {
            let Some(rack) = pick(&created.racks, rack) else { return };
            let service = service.and_then(|s| pick(&created.services, s));
            let patch = RackPatch { service: Some(service), ..Default::default() };
            let _ = engine.update_entity(rack.into(), patch.into()).await;
        }
        Op::SetHostService { host, service } => {
            let Some(host) = pick(&created.hosts, host) else { return };
            let service = service.and_then(|s| pick(&created.services, s));
            let patch = HostPatch { service: Some(service), ..Default::default() };
            let _ = engine.update_entity(host.into(), patch.into()).await;
        }
        Op::Rename { target, index, name } => {
            let Some(id) = created.id(target, index) else { return };
            // Small name space so renames collide with each other
            let name = format!("N{}", name);
            if let Some(patch) = EntityPatch::rename(kind(target), name) {
                let _ = engine.update_entity(id, patch).await;
            }
        }
        Op::AssignIp { service, host, last } => {
            let (Some(service), Some(host)) =
                (pick(&created.services, service), pick(&created.hosts, host))
            else {
                return;
            };
            let _ = engine.assign_ip(service, address(last), host).await;
        }
        Op::SetHostIp { host, last } => {
            let Some(host) = pick(&created.hosts, host) else { return };
            let patch = HostPatch { ip: Some(last.map(address)), ..Default::default() };
            let _ = engine.update_entity(host.into(), patch.into()).await;
        }
        Op::ReleaseIp { last } => {
            let released = engine.release_ip(address(last)).await;
            assert!(released.is_ok(), "release never fails: {:?}", released);
        }
        Op::Delete { target, index } => {
            if let Some(id) = created.id(target, index) {
                let _ = engine.delete_entity(id).await;
            }
        }
        Op::DeleteAddress { last } => {
            let _ = engine.delete_entity(EntityId::Address(address(last))).await;
        }
    }
}

/// Run a sequence on a fresh engine; returns the engine and its journal
fn execute(ops: Vec<Op>) -> (InventoryEngine, Arc<MemoryJournal>) {
    tokio_test::block_on(async {
        let journal = Arc::new(MemoryJournal::new());
        let engine = InventoryEngine::open(EngineConfig::default(), journal.clone())
            .await
            .unwrap();
        let mut created = Created::default();
        for op in ops {
            run(&engine, &mut created, op).await;
        }
        (engine, journal)
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every invariant holds after any operation sequence
    ///
    /// Counters, capacity, denormalized fields, slot geometry and address
    /// bindings must all agree with a full recount.
    #[test]
    fn prop_audit_is_clean_after_any_sequence(ops in op_sequence()) {
        let (engine, _) = execute(ops);
        let violations = tokio_test::block_on(engine.audit());
        prop_assert!(violations.is_empty(), "violations: {:#?}", violations);
    }

    /// Property: replaying the journal rebuilds the committed state
    #[test]
    fn prop_journal_replay_is_exact(ops in op_sequence()) {
        let (engine, journal) = execute(ops);
        let (committed, replayed) = tokio_test::block_on(async {
            let records = journal.replay().await.unwrap();
            (engine.snapshot().await, Inventory::from_records(records).unwrap())
        });
        prop_assert_eq!(committed, replayed);
    }

    /// Property: racks never exceed their room or fall below the minimum
    #[test]
    fn prop_rack_heights_stay_in_bounds(ops in op_sequence()) {
        let (engine, _) = execute(ops);
        let snapshot = tokio_test::block_on(engine.snapshot());
        let limits = engine.config().limits.clone();
        for rack in snapshot.racks() {
            let room = snapshot.room(rack.room_id).unwrap();
            prop_assert!(rack.height <= room.height);
            prop_assert!(rack.height >= limits.min_rack_height);
        }
    }
}
