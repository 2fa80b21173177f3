// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-inventory
//!
//! Builds the standard site used across integration tests:
//!
//! ```text
//! D1 (60) → R1 (60) → K1 (42)
//! svc-a, pool 10.0.0.1-10.0.0.4
//! ```
//!
//! Names are fixed; ids are whatever the engine hands out.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use cim_inventory::{
    AddressRange, CommitRecord, DatacenterId, EngineConfig, Entity, EntityId, Host, HostId,
    InventoryEngine, InventoryError, InventoryResult, Journal, MemoryJournal, NewDatacenter,
    NewHost, NewRack, NewRoom, NewService, PoolEntry, Rack, RackId, Room, RoomId, Service,
    ServiceId,
};

/// Last octet helper for the 10.0.0.0/24 test network
pub fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

/// Standard site: one datacenter, room, rack and a service with a pool
pub struct Site {
    pub engine: InventoryEngine,
    pub dc: DatacenterId,
    pub room: RoomId,
    pub rack: RackId,
    pub service: ServiceId,
}

pub async fn site() -> Site {
    site_on(InventoryEngine::new(EngineConfig::default()).expect("default config is valid")).await
}

/// Build the standard site on an existing engine
pub async fn site_on(engine: InventoryEngine) -> Site {
    let dc = engine
        .create_datacenter(NewDatacenter::new("D1").with_height(60))
        .await
        .expect("create D1");
    let room = engine
        .create_room(NewRoom::new("R1", dc).with_height(60))
        .await
        .expect("create R1");
    let rack = engine
        .create_rack(NewRack::new("K1", room).with_height(42))
        .await
        .expect("create K1");
    let service = engine
        .create_service(NewService::new("svc-a", "user-1"))
        .await
        .expect("create svc-a");
    engine
        .add_pool_range(service, AddressRange::from_bounds(ip(1), ip(4)).expect("range"))
        .await
        .expect("add pool");

    Site {
        engine,
        dc,
        room,
        rack,
        service,
    }
}

impl Site {
    /// Host of `height` units at `position` in K1
    pub async fn host(&self, name: &str, height: u32, position: u32) -> InventoryResult<HostId> {
        self.engine
            .create_host(NewHost::new(name, self.rack, height).at(position))
            .await
    }

    /// Same as [`Site::host`] but inside the service
    pub async fn service_host(
        &self,
        name: &str,
        height: u32,
        position: u32,
    ) -> InventoryResult<HostId> {
        self.engine
            .create_host(
                NewHost::new(name, self.rack, height)
                    .at(position)
                    .with_service(self.service),
            )
            .await
    }

    pub async fn room_record(&self, id: RoomId) -> Room {
        room(&self.engine, id).await
    }

    pub async fn rack_record(&self, id: RackId) -> Rack {
        rack(&self.engine, id).await
    }

    pub async fn host_record(&self, id: HostId) -> Host {
        host(&self.engine, id).await
    }

    pub async fn service_record(&self) -> Service {
        service(&self.engine, self.service).await
    }

    pub async fn entry(&self, address: Ipv4Addr) -> PoolEntry {
        entry(&self.engine, address).await
    }

    /// Fail the test with every violation the audit finds
    pub async fn assert_consistent(&self) {
        assert_consistent(&self.engine).await;
    }
}

pub async fn assert_consistent(engine: &InventoryEngine) {
    let violations = engine.audit().await;
    assert!(violations.is_empty(), "audit found: {:#?}", violations);
}

pub async fn room(engine: &InventoryEngine, id: RoomId) -> Room {
    match engine.get_entity(id.into()).await {
        Ok(Entity::Room(room)) => room,
        other => panic!("expected room {}, got {:?}", id, other),
    }
}

pub async fn rack(engine: &InventoryEngine, id: RackId) -> Rack {
    match engine.get_entity(id.into()).await {
        Ok(Entity::Rack(rack)) => rack,
        other => panic!("expected rack {}, got {:?}", id, other),
    }
}

pub async fn host(engine: &InventoryEngine, id: HostId) -> Host {
    match engine.get_entity(id.into()).await {
        Ok(Entity::Host(host)) => host,
        other => panic!("expected host {}, got {:?}", id, other),
    }
}

pub async fn service(engine: &InventoryEngine, id: ServiceId) -> Service {
    match engine.get_entity(id.into()).await {
        Ok(Entity::Service(service)) => service,
        other => panic!("expected service {}, got {:?}", id, other),
    }
}

pub async fn entry(engine: &InventoryEngine, address: Ipv4Addr) -> PoolEntry {
    match engine.get_entity(EntityId::Address(address)).await {
        Ok(Entity::Address(entry)) => entry,
        other => panic!("expected pool entry {}, got {:?}", address, other),
    }
}

/// In-memory journal whose appends can be made to fail
#[derive(Debug, Default)]
pub struct FlakyJournal {
    inner: MemoryJournal,
    failing: AtomicBool,
}

impl FlakyJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_appends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl Journal for FlakyJournal {
    async fn append(&self, record: &CommitRecord) -> InventoryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(InventoryError::StorageError("disk unavailable".into()));
        }
        self.inner.append(record).await
    }

    async fn replay(&self) -> InventoryResult<Vec<CommitRecord>> {
        self.inner.replay().await
    }
}

/// In-memory journal that can park appends until released
#[derive(Debug, Default)]
pub struct GatedJournal {
    inner: MemoryJournal,
    holding: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl GatedJournal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Park every following append until [`GatedJournal::release`]
    pub fn hold(&self) {
        self.holding.store(true, Ordering::SeqCst);
    }

    /// Resolves once an append is parked
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.holding.store(false, Ordering::SeqCst);
        self.released.notify_one();
    }
}

#[async_trait]
impl Journal for GatedJournal {
    async fn append(&self, record: &CommitRecord) -> InventoryResult<()> {
        if self.holding.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.append(record).await
    }

    async fn replay(&self) -> InventoryResult<Vec<CommitRecord>> {
        self.inner.replay().await
    }
}
