// Copyright (c) 2025 - Cowboy AI, Inc.
//! Datacenter inventory engine for the Composable Information Machine
//!
//! Keeps the physical hierarchy (datacenter → room → rack → host), the
//! services leasing it and their address pools consistent under concurrent
//! mutation. Every counter, capacity and denormalized reference is owned by
//! the cascade engine; callers only write base attributes.
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_inventory::{EngineConfig, InventoryEngine, NewDatacenter, NewRoom};
//!
//! # async fn run() -> cim_inventory::InventoryResult<()> {
//! let engine = InventoryEngine::new(EngineConfig::default())?;
//! let dc = engine.create_datacenter(NewDatacenter::new("D1").with_height(60)).await?;
//! let room = engine.create_room(NewRoom::new("R1", dc)).await?;
//! assert!(engine.audit().await.is_empty());
//! # let _ = room;
//! # Ok(())
//! # }
//! ```

pub(crate) mod allocator;
pub mod audit;
pub(crate) mod cascade;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod locks;
pub(crate) mod operations;
pub mod state_machine;
pub mod store;
pub mod validator;

pub use audit::Violation;
pub use config::{EngineConfig, Limits};
pub use domain::{
    AddressRange, AddressRequest, AddressState, Datacenter, DatacenterId, DatacenterPatch, Entity,
    EntityId, EntityKind, EntityPatch, Host, HostId, HostPatch, NewDatacenter, NewHost, NewRack,
    NewRoom, NewService, PoolEntry, Rack, RackId, RackPatch, Room, RoomId, RoomPatch, Service,
    ServiceId, ServicePatch,
};
pub use engine::InventoryEngine;
pub use errors::{HeightLimit, InventoryError, InventoryResult, Unavailable};
pub use store::{Change, CommitRecord, FileJournal, Inventory, Journal, MemoryJournal};
