// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Domain Models
//!
//! Records of the physical hierarchy, services and address pools, together
//! with the value objects and caller-facing write shapes.
//!
//! # Records
//!
//! - [`Datacenter`] → [`Room`] → [`Rack`] → [`Host`]
//! - [`Service`] leases racks and hosts independently of the hierarchy
//! - [`PoolEntry`] is one address in a service's pool
//!
//! # Value Objects with Invariants
//!
//! - [`AddressRange`] - inclusive IPv4 range or CIDR block
//! - [`validate_name`] - record naming rules
//!
//! # Write Shapes
//!
//! - `New*` attributes for creation
//! - [`EntityPatch`] for updates

pub mod entities;
pub mod ids;
pub mod names;
pub mod network;
pub mod patch;

pub use entities::{AddressState, Datacenter, Entity, Host, PoolEntry, Rack, Room, Service};
pub use ids::{DatacenterId, EntityId, EntityKind, HostId, RackId, RoomId, ServiceId};
pub use names::{validate_name, NameError};
pub use network::{AddressRange, NetworkError};
pub use patch::{
    AddressRequest, DatacenterPatch, EntityPatch, HostPatch, NewDatacenter, NewHost, NewRack,
    NewRoom, NewService, RackPatch, RoomPatch, ServicePatch,
};
