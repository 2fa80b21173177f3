// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for inventory operations
//!
//! Every error aborts the transaction that raised it; nothing is retried by
//! the engine. [`InventoryError::is_retryable`] tells callers which failures
//! are transient (storage and lock deadlines) as opposed to rejected input.

use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{EntityId, EntityKind, NetworkError, ServiceId};

/// Which height limit a rack violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightLimit {
    /// The rack may not be taller than its room
    RoomHeight,
    /// Fixed minimum rack size
    RackMinimum,
}

impl std::fmt::Display for HeightLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeightLimit::RoomHeight => write!(f, "room height"),
            HeightLimit::RackMinimum => write!(f, "minimum rack height"),
        }
    }
}

/// Why an address could not be handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// No pool entry exists for the address
    NotInPool,
    /// The entry is bound to another host
    Assigned,
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::NotInPool => write!(f, "not in any pool"),
            Unavailable::Assigned => write!(f, "already assigned"),
        }
    }
}

/// Errors that can occur in inventory operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// Name already used by another entity of the same kind
    #[error("{kind} named '{name}' already exists")]
    DuplicateKey { kind: EntityKind, name: String },

    /// Referenced entity does not exist
    #[error("{0} not found")]
    NotFound(EntityId),

    /// No record of the kind carries the name
    #[error("no {kind} named '{name}'")]
    NameNotFound { kind: EntityKind, name: String },

    /// Rack height outside its allowed bound
    #[error("rack '{rack}' height {height} violates {limit} {bound}")]
    HeightExceeded {
        rack: String,
        height: u32,
        bound: u32,
        limit: HeightLimit,
    },

    /// Height outside the allowed range for the entity kind
    #[error("{kind} '{name}' height {height} outside allowed range {min}..={max}")]
    InvalidHeight {
        kind: EntityKind,
        name: String,
        height: u32,
        min: u32,
        max: u32,
    },

    /// Host slot range overlaps another host in the same rack
    #[error(
        "host '{host}' at [{position}, {}) in rack '{rack}' overlaps host '{occupant}'",
        .position + .height
    )]
    SlotConflict {
        rack: String,
        host: String,
        position: u32,
        height: u32,
        occupant: String,
    },

    /// Host slot range does not fit inside the rack
    #[error(
        "host '{host}' at [{position}, {}) does not fit rack '{rack}' of height {rack_height}",
        .position + .height
    )]
    SlotOutOfRange {
        rack: String,
        host: String,
        position: u32,
        height: u32,
        rack_height: u32,
    },

    /// Address cannot be assigned
    #[error("address {address} unavailable: {reason}")]
    AddressUnavailable { address: Ipv4Addr, reason: Unavailable },

    /// Address belongs to a different service than requested
    #[error("address {address} belongs to service {owner}, not {requested:?}")]
    ServiceMismatch {
        address: Ipv4Addr,
        owner: ServiceId,
        requested: Option<ServiceId>,
    },

    /// A stored record points at an ancestor that no longer exists
    #[error("{from} references missing {to}")]
    DanglingReference { from: EntityId, to: EntityId },

    /// Integrity failure detected while cascading
    #[error("constraint violated on {entity}: {detail}")]
    ConstraintViolation { entity: EntityId, detail: String },

    /// Name fails the naming rules
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: EntityKind,
        name: String,
        reason: String,
    },

    /// Address range could not be parsed or is out of bounds
    #[error("invalid address range: {0}")]
    InvalidRange(#[from] NetworkError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Lock acquisition deadline exceeded
    #[error("Operation timed out after {0:?} waiting for locks")]
    Timeout(Duration),

    /// Journal or storage layer failure
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl InventoryError {
    /// Whether a caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InventoryError::StorageError(_) | InventoryError::Timeout(_)
        )
    }

    pub(crate) fn violation(entity: impl Into<EntityId>, detail: impl Into<String>) -> Self {
        InventoryError::ConstraintViolation {
            entity: entity.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::StorageError(format!("serialization: {}", err))
    }
}

impl From<std::io::Error> for InventoryError {
    fn from(err: std::io::Error) -> Self {
        InventoryError::StorageError(err.to_string())
    }
}
