// Copyright (c) 2025 - Cowboy AI, Inc.
//! Scoped Locks for Transactions
//!
//! Every transaction holds one guard per [`LockScope`] it reads or writes.
//! A datacenter scope covers the datacenter record and every room, rack and
//! host inside it, so two mutations in different datacenters never contend
//! while two hosts in the same rack always serialize on their datacenter.
//!
//! Scopes are acquired in their total order (`BTreeSet` iteration), which
//! rules out lock-order deadlocks. Acquisition has a deadline; guards are
//! released on drop.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{DatacenterId, EntityKind, ServiceId};
use crate::errors::{InventoryError, InventoryResult};

/// Unit of mutual exclusion between transactions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockScope {
    /// Unique name of a record kind
    Name(EntityKind, String),
    /// A datacenter and everything physically inside it
    Datacenter(DatacenterId),
    /// A service record and its address pool membership
    Service(ServiceId),
    /// One pool entry, present or not
    Address(Ipv4Addr),
}

impl fmt::Display for LockScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockScope::Name(kind, name) => write!(f, "name:{}:{}", kind, name),
            LockScope::Datacenter(id) => write!(f, "{}", id),
            LockScope::Service(id) => write!(f, "{}", id),
            LockScope::Address(ip) => write!(f, "address:{}", ip),
        }
    }
}

/// Guards for a set of scopes, released together on drop
#[derive(Debug)]
pub struct ScopeGuard {
    scopes: BTreeSet<LockScope>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ScopeGuard {
    pub fn scopes(&self) -> &BTreeSet<LockScope> {
        &self.scopes
    }
}

/// Table of per-scope mutexes
#[derive(Debug)]
pub struct LockTable {
    entries: Mutex<HashMap<LockScope, Arc<Mutex<()>>>>,
    prune_threshold: usize,
}

impl LockTable {
    pub fn new(prune_threshold: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            prune_threshold,
        }
    }

    /// Number of scopes currently tracked
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn handles(&self, scopes: &BTreeSet<LockScope>) -> Vec<(LockScope, Arc<Mutex<()>>)> {
        let mut entries = self.entries.lock().await;

        if entries.len() > self.prune_threshold {
            // Only the table holds an idle entry.
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        scopes
            .iter()
            .map(|scope| {
                let lock = entries.entry(scope.clone()).or_default().clone();
                (scope.clone(), lock)
            })
            .collect()
    }

    /// Acquire every scope in order, failing with `Timeout` at the deadline
    pub async fn acquire(
        &self,
        scopes: &BTreeSet<LockScope>,
        deadline: Instant,
        timeout: Duration,
    ) -> InventoryResult<ScopeGuard> {
        let handles = self.handles(scopes).await;

        let acquire_all = async {
            let mut guards = Vec::with_capacity(handles.len());
            for (scope, lock) in handles {
                let guard = match lock.clone().try_lock_owned() {
                    Ok(guard) => guard,
                    Err(_) => {
                        debug!("Waiting for lock {}", scope);
                        lock.lock_owned().await
                    }
                };
                guards.push(guard);
            }
            guards
        };

        match tokio::time::timeout_at(deadline, acquire_all).await {
            Ok(guards) => Ok(ScopeGuard {
                scopes: scopes.clone(),
                _guards: guards,
            }),
            Err(_) => Err(InventoryError::Timeout(timeout)),
        }
    }
}
