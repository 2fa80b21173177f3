// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Engine
//!
//! In-process API over the committed inventory. Every mutating call is one
//! atomic transaction:
//!
//! ```text
//! Operation → discover scopes → lock scopes → plan (overlay) → settle
//!                  ↑                                 │
//!                  └──── widen if plan escaped ──────┘
//!                                                    ↓
//!                              journal append → apply to committed state
//! ```
//!
//! # Transaction Semantics
//!
//! 1. Plan once against committed state to learn which scopes are touched
//! 2. Acquire those scopes in order, with one deadline for the whole call
//! 3. Plan again under the locks; widen and retry if new scopes appear
//! 4. Append the net change set to the journal, one commit at a time
//! 5. Apply it to the committed state under a short write lock
//!
//! Readers and planners in other scopes keep running while a commit waits
//! on journal I/O.
//!
//! A failure at any step drops the overlay, so nothing is partially applied.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audit::{self, Violation};
use crate::cascade;
use crate::config::EngineConfig;
use crate::domain::{
    AddressRange, DatacenterId, Entity, EntityId, EntityKind, EntityPatch, HostId, NewDatacenter,
    NewHost, NewRack, NewRoom, NewService, RackId, RoomId, ServiceId,
};
use crate::errors::{InventoryError, InventoryResult};
use crate::locks::{LockScope, LockTable};
use crate::operations::Operation;
use crate::store::{CommitRecord, Inventory, Journal, MemoryJournal, Transaction};

/// Transactional inventory engine
pub struct InventoryEngine {
    config: EngineConfig,
    state: RwLock<Inventory>,
    locks: LockTable,
    journal: Arc<dyn Journal>,
    /// Orders journal appends; the state lock is only taken to apply
    commit: Mutex<()>,
}

impl std::fmt::Debug for InventoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl InventoryEngine {
    /// Create an empty engine backed by an in-memory journal
    pub fn new(config: EngineConfig) -> InventoryResult<Self> {
        config.validate()?;
        Ok(Self::with_state(
            config,
            Inventory::new(),
            Arc::new(MemoryJournal::new()),
        ))
    }

    /// Rebuild the committed state from `journal` and keep appending to it
    pub async fn open(config: EngineConfig, journal: Arc<dyn Journal>) -> InventoryResult<Self> {
        config.validate()?;
        let records = journal.replay().await?;
        let count = records.len();
        let inventory = Inventory::from_records(records)?;
        info!(
            "Replayed {} journal records, inventory at version {}",
            count,
            inventory.version()
        );
        Ok(Self::with_state(config, inventory, journal))
    }

    fn with_state(config: EngineConfig, inventory: Inventory, journal: Arc<dyn Journal>) -> Self {
        let locks = LockTable::new(config.lock_table_prune_threshold);
        Self {
            config,
            state: RwLock::new(inventory),
            locks,
            journal,
            commit: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one operation as an atomic transaction
    async fn execute(&self, op: Operation) -> InventoryResult<()> {
        let label = op.label();
        let timeout = self.config.lock_timeout();
        let deadline = Instant::now() + timeout;
        let limits = &self.config.limits;

        let mut wanted: BTreeSet<LockScope> = {
            let inventory = self.state.read().await;
            let mut tx = Transaction::new(&inventory, limits);
            // Only the touched scopes matter here; the locked plan decides the outcome.
            let _ = op.plan(&mut tx).and_then(|_| cascade::settle(&mut tx));
            tx.touched().clone()
        };

        loop {
            let guard = self.locks.acquire(&wanted, deadline, timeout).await?;

            let inventory = self.state.read().await;
            let mut tx = Transaction::new(&inventory, limits);
            let planned = op.plan(&mut tx).and_then(|_| cascade::settle(&mut tx));

            if !tx.touched().is_subset(guard.scopes()) {
                let extra = tx.touched().difference(guard.scopes()).count();
                debug!("{} touched {} unlocked scopes, widening", label, extra);
                wanted.extend(tx.touched().iter().cloned());
                continue;
            }

            if let Err(err) = planned {
                debug!("{} rejected: {}", label, err);
                return Err(err);
            }

            let changes = tx.into_changes();
            drop(inventory);
            if changes.is_empty() {
                debug!("{} changed nothing", label);
                return Ok(());
            }

            let _commit = self.commit.lock().await;
            let sequence = self.state.read().await.version() + 1;
            let record = CommitRecord::new(sequence, label.as_str(), changes);
            if let Err(err) = self.journal.append(&record).await {
                warn!("{} rolled back, journal append failed: {}", label, err);
                return Err(err);
            }
            self.state.write().await.apply(&record.changes);
            info!(
                "Committed {} as version {} ({} records)",
                label,
                record.sequence,
                record.changes.len()
            );
            return Ok(());
        }
    }

    /// Create a datacenter
    ///
    /// # Errors
    /// - `InvalidName`, `DuplicateKey` on the name
    /// - `InvalidHeight` for a zero height
    pub async fn create_datacenter(&self, attrs: NewDatacenter) -> InventoryResult<DatacenterId> {
        let id = DatacenterId::new();
        self.execute(Operation::CreateDatacenter { id, attrs }).await?;
        Ok(id)
    }

    /// Create a room inside an existing datacenter
    pub async fn create_room(&self, attrs: NewRoom) -> InventoryResult<RoomId> {
        let id = RoomId::new();
        self.execute(Operation::CreateRoom { id, attrs }).await?;
        Ok(id)
    }

    /// Create a rack inside an existing room
    ///
    /// # Errors
    /// - `HeightExceeded` when taller than the room or below the minimum
    pub async fn create_rack(&self, attrs: NewRack) -> InventoryResult<RackId> {
        let id = RackId::new();
        self.execute(Operation::CreateRack { id, attrs }).await?;
        Ok(id)
    }

    /// Mount a host in a rack, optionally binding an address
    ///
    /// # Errors
    /// - `SlotOutOfRange`, `SlotConflict` for a bad position
    /// - `AddressUnavailable`, `ServiceMismatch` for an explicit address
    pub async fn create_host(&self, attrs: NewHost) -> InventoryResult<HostId> {
        let id = HostId::new();
        self.execute(Operation::CreateHost { id, attrs }).await?;
        Ok(id)
    }

    pub async fn create_service(&self, attrs: NewService) -> InventoryResult<ServiceId> {
        let id = ServiceId::new();
        self.execute(Operation::CreateService { id, attrs }).await?;
        Ok(id)
    }

    /// Apply a patch; renames and moves propagate to every derived field
    pub async fn update_entity(&self, id: EntityId, patch: EntityPatch) -> InventoryResult<()> {
        self.execute(Operation::Update { id, patch }).await
    }

    /// Delete a record and everything it contains
    pub async fn delete_entity(&self, id: EntityId) -> InventoryResult<()> {
        self.execute(Operation::Delete(id)).await
    }

    /// Bind `address` from `service`'s pool to `host`
    pub async fn assign_ip(
        &self,
        service: ServiceId,
        address: Ipv4Addr,
        host: HostId,
    ) -> InventoryResult<()> {
        self.execute(Operation::AssignIp {
            service,
            address,
            host,
        })
        .await
    }

    /// Free an address; releasing a free or unknown address is a no-op
    pub async fn release_ip(&self, address: Ipv4Addr) -> InventoryResult<()> {
        self.execute(Operation::ReleaseIp(address)).await
    }

    pub async fn add_pool_entry(&self, service: ServiceId, address: Ipv4Addr) -> InventoryResult<()> {
        let range = AddressRange::from_bounds(address, address)?;
        self.execute(Operation::AddPool { service, range }).await
    }

    /// Add every address of `range` to `service`'s pool, all or nothing
    pub async fn add_pool_range(&self, service: ServiceId, range: AddressRange) -> InventoryResult<()> {
        self.execute(Operation::AddPool { service, range }).await
    }

    pub async fn get_entity(&self, id: EntityId) -> InventoryResult<Entity> {
        self.state
            .read()
            .await
            .entity(id)
            .ok_or(InventoryError::NotFound(id))
    }

    /// Direct children of a record
    ///
    /// Services list their racks, hosts and pool entries.
    pub async fn list_children(&self, id: EntityId) -> InventoryResult<Vec<Entity>> {
        self.state
            .read()
            .await
            .children(id)
            .ok_or(InventoryError::NotFound(id))
    }

    pub async fn find_by_name(&self, kind: EntityKind, name: &str) -> InventoryResult<Entity> {
        let inventory = self.state.read().await;
        inventory
            .find_by_name(kind, name)
            .and_then(|id| inventory.entity(id))
            .ok_or_else(|| InventoryError::NameNotFound {
                kind,
                name: name.to_string(),
            })
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> Inventory {
        self.state.read().await.clone()
    }

    /// Number of committed transactions
    pub async fn version(&self) -> u64 {
        self.state.read().await.version()
    }

    /// Recount every derived field and check every invariant
    pub async fn audit(&self) -> Vec<Violation> {
        let inventory = self.state.read().await;
        audit::audit(&inventory, &self.config.limits)
    }
}
