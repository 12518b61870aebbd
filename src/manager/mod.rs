//! The migration manager.
//!
//! The manager owns the registered-migration list and orchestrates runs:
//! it computes which migrations are pending, takes the global migration
//! lock, executes pending migrations strictly sequentially, and records
//! every attempt in the state index.
//!
//! # Usage
//!
//! ```ignore
//! let mut manager = MigrationManager::new(repository, backend, locks);
//! manager.register(Arc::new(AddTagsField))?;
//! let result = manager.run_migrations().await?;
//! ```

mod status;

pub use status::{compute_status, MigrationStatus};

use crate::index::{ensure_state_index, IndexBackend, IndexError};
use crate::lock::{LockError, LockProvider};
use crate::migration::{Migration, MigrationResult, MigrationType};
use crate::state::{MigrationState, StateError, StateRepository};
use crate::utils::{now_iso, DEFAULT_STATE_INDEX, MIGRATIONS_LOCK_KEY};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Maximum in-process run attempts for a resumable migration within a
/// single run. The counter is not persisted; every run starts afresh.
const MAX_RUN_ATTEMPTS: u32 = 3;

/// Error types for manager operations.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Migration with identity '{0}' is already registered")]
    DuplicateMigration(String),

    #[error("Migrations cannot be registered after the first status query or run")]
    RegistrationClosed,

    #[error("State error: {0}")]
    StateError(#[from] StateError),

    #[error("Lock error: {0}")]
    LockError(#[from] LockError),

    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),
}

/// Tunables for the manager.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    /// Name of the index holding migration state records.
    pub state_index: String,

    /// How long to wait for the global migration lock before giving up.
    pub lock_acquire_timeout: Duration,

    /// Upper bound a distributed lock keeps the lease alive; a single run
    /// must fit within it.
    pub lock_lease_timeout: Duration,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            state_index: DEFAULT_STATE_INDEX.to_string(),
            lock_acquire_timeout: Duration::from_secs(30 * 60),
            lock_lease_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Registers migrations and executes the pending ones exactly once across
/// concurrent processes.
///
/// Collaborators are injected at construction. The registered-migration
/// list is read-only after the first status query or run.
pub struct MigrationManager {
    migrations: Vec<Arc<dyn Migration>>,
    repository: Arc<dyn StateRepository>,
    backend: Arc<dyn IndexBackend>,
    locks: Arc<dyn LockProvider>,
    options: MigrationOptions,
    frozen: AtomicBool,
    index_ready: AtomicBool,
}

impl MigrationManager {
    /// Create a manager with default options.
    pub fn new(
        repository: Arc<dyn StateRepository>,
        backend: Arc<dyn IndexBackend>,
        locks: Arc<dyn LockProvider>,
    ) -> Self {
        Self::with_options(repository, backend, locks, MigrationOptions::default())
    }

    /// Create a manager with explicit options.
    pub fn with_options(
        repository: Arc<dyn StateRepository>,
        backend: Arc<dyn IndexBackend>,
        locks: Arc<dyn LockProvider>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            migrations: Vec::new(),
            repository,
            backend,
            locks,
            options,
            frozen: AtomicBool::new(false),
            index_ready: AtomicBool::new(false),
        }
    }

    /// Register a migration.
    ///
    /// Identities must be unique among registered migrations; registration
    /// order breaks ties between equal versions and orders repeatable
    /// migrations. Fails once the manager has served a status query or a
    /// run.
    pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), ManagerError> {
        if self.frozen.load(Ordering::SeqCst) {
            return Err(ManagerError::RegistrationClosed);
        }

        if let Some(identity) = migration.identity() {
            let duplicate = self
                .migrations
                .iter()
                .any(|m| m.identity().as_deref() == Some(identity.as_str()));
            if duplicate {
                return Err(ManagerError::DuplicateMigration(identity));
            }
        }

        self.migrations.push(migration);
        Ok(())
    }

    /// Compute the current migration status.
    ///
    /// Never takes the global lock. On a fresh installation this creates
    /// the state index if missing and writes the bootstrap record, marking
    /// all historical versioned migrations as applied, then recomputes.
    pub async fn get_migration_status(&self) -> Result<MigrationStatus, ManagerError> {
        self.frozen.store(true, Ordering::SeqCst);
        self.ensure_index().await?;

        let states = self.repository.get_all().await?;
        if states.is_empty() {
            if let Some(latest) = self.max_registered_version() {
                self.write_bootstrap_record(latest).await?;
                let states = self.repository.get_all().await?;
                return Ok(compute_status(&self.migrations, &states));
            }
        }

        Ok(compute_status(&self.migrations, &states))
    }

    /// Execute all pending migrations.
    ///
    /// Serialises against other processes via the global migration lock.
    /// Returns `Failed` when the lock is contended or a migration fails
    /// terminally; storage and lock-provider errors propagate as `Err`.
    pub async fn run_migrations(&self) -> Result<MigrationResult, ManagerError> {
        let status = self.get_migration_status().await?;
        if !status.needs_migration {
            info!("No migrations pending");
            return Ok(MigrationResult::Success);
        }

        let guard = self
            .locks
            .try_acquire(
                MIGRATIONS_LOCK_KEY,
                self.options.lock_acquire_timeout,
                self.options.lock_lease_timeout,
            )
            .await?;
        let Some(_guard) = guard else {
            warn!("Could not acquire the migration lock; another process is migrating");
            return Ok(MigrationResult::Failed);
        };

        // Another process may have advanced the state while we waited.
        let status = self.get_migration_status().await?;

        for migration in &status.pending_migrations {
            if !self.execute(migration).await? {
                return Ok(MigrationResult::Failed);
            }
        }

        info!(
            count = status.pending_migrations.len(),
            "Migrations completed successfully"
        );
        Ok(MigrationResult::Success)
    }

    /// Return all persisted state records, for operator inspection after a
    /// failed run.
    pub async fn migration_states(&self) -> Result<Vec<MigrationState>, ManagerError> {
        self.ensure_index().await?;
        Ok(self.repository.get_all().await?)
    }

    /// Create the configured state index on first use. Later calls are a
    /// no-op; creation itself is idempotent and lock-gated, so concurrent
    /// first calls converge.
    async fn ensure_index(&self) -> Result<(), ManagerError> {
        if self.index_ready.load(Ordering::SeqCst) {
            return Ok(());
        }
        ensure_state_index(
            self.backend.as_ref(),
            self.locks.as_ref(),
            &self.options.state_index,
        )
        .await?;
        self.index_ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn max_registered_version(&self) -> Option<u32> {
        self.migrations
            .iter()
            .filter(|m| m.migration_type().is_versioned())
            .filter_map(|m| m.version())
            .max()
    }

    /// Write the fresh-install record marking every historical versioned
    /// migration as already applied. The upsert is keyed by the version
    /// string, so two processes racing here converge on one record.
    async fn write_bootstrap_record(&self, version: u32) -> Result<(), ManagerError> {
        info!(version, "Fresh installation; recording versioned migrations as applied");

        let now = now_iso();
        let record = MigrationState {
            id: version.to_string(),
            version,
            migration_type: MigrationType::Versioned,
            started_utc: now.clone(),
            completed_utc: Some(now),
            error_message: None,
        };
        self.repository.add(&record).await?;
        self.repository.refresh().await?;
        Ok(())
    }

    /// Run one migration, recording the attempt. Returns whether it
    /// succeeded; `Err` is reserved for storage failures.
    async fn execute(&self, migration: &Arc<dyn Migration>) -> Result<bool, ManagerError> {
        let Some(id) = migration.identity() else {
            return Ok(true); // pending migrations always carry an identity
        };
        let migration_type = migration.migration_type();
        let max_attempts = match migration_type {
            MigrationType::VersionedAndResumable => MAX_RUN_ATTEMPTS,
            _ => 1,
        };

        let mut record = MigrationState::started(
            id.clone(),
            migration.version().unwrap_or(0),
            migration_type,
        );
        self.repository.add(&record).await?;

        let mut attempt = 1;
        loop {
            info!(migration = %id, attempt, "Running migration");

            match migration.run().await {
                Ok(()) => {
                    record.completed_utc = Some(now_iso());
                    record.error_message = None;
                    self.repository.add(&record).await?;
                    self.repository.refresh().await?;
                    info!(migration = %id, "Migration completed");
                    return Ok(true);
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        migration = %id,
                        attempt,
                        error = %e,
                        "Migration attempt failed; retrying"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    error!(migration = %id, error = %e, "Migration failed");
                    record.completed_utc = None;
                    record.error_message = Some(e.to_string());
                    self.repository.add(&record).await?;
                    self.repository.refresh().await?;
                    return Ok(false);
                }
            }
        }
    }
}
