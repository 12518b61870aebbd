//! Pending-migration computation.

use crate::migration::{Migration, MigrationType};
use crate::state::MigrationState;
use std::sync::Arc;

/// Snapshot of what a migration run would do, computed from the registered
/// migrations and the persisted state records.
pub struct MigrationStatus {
    /// Migrations requiring execution, in execution order: versioned kinds
    /// first ascending by version, then repeatable ones in registration
    /// order.
    pub pending_migrations: Vec<Arc<dyn Migration>>,

    /// True iff `pending_migrations` is non-empty.
    pub needs_migration: bool,

    /// Highest version among successfully completed versioned records,
    /// 0 if none.
    pub current_version: u32,
}

impl std::fmt::Debug for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending: Vec<_> = self
            .pending_migrations
            .iter()
            .filter_map(|m| m.identity())
            .collect();
        f.debug_struct("MigrationStatus")
            .field("pending_migrations", &pending)
            .field("needs_migration", &self.needs_migration)
            .field("current_version", &self.current_version)
            .finish()
    }
}

/// Decide which registered migrations are pending against the given state
/// records.
///
/// Versioned migrations without a version are ignored. A versioned
/// migration is pending while its version exceeds the highest completed
/// version: anything at or below that threshold is considered done, even
/// without a record of its own (the fresh-install bootstrap writes a
/// single record at the latest version to cover all of history), while a
/// failed attempt at the frontier leaves the threshold behind and so
/// stays pending and retries on the next run. A repeatable migration is
/// pending while its declared version exceeds the recorded one (a `None`
/// version means "do not run", whether or not a record exists).
pub fn compute_status(
    migrations: &[Arc<dyn Migration>],
    states: &[MigrationState],
) -> MigrationStatus {
    let current_version = states
        .iter()
        .filter(|s| s.migration_type.is_versioned() && s.is_completed())
        .map(|s| s.version)
        .max()
        .unwrap_or(0);

    let mut versioned: Vec<Arc<dyn Migration>> = Vec::new();
    let mut repeatable: Vec<Arc<dyn Migration>> = Vec::new();

    for migration in migrations {
        match migration.migration_type() {
            MigrationType::Versioned | MigrationType::VersionedAndResumable => {
                let Some(version) = migration.version() else {
                    continue; // ignored entirely
                };
                // Done once the completed-version threshold has passed it.
                // A failed frontier attempt has no completion record, so
                // its version stays above the threshold and it retries.
                if version > current_version {
                    versioned.push(Arc::clone(migration));
                }
            }
            MigrationType::Repeatable => {
                let Some(version) = migration.version() else {
                    continue; // "do not run yet"
                };
                let id = migration.name();
                let pending = match states.iter().find(|s| s.id == id) {
                    None => true,
                    Some(record) => record.version < version,
                };
                if pending {
                    repeatable.push(Arc::clone(migration));
                }
            }
        }
    }

    // Stable sort, so equal versions keep registration order.
    versioned.sort_by_key(|m| m.version());

    let mut pending = versioned;
    pending.extend(repeatable);

    MigrationStatus {
        needs_migration: !pending.is_empty(),
        current_version,
        pending_migrations: pending,
    }
}
