//! Types for the migration abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised from a user migration's `run`.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

/// Classification of a migration.
///
/// The classification decides how a migration is identified, when it is
/// pending, and whether a failed run may be retried in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MigrationType {
    /// Identified by an integer version; at most one successful execution
    /// across all time.
    Versioned,
    /// As `Versioned`, but the run may be retried in-process after a
    /// transient failure.
    VersionedAndResumable,
    /// Identified by its implementation's type name; re-executed whenever
    /// its declared version advances past the last recorded one.
    Repeatable,
}

impl MigrationType {
    /// True for the version-identified kinds.
    pub fn is_versioned(self) -> bool {
        matches!(self, Self::Versioned | Self::VersionedAndResumable)
    }
}

/// Trait for a single migration.
///
/// Implementations supply the classification, an optional version, and the
/// work itself. The manager never inspects a migration beyond these.
#[async_trait]
pub trait Migration: Send + Sync {
    /// The classification of this migration.
    fn migration_type(&self) -> MigrationType;

    /// The migration's version.
    ///
    /// Required for the versioned kinds; a versioned migration returning
    /// `None` is ignored entirely. For `Repeatable` this is the current
    /// desired version, and `None` means "do not run yet".
    fn version(&self) -> Option<u32>;

    /// Perform the work.
    async fn run(&self) -> Result<(), MigrationError>;

    // This needs to be on the trait itself (rather than a standalone
    // function), so that `&self` is the underlying type. This ensures that
    // calling `name()` on a `dyn Migration` will get the name of the
    // erased type.
    fn name(&self) -> String {
        let full_name = std::any::type_name_of_val(self);
        // Strip any generic or lifetime annotations from the type name
        // e.g., "PopulateTags<'_>" -> "PopulateTags"
        full_name
            .split('<')
            .next()
            .unwrap_or(full_name)
            .to_string()
    }

    /// The string under which this migration's state record is keyed.
    ///
    /// Versioned kinds are keyed by their version number; repeatable
    /// migrations by their type name. `None` means the migration has no
    /// identity (a versioned migration without a version) and is ignored.
    fn identity(&self) -> Option<String> {
        match self.migration_type() {
            MigrationType::Versioned | MigrationType::VersionedAndResumable => {
                self.version().map(|v| v.to_string())
            }
            MigrationType::Repeatable => Some(self.name()),
        }
    }
}

/// Outcome of a migration run.
///
/// A run aggregates over all attempted migrations; there is no partial
/// result. On `Failed` the operator inspects the state records to find the
/// migration carrying a non-null error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationResult {
    Success,
    Failed,
}

impl MigrationResult {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}
