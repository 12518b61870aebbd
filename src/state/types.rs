//! The durable per-migration state record.

use crate::migration::MigrationType;
use crate::utils::now_iso;
use serde::{Deserialize, Serialize};

/// Durable record of a migration's most recent attempt.
///
/// One record exists per migration identity, rewritten at the end of each
/// attempt. `completed_utc` is present only if the most recent attempt
/// succeeded; `error_message` only if it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationState {
    /// Identity string: the version number for versioned migrations, the
    /// implementation's type name for repeatable ones.
    pub id: String,

    /// Version number (0 for a repeatable migration without one).
    pub version: u32,

    /// Classification of the migration this record tracks.
    pub migration_type: MigrationType,

    /// When the most recent attempt began (ISO 8601).
    pub started_utc: String,

    /// When the most recent attempt succeeded, if it did.
    pub completed_utc: Option<String>,

    /// Failure message of the most recent attempt, cleared on success.
    pub error_message: Option<String>,
}

impl MigrationState {
    /// Create a record for an attempt starting now.
    pub fn started(id: String, version: u32, migration_type: MigrationType) -> Self {
        Self {
            id,
            version,
            migration_type,
            started_utc: now_iso(),
            completed_utc: None,
            error_message: None,
        }
    }

    /// True if the most recent attempt succeeded.
    pub fn is_completed(&self) -> bool {
        self.completed_utc.is_some()
    }
}
