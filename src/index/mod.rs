//! Index backend collaborator interface and the migration state index.
//!
//! The backend is assumed to exist; this module only specifies what the
//! orchestrator needs from it (index lifecycle, health, refresh) and owns
//! the descriptor and bootstrap of the dedicated index that hosts
//! migration state records.

use crate::lock::{LockError, LockProvider};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Document type hosted by the migration state index.
pub const STATE_DOC_TYPE: &str = "migrations";

/// Lock timeout for the index-creation path.
const CREATE_INDEX_LOCK_TIMEOUT: Duration = Duration::from_secs(60);

/// Error types for index backend operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Index '{0}' is not in a usable state")]
    Unhealthy(String),

    #[error("Could not acquire lock '{0}'")]
    LockContended(String),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

/// Cluster health of a single index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexHealth {
    Green,
    Yellow,
    Red,
}

impl IndexHealth {
    /// True if the index can serve reads and writes.
    pub fn is_operational(self) -> bool {
        matches!(self, Self::Green | Self::Yellow)
    }
}

/// Mapping type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Keyword,
    Integer,
    Date,
    Text,
}

/// Mapping of a single field in an index descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Descriptor of an index: its document type and field mappings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    /// Name of the single document type hosted by the index.
    pub doc_type: String,

    /// Field mappings keyed by field name.
    pub properties: BTreeMap<String, FieldMapping>,
}

/// What the orchestrator needs from the index subsystem.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Create an index. Idempotent; implementations verify cluster health
    /// is yellow or green afterward and fail otherwise.
    async fn create_index(&self, name: &str, descriptor: &IndexDescriptor)
        -> Result<(), IndexError>;

    /// Delete an index. Idempotent.
    async fn delete_index(&self, name: &str) -> Result<(), IndexError>;

    /// Whether the named index exists.
    async fn index_exists(&self, name: &str) -> Result<bool, IndexError>;

    /// Health of the named index.
    async fn health(&self, name: &str) -> Result<IndexHealth, IndexError>;

    /// Make previously written documents visible to the next read.
    async fn refresh(&self, name: &str) -> Result<(), IndexError>;
}

/// Descriptor of the migration state index.
pub fn state_index_descriptor() -> IndexDescriptor {
    let fields = [
        ("id", FieldType::Keyword),
        ("version", FieldType::Integer),
        ("migrationType", FieldType::Keyword),
        ("startedUtc", FieldType::Date),
        ("completedUtc", FieldType::Date),
        ("errorMessage", FieldType::Text),
    ];

    IndexDescriptor {
        doc_type: STATE_DOC_TYPE.to_string(),
        properties: fields
            .into_iter()
            .map(|(name, field_type)| (name.to_string(), FieldMapping { field_type }))
            .collect(),
    }
}

/// Create the migration state index if it does not exist yet.
///
/// Idempotent: an already-present index is a no-op once a health check
/// confirms it is green or yellow. Creation is gated by a per-index lock
/// so two processes bootstrapping concurrently do not race.
pub async fn ensure_state_index(
    backend: &dyn IndexBackend,
    locks: &dyn LockProvider,
    name: &str,
) -> Result<(), IndexError> {
    if backend.index_exists(name).await? {
        let health = backend.health(name).await?;
        if !health.is_operational() {
            return Err(IndexError::Unhealthy(name.to_string()));
        }
        return Ok(());
    }

    let key = format!("create-index:{name}");
    let guard = locks
        .try_acquire(&key, CREATE_INDEX_LOCK_TIMEOUT, CREATE_INDEX_LOCK_TIMEOUT)
        .await?;
    let Some(_guard) = guard else {
        return Err(IndexError::LockContended(key));
    };

    // Another process may have created the index while we waited.
    if backend.index_exists(name).await? {
        let health = backend.health(name).await?;
        if !health.is_operational() {
            return Err(IndexError::Unhealthy(name.to_string()));
        }
        return Ok(());
    }

    info!(index = %name, "Creating migration state index");
    backend.create_index(name, &state_index_descriptor()).await
}
