//! Typed interface over the migration state index.

use super::types::MigrationState;
use async_trait::async_trait;
use thiserror::Error;

/// Error types for state repository operations.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Document CRUD against the dedicated migration state index.
///
/// Implementations wrap the application's search backend. The record count
/// is bounded by the realistic number of migrations, typically tens, so
/// `get_all` returns everything unpaged. The only write guarantee required
/// is single-document upsert keyed by `id`; there are no transactional
/// semantics beyond that.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Upsert a record by its id.
    async fn add(&self, state: &MigrationState) -> Result<(), StateError>;

    /// Return every record in the state index.
    async fn get_all(&self) -> Result<Vec<MigrationState>, StateError>;

    /// Return one record, or `None` if absent.
    async fn get_by_id(&self, id: &str) -> Result<Option<MigrationState>, StateError>;

    /// Make writes issued by this process visible to subsequent reads.
    ///
    /// Backed by the index refresh of the underlying search backend. The
    /// manager calls this after each write whose effect the next status
    /// computation must see.
    async fn refresh(&self) -> Result<(), StateError>;
}
