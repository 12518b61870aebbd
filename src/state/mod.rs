//! Durable migration state: the per-migration record and the repository
//! interface over the index that stores it.

mod repository;
mod types;

pub use repository::{StateError, StateRepository};
pub use types::MigrationState;
