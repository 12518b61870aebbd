//! The migration abstraction supplied by the application.
//!
//! A migration is a unit of work that transforms stored documents or index
//! structure. Implementations declare a [`MigrationType`] and an optional
//! version; the manager derives an identity from those and decides when
//! the migration is pending.
//!
//! # Overview
//!
//! - `Versioned` migrations run at most once, identified by their version
//! - `VersionedAndResumable` migrations additionally retry in-process on
//!   transient failure
//! - `Repeatable` migrations re-run whenever their declared version
//!   advances past the last recorded one

mod types;

pub use types::{Migration, MigrationError, MigrationResult, MigrationType};
