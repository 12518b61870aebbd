/// The key of the global lock gating a full migration run
pub const MIGRATIONS_LOCK_KEY: &str = "migrations";

/// Default name of the index holding migration state records
pub const DEFAULT_STATE_INDEX: &str = "migrations";

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
