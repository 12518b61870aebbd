//! Shared fakes for the integration tests.

use async_trait::async_trait;
use index_migrations::{
    IndexBackend, IndexDescriptor, IndexError, IndexHealth, Migration, MigrationError,
    MigrationState, MigrationType, StateError, StateRepository,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::Mutex;

/// In-memory state repository that buffers writes until `refresh`, the way
/// a near-real-time search index keeps new documents invisible to search
/// until the next refresh.
#[derive(Default)]
pub struct InMemoryStateRepository {
    visible: Mutex<HashMap<String, MigrationState>>,
    staged: Mutex<Vec<MigrationState>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, as an administrator data-fix would.
    pub async fn seed(&self, state: MigrationState) {
        self.visible.lock().await.insert(state.id.clone(), state);
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn add(&self, state: &MigrationState) -> Result<(), StateError> {
        self.staged.lock().await.push(state.clone());
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<MigrationState>, StateError> {
        Ok(self.visible.lock().await.values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<MigrationState>, StateError> {
        Ok(self.visible.lock().await.get(id).cloned())
    }

    async fn refresh(&self) -> Result<(), StateError> {
        let mut visible = self.visible.lock().await;
        for state in self.staged.lock().await.drain(..) {
            visible.insert(state.id.clone(), state);
        }
        Ok(())
    }
}

/// Always-green index backend recording created indices.
#[derive(Default)]
pub struct FakeIndexBackend {
    indices: Mutex<HashMap<String, IndexDescriptor>>,
    create_calls: AtomicU32,
}

impl FakeIndexBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `create_index` was invoked.
    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexBackend for FakeIndexBackend {
    async fn create_index(
        &self,
        name: &str,
        descriptor: &IndexDescriptor,
    ) -> Result<(), IndexError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.indices
            .lock()
            .await
            .entry(name.to_string())
            .or_insert_with(|| descriptor.clone());
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), IndexError> {
        self.indices.lock().await.remove(name);
        Ok(())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, IndexError> {
        Ok(self.indices.lock().await.contains_key(name))
    }

    async fn health(&self, _name: &str) -> Result<IndexHealth, IndexError> {
        Ok(IndexHealth::Green)
    }

    async fn refresh(&self, _name: &str) -> Result<(), IndexError> {
        Ok(())
    }
}

/// Migration whose behavior is scripted by the test: fails its first
/// `fail_first` invocations, succeeds afterward, and counts every call.
pub struct ScriptedMigration {
    migration_type: MigrationType,
    version: StdMutex<Option<u32>>,
    type_name: String,
    fail_first: u32,
    invocations: AtomicU32,
}

impl ScriptedMigration {
    pub fn new(migration_type: MigrationType, version: Option<u32>, name: &str) -> Self {
        Self {
            migration_type,
            version: StdMutex::new(version),
            type_name: name.to_string(),
            fail_first: 0,
            invocations: AtomicU32::new(0),
        }
    }

    pub fn versioned(version: u32) -> Self {
        Self::new(MigrationType::Versioned, Some(version), "versioned")
    }

    pub fn resumable(version: u32) -> Self {
        Self::new(
            MigrationType::VersionedAndResumable,
            Some(version),
            "resumable",
        )
    }

    pub fn repeatable(name: &str, version: Option<u32>) -> Self {
        Self::new(MigrationType::Repeatable, version, name)
    }

    /// Fail the first `count` invocations with "Boom".
    pub fn failing_first(mut self, count: u32) -> Self {
        self.fail_first = count;
        self
    }

    /// Advance (or clear) the declared version, as an application does when
    /// it wants a repeatable migration to run again.
    pub fn set_version(&self, version: Option<u32>) {
        *self.version.lock().expect("Should lock version") = version;
    }

    /// How many times `run` was invoked across all runs.
    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Migration for ScriptedMigration {
    fn migration_type(&self) -> MigrationType {
        self.migration_type
    }

    fn version(&self) -> Option<u32> {
        *self.version.lock().expect("Should lock version")
    }

    async fn run(&self) -> Result<(), MigrationError> {
        let attempt = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(MigrationError::Failed("Boom".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> String {
        self.type_name.clone()
    }
}
