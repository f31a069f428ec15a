//! Concurrent task registry: the single source of truth for task state.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::TaskError;
use crate::tasks::model::TaskRecord;

/// In-memory map of task ID to record.
///
/// Every read returns a clone taken under the lock, and every mutation runs
/// to completion under the write lock, so readers never observe a half-applied
/// update.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Fails if the ID is already taken.
    pub async fn insert(&self, record: TaskRecord) -> Result<(), TaskError> {
        let mut tasks = self.tasks.write().await;
        match tasks.entry(record.id) {
            Entry::Occupied(_) => Err(TaskError::AlreadyExists { id: record.id }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Snapshot of a record by ID.
    pub async fn get(&self, id: Uuid) -> Result<TaskRecord, TaskError> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(TaskError::NotFound { id })
    }

    /// Apply `f` to a record in place.
    pub async fn update<F, R>(&self, id: Uuid, f: F) -> Result<R, TaskError>
    where
        F: FnOnce(&mut TaskRecord) -> R,
    {
        let mut tasks = self.tasks.write().await;
        let record = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        Ok(f(record))
    }

    /// Snapshot of every record.
    pub async fn list(&self) -> Vec<TaskRecord> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Remove a record, returning it if it was present.
    pub async fn remove(&self, id: Uuid) -> Option<TaskRecord> {
        self.tasks.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
