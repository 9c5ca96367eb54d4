//! Durable task repository and the single source of truth for state.
//!
//! All writes go through [`TaskStore::update`], which runs the mutation
//! under the write lock as one atomic read-modify-write and bumps the
//! task version. Transition validity inside the Task methods then makes
//! races deterministic: whichever writer lands second sees the updated
//! state and is rejected if its transition no longer applies.

use std::collections::HashMap;

use tokio::sync::RwLock;

use tryon_core::{Task, TaskId, TryOnError, UserId};

/// In-memory task store indexed by TaskId.
#[derive(Default)]
pub struct TaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly created task.
    pub async fn insert(&self, task: Task) {
        self.tasks.write().await.insert(task.id.clone(), task);
    }

    /// Fetch a task by id, including soft-deleted ones.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Fetch a task visible to `owner`: not soft-deleted and owned by them.
    pub async fn get_owned(&self, id: &TaskId, owner: &UserId) -> Result<Task, TryOnError> {
        self.tasks
            .read()
            .await
            .get(id)
            .filter(|t| !t.deleted && &t.owner == owner)
            .cloned()
            .ok_or_else(|| TryOnError::TaskNotFound(id.to_string()))
    }

    /// Snapshot of in-flight task ids: CREATED or PROCESSING, not
    /// soft-deleted. Tasks submitted after the snapshot are picked up
    /// on the next tick.
    pub async fn in_flight(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| !t.deleted && t.state.is_active())
            .map(|t| t.id.clone())
            .collect()
    }

    /// Atomically mutate one task under the write lock.
    ///
    /// The closure's error aborts the update (version untouched); on
    /// success the version is bumped. Callers must not perform I/O in
    /// the closure - fetch first, then apply.
    pub async fn update<F, T>(&self, id: &TaskId, f: F) -> Result<T, TryOnError>
    where
        F: FnOnce(&mut Task) -> Result<T, TryOnError>,
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(id)
            .ok_or_else(|| TryOnError::TaskNotFound(id.to_string()))?;
        let out = f(task)?;
        task.version += 1;
        Ok(out)
    }

    /// Number of tasks in the store, soft-deleted included.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// True when the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tryon_core::{
        AssetId, ErrorDetail, GarmentCategory, JobId, TaskInputs, TaskState, TryOnMode,
    };

    fn task(owner: &UserId) -> Task {
        Task::new(
            JobId::new("job-1"),
            owner.clone(),
            TryOnMode::Single,
            GarmentCategory::Upper,
            false,
            TaskInputs {
                model_asset_id: AssetId::generate(),
                garment_asset_ids: vec![AssetId::generate()],
                model_image_url: "/uploads/models/m.jpg".into(),
                garment_image_urls: vec!["/uploads/garments/g.jpg".into()],
            },
        )
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_aborts_on_error() {
        let store = TaskStore::new();
        let owner = UserId::generate();
        let t = task(&owner);
        let id = t.id.clone();
        store.insert(t).await;

        store
            .update(&id, |t| {
                t.record_poll(10);
                Ok(())
            })
            .await
            .expect("update");
        assert_eq!(store.get(&id).await.unwrap().version, 1);

        // A failing closure leaves the version untouched.
        let err = store
            .update(&id, |_| {
                Err::<(), _>(TryOnError::RetryLimitExceeded)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TryOnError::RetryLimitExceeded));
        assert_eq!(store.get(&id).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_in_flight_excludes_terminal_and_deleted() {
        let store = TaskStore::new();
        let owner = UserId::generate();

        let active = task(&owner);
        let active_id = active.id.clone();
        store.insert(active).await;

        let mut failed = task(&owner);
        failed.fail(ErrorDetail::new("E", "e")).unwrap();
        store.insert(failed).await;

        let mut deleted = task(&owner);
        deleted.soft_delete();
        store.insert(deleted).await;

        let in_flight = store.in_flight().await;
        assert_eq!(in_flight, vec![active_id]);
    }

    #[tokio::test]
    async fn test_get_owned_hides_foreign_and_deleted_tasks() {
        let store = TaskStore::new();
        let owner = UserId::generate();
        let other = UserId::generate();

        let mut t = task(&owner);
        let id = t.id.clone();
        t.soft_delete();
        store.insert(t).await;

        assert!(store.get_owned(&id, &owner).await.is_err());
        assert!(store.get_owned(&id, &other).await.is_err());
        assert_eq!(store.get(&id).await.unwrap().state, TaskState::Created);
    }
}
