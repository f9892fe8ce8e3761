//! Task repository contract and store-backed implementation.

use crate::model::project::ProjectId;
use crate::model::task::{Task, TaskId};
use crate::store::{Observable, StoreResult, TaskStore};

/// Read and command access to tasks.
pub trait TaskRepository: Send + Sync {
    fn get_tasks(&self, project_id: ProjectId) -> Observable<Vec<Task>>;
    fn get_all_tasks(&self) -> Observable<Vec<Task>>;
    /// Inserts `task` under a fresh id; the id is not returned.
    fn create_task(&self, task: &Task) -> StoreResult<()>;
    /// Returns the number of removed rows (`0` when `id` is unknown).
    fn delete_task(&self, id: TaskId) -> StoreResult<usize>;
    /// Returns the number of replaced rows (`0` when `task.id` is unknown).
    fn update_task(&self, task: &Task) -> StoreResult<usize>;
}

/// Task repository backed by [`TaskStore`].
#[derive(Clone)]
pub struct StoreTaskRepository {
    store: TaskStore,
}

impl StoreTaskRepository {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

impl TaskRepository for StoreTaskRepository {
    fn get_tasks(&self, project_id: ProjectId) -> Observable<Vec<Task>> {
        self.store.get_tasks(project_id)
    }

    fn get_all_tasks(&self) -> Observable<Vec<Task>> {
        self.store.get_all_tasks()
    }

    fn create_task(&self, task: &Task) -> StoreResult<()> {
        self.store.insert_task(task).map(|_| ())
    }

    fn delete_task(&self, id: TaskId) -> StoreResult<usize> {
        self.store.delete_task(id)
    }

    fn update_task(&self, task: &Task) -> StoreResult<usize> {
        self.store.update_task(task)
    }
}
