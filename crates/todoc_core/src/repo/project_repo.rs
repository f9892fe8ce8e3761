//! Project repository contract and store-backed implementation.

use crate::model::project::{Project, ProjectId};
use crate::store::{Observable, TaskStore};

/// Read access to projects.
pub trait ProjectRepository: Send + Sync {
    fn get_project(&self, id: ProjectId) -> Observable<Option<Project>>;
    fn get_all_projects(&self) -> Observable<Vec<Project>>;
}

/// Project repository backed by [`TaskStore`].
#[derive(Clone)]
pub struct StoreProjectRepository {
    store: TaskStore,
}

impl StoreProjectRepository {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }
}

impl ProjectRepository for StoreProjectRepository {
    fn get_project(&self, id: ProjectId) -> Observable<Option<Project>> {
        self.store.get_project(id)
    }

    fn get_all_projects(&self) -> Observable<Vec<Project>> {
        self.store.get_all_projects()
    }
}
