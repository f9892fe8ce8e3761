//! Core persistence and observation layer for Todoc.
//! This crate is the single source of truth for project/task invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::project::{Project, ProjectId, ProjectIndex};
pub use model::sort::{sort_tasks, sorted_tasks, TaskOrder};
pub use model::task::{Task, TaskId, UNASSIGNED_TASK_ID};
pub use model::ModelValidationError;
pub use repo::project_repo::{ProjectRepository, StoreProjectRepository};
pub use repo::task_repo::{StoreTaskRepository, TaskRepository};
pub use service::task_orchestrator::{
    task_rows, OrchestratorError, OrchestratorResult, TaskOrchestrator, TaskRow, WriteTicket,
};
pub use store::seed::default_projects;
pub use store::{
    Change, LiveQueryRegistry, Observable, QueryScope, StoreError, StoreResult, Subscription,
    TaskStore,
};

/// Store-backed orchestrator wiring used by binaries.
pub type StoreOrchestrator = TaskOrchestrator<StoreProjectRepository, StoreTaskRepository>;

/// Builds an orchestrator over `store` with store-backed repositories.
pub fn orchestrator_for(store: &TaskStore) -> OrchestratorResult<StoreOrchestrator> {
    TaskOrchestrator::new(
        StoreProjectRepository::new(store.clone()),
        StoreTaskRepository::new(store.clone()),
    )
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
