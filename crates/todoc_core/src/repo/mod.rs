//! Repository façades over the task store.
//!
//! # Responsibility
//! - Give the orchestrator narrow, typed entry points per entity.
//! - Keep the store swappable for in-memory fakes in tests.
//!
//! # Invariants
//! - Repositories hold no state beyond the store handle and add no logic.

pub mod project_repo;
pub mod task_repo;
