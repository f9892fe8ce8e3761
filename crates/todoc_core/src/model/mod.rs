//! Domain model for projects and their tasks.
//!
//! # Responsibility
//! - Define the records persisted by the store and handed to observers.
//! - Hold the pure ordering policy applied to task lists.
//!
//! # Invariants
//! - A task references its project by id only; lookups go through
//!   [`project::ProjectIndex`].
//! - Names are never empty once a record passes `validate()`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod project;
pub mod sort;
pub mod task;

/// Validation failure for project or task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyProjectName,
    EmptyTaskName,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyProjectName => write!(f, "project name cannot be empty"),
            Self::EmptyTaskName => write!(f, "task name cannot be empty"),
        }
    }
}

impl Error for ModelValidationError {}
