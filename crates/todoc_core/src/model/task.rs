//! Task record.
//!
//! # Invariants
//! - `id` is assigned by the store; `UNASSIGNED_TASK_ID` marks in-flight
//!   records that were never persisted.
//! - `creation_timestamp` is fixed at creation and never rewritten by the
//!   store.

use super::project::ProjectId;
use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Store-assigned task identifier.
pub type TaskId = i64;

/// Placeholder id carried by tasks that have not been inserted yet.
pub const UNASSIGNED_TASK_ID: TaskId = 0;

/// Unit of work belonging to exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub name: String,
    /// Unix epoch milliseconds.
    pub creation_timestamp: i64,
    pub selected: bool,
}

impl Task {
    /// Creates an unsaved task stamped with the current time.
    pub fn new(project_id: ProjectId, name: impl Into<String>) -> Self {
        Self::with_timestamp(project_id, name, now_epoch_ms())
    }

    /// Creates an unsaved task with a caller-provided creation time.
    pub fn with_timestamp(
        project_id: ProjectId,
        name: impl Into<String>,
        creation_timestamp: i64,
    ) -> Self {
        Self {
            id: UNASSIGNED_TASK_ID,
            project_id,
            name: name.into(),
            creation_timestamp,
            selected: false,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.name.trim().is_empty() {
            return Err(ModelValidationError::EmptyTaskName);
        }
        Ok(())
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_TASK_ID
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::{Task, UNASSIGNED_TASK_ID};
    use crate::model::ModelValidationError;

    #[test]
    fn new_task_defaults() {
        let task = Task::new(1, "write report");

        assert_eq!(task.id, UNASSIGNED_TASK_ID);
        assert!(!task.is_persisted());
        assert!(!task.selected);
        assert!(task.creation_timestamp > 0);
    }

    #[test]
    fn validate_rejects_empty_name() {
        let task = Task::with_timestamp(1, "", 10);
        assert_eq!(task.validate(), Err(ModelValidationError::EmptyTaskName));
    }

    #[test]
    fn serializes_with_stable_field_names() {
        let task = Task::with_timestamp(2, "call supplier", 1_700_000_000_000);

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["project_id"], 2);
        assert_eq!(json["creation_timestamp"], 1_700_000_000_000_i64);
        assert_eq!(json["selected"], false);

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, task);
    }
}
