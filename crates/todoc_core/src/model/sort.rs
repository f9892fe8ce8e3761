//! Ordering policy for task lists.
//!
//! # Invariants
//! - Every ordering is applied with a stable sort, so equal keys keep the
//!   order in which the snapshot delivered them.
//! - Sorting works on a copy handed to the caller; store state is untouched.

use super::task::Task;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Display order selected by the presentation layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrder {
    /// Keep snapshot order.
    #[default]
    None,
    /// A to Z by name.
    NameAscending,
    /// Z to A by name.
    NameDescending,
    /// Newest `creation_timestamp` first.
    MostRecentFirst,
    /// Oldest `creation_timestamp` first.
    OldestFirst,
}

impl TaskOrder {
    pub fn compare(self, left: &Task, right: &Task) -> Ordering {
        match self {
            Self::None => Ordering::Equal,
            Self::NameAscending => left.name.cmp(&right.name),
            Self::NameDescending => right.name.cmp(&left.name),
            Self::MostRecentFirst => right.creation_timestamp.cmp(&left.creation_timestamp),
            Self::OldestFirst => left.creation_timestamp.cmp(&right.creation_timestamp),
        }
    }

    /// Parses the short names used by the CLI (`az`, `za`, `recent`, `old`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "az" | "name_asc" => Some(Self::NameAscending),
            "za" | "name_desc" => Some(Self::NameDescending),
            "recent" => Some(Self::MostRecentFirst),
            "old" => Some(Self::OldestFirst),
            _ => None,
        }
    }
}

/// Sorts `tasks` in place using `order`.
pub fn sort_tasks(tasks: &mut [Task], order: TaskOrder) {
    if order == TaskOrder::None {
        return;
    }
    tasks.sort_by(|left, right| order.compare(left, right));
}

/// Returns a sorted copy of a delivered snapshot.
pub fn sorted_tasks(snapshot: &[Task], order: TaskOrder) -> Vec<Task> {
    let mut tasks = snapshot.to_vec();
    sort_tasks(&mut tasks, order);
    tasks
}
