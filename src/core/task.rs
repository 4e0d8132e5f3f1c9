use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a job's task list.
///
/// Serialized with camelCase field names because the task records travel
/// inside the shared sync snapshot, which non-Rust clients read too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Present exactly while `completed` is true; never set independently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<NaiveDate>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            completed: false,
            created_at: Utc::now(),
            completed_at: None,
            deadline: None,
        }
    }

    pub fn complete(&mut self) {
        self.completed = true;
        self.completed_at = Some(Utc::now());
    }

    pub fn reopen(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    /// Flip completion, keeping `completed_at` in lockstep.
    pub fn toggle(&mut self) {
        if self.completed {
            self.reopen();
        } else {
            self.complete();
        }
    }

    /// Returns true if the deadline has passed and the task is still open.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.deadline.is_some_and(|d| d < today)
    }
}
