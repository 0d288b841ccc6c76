use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

pub type ListId = String;
pub type TaskId = String;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TodoList {
    pub id: ListId,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub limit: Option<DateTime<Utc>>,
}

/// Payload for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub detail: String,
    pub done: bool,
    pub limit: Option<DateTime<Utc>>,
}

/// Partial update of a task. `limit: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub detail: Option<String>,
    pub done: Option<bool>,
    pub limit: Option<Option<DateTime<Utc>>>,
}

impl Task {
    pub fn new(id: TaskId, input: TaskInput) -> Self {
        Task {
            id,
            title: input.title,
            detail: input.detail,
            done: input.done,
            limit: input.limit,
        }
    }

    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(detail) = &patch.detail {
            self.detail = detail.clone();
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
    }
}

impl TaskPatch {
    pub fn toggle(done: bool) -> Self {
        TaskPatch {
            done: Some(!done),
            ..TaskPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.detail.is_none() && self.done.is_none() && self.limit.is_none()
    }
}

pub fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}
