use crate::model::{ListId, Task, TaskId, TaskInput, TaskPatch, TodoList};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    FetchLists,
    CreateList { title: String },
    UpdateList { id: ListId, title: String },
    DeleteList { id: ListId },
    FetchTasks { list_id: ListId },
    CreateTask { list_id: ListId, input: TaskInput },
    UpdateTask { list_id: ListId, id: TaskId, patch: TaskPatch },
    DeleteTask { list_id: ListId, id: TaskId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Lists(Vec<TodoList>),
    List(TodoList),
    Tasks(Vec<Task>),
    Task(Task),
    Deleted,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

/// The remote list/task store.
pub trait Backend {
    fn execute(&mut self, request: &Request) -> Result<Reply, ApiError>;
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::FetchLists => "fetch_lists",
            Request::CreateList { .. } => "create_list",
            Request::UpdateList { .. } => "update_list",
            Request::DeleteList { .. } => "delete_list",
            Request::FetchTasks { .. } => "fetch_tasks",
            Request::CreateTask { .. } => "create_task",
            Request::UpdateTask { .. } => "update_task",
            Request::DeleteTask { .. } => "delete_task",
        }
    }
}
