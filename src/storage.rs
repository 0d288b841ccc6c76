use crate::api::{ApiError, Backend, Reply, Request};
use crate::model::{generate_id, Task, TodoList};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const PROJECT_FILE: &str = ".todos/todos.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Project,
    Global,
    Explicit,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Database {
    pub lists: Vec<StoredList>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StoredList {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Project => "project",
            StoreScope::Global => "global",
            StoreScope::Explicit => "file",
        }
    }
}

pub fn init_project_store() -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    let location = StoreLocation {
        path: cwd.join(PROJECT_FILE),
        scope: StoreScope::Project,
    };
    if !location.path.exists() {
        save_database(&location, &Database::default())?;
    }
    Ok(location)
}

pub fn locate_store(start: &Path) -> Result<StoreLocation> {
    if let Some(project_path) = find_project_store(start) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        path: global_store_path()?,
        scope: StoreScope::Global,
    })
}

pub fn load_database(location: &StoreLocation) -> Result<Database> {
    if !location.path.exists() {
        return Ok(Database::default());
    }
    let data = fs::read_to_string(&location.path)
        .with_context(|| format!("reading {:?}", location.path))?;
    let db: Database = serde_yaml::from_str(&data).context("parsing todo file")?;
    Ok(db)
}

pub fn save_database(location: &StoreLocation, db: &Database) -> Result<()> {
    if let Some(parent) = location.path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_yaml::to_string(db).context("serializing todo file")?;
    fs::write(&location.path, serialized)
        .with_context(|| format!("writing {:?}", location.path))?;
    Ok(())
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "todos").context("locating data directory")?;
    Ok(dirs.data_dir().join("todos.yml"))
}

/// [`Backend`] over a YAML file. Mutations are applied to a copy and only
/// kept once the copy is on disk.
pub struct FileBackend {
    location: StoreLocation,
    db: Database,
}

impl FileBackend {
    pub fn open(location: StoreLocation) -> Result<Self> {
        let db = load_database(&location)?;
        info!(path = %location.path.display(), lists = db.lists.len(), "opened todo file");
        Ok(FileBackend { location, db })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn persist(&self, db: &Database) -> Result<(), ApiError> {
        save_database(&self.location, db).map_err(|err| ApiError::Storage(format!("{:#}", err)))
    }
}

impl Backend for FileBackend {
    fn execute(&mut self, request: &Request) -> Result<Reply, ApiError> {
        debug!(request = request.name(), "file backend");
        if matches!(request, Request::FetchLists | Request::FetchTasks { .. }) {
            return apply(&mut self.db, request);
        }
        let mut draft = self.db.clone();
        let reply = apply(&mut draft, request)?;
        if let Err(err) = self.persist(&draft) {
            warn!(request = request.name(), error = %err, "save failed, change discarded");
            return Err(err);
        }
        self.db = draft;
        Ok(reply)
    }
}

fn apply(db: &mut Database, request: &Request) -> Result<Reply, ApiError> {
    match request {
        Request::FetchLists => Ok(Reply::Lists(db.lists.iter().map(summary).collect())),
        Request::CreateList { title } => {
            let list = StoredList {
                id: generate_id(),
                title: required(title)?,
                tasks: Vec::new(),
            };
            let reply = summary(&list);
            db.lists.push(list);
            Ok(Reply::List(reply))
        }
        Request::UpdateList { id, title } => {
            let title = required(title)?;
            let list = list_mut(db, id)?;
            list.title = title;
            Ok(Reply::List(summary(list)))
        }
        Request::DeleteList { id } => {
            let before = db.lists.len();
            db.lists.retain(|l| &l.id != id);
            if db.lists.len() == before {
                return Err(ApiError::NotFound(format!("list {}", id)));
            }
            Ok(Reply::Deleted)
        }
        Request::FetchTasks { list_id } => Ok(Reply::Tasks(list_mut(db, list_id)?.tasks.clone())),
        Request::CreateTask { list_id, input } => {
            let mut input = input.clone();
            input.title = required(&input.title)?;
            let task = Task::new(generate_id(), input);
            list_mut(db, list_id)?.tasks.push(task.clone());
            Ok(Reply::Task(task))
        }
        Request::UpdateTask { list_id, id, patch } => {
            if let Some(title) = &patch.title {
                required(title)?;
            }
            let task = list_mut(db, list_id)?
                .tasks
                .iter_mut()
                .find(|t| &t.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("task {}", id)))?;
            task.apply(patch);
            task.title = task.title.trim().to_string();
            Ok(Reply::Task(task.clone()))
        }
        Request::DeleteTask { list_id, id } => {
            let list = list_mut(db, list_id)?;
            let before = list.tasks.len();
            list.tasks.retain(|t| &t.id != id);
            if list.tasks.len() == before {
                return Err(ApiError::NotFound(format!("task {}", id)));
            }
            Ok(Reply::Deleted)
        }
    }
}

fn list_mut<'a>(db: &'a mut Database, id: &str) -> Result<&'a mut StoredList, ApiError> {
    db.lists
        .iter_mut()
        .find(|l| l.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("list {}", id)))
}

fn summary(list: &StoredList) -> TodoList {
    TodoList {
        id: list.id.clone(),
        title: list.title.clone(),
    }
}

fn required(title: &str) -> Result<String, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Invalid("title is required".into()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskInput, TaskPatch};
    use pretty_assertions::assert_eq;

    fn backend(dir: &tempfile::TempDir) -> FileBackend {
        let location = StoreLocation {
            path: dir.path().join(PROJECT_FILE),
            scope: StoreScope::Explicit,
        };
        FileBackend::open(location).unwrap()
    }

    fn create_list(b: &mut FileBackend, title: &str) -> TodoList {
        match b
            .execute(&Request::CreateList {
                title: title.into(),
            })
            .unwrap()
        {
            Reply::List(list) => list,
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        assert_eq!(b.execute(&Request::FetchLists).unwrap(), Reply::Lists(vec![]));
        assert!(!b.location().path.exists());
    }

    #[test]
    fn mutations_are_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        let list = create_list(&mut b, "  Family ");
        assert_eq!(list.title, "Family");
        b.execute(&Request::CreateTask {
            list_id: list.id.clone(),
            input: TaskInput {
                title: "Buy some milk".into(),
                ..TaskInput::default()
            },
        })
        .unwrap();

        let reopened = backend(&dir);
        assert_eq!(reopened.db.lists.len(), 1);
        assert_eq!(reopened.db.lists[0].tasks[0].title, "Buy some milk");
    }

    #[test]
    fn empty_titles_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        let err = b
            .execute(&Request::CreateList { title: " ".into() })
            .unwrap_err();
        assert_eq!(err.to_string(), "title is required");

        let list = create_list(&mut b, "Work");
        let err = b
            .execute(&Request::CreateTask {
                list_id: list.id,
                input: TaskInput::default(),
            })
            .unwrap_err();
        assert_eq!(err, ApiError::Invalid("title is required".into()));
    }

    #[test]
    fn update_and_delete_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        let list = create_list(&mut b, "Work");
        let task = match b
            .execute(&Request::CreateTask {
                list_id: list.id.clone(),
                input: TaskInput {
                    title: "Write report".into(),
                    ..TaskInput::default()
                },
            })
            .unwrap()
        {
            Reply::Task(task) => task,
            other => panic!("unexpected reply {:?}", other),
        };

        let updated = b
            .execute(&Request::UpdateTask {
                list_id: list.id.clone(),
                id: task.id.clone(),
                patch: TaskPatch::toggle(false),
            })
            .unwrap();
        assert!(matches!(updated, Reply::Task(ref t) if t.done));

        b.execute(&Request::DeleteTask {
            list_id: list.id.clone(),
            id: task.id.clone(),
        })
        .unwrap();
        let err = b
            .execute(&Request::DeleteTask {
                list_id: list.id,
                id: task.id.clone(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), format!("task {} not found", task.id));
    }

    #[test]
    fn failed_save_leaves_data_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        let list = create_list(&mut b, "Family");
        b.execute(&Request::CreateTask {
            list_id: list.id.clone(),
            input: TaskInput {
                title: "Buy some milk".into(),
                ..TaskInput::default()
            },
        })
        .unwrap();
        let before = b.db.clone();

        // A regular file where the data directory should be makes every save fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        b.location.path = blocker.join("todos.yml");

        let attempts = [
            Request::CreateList {
                title: "Work".into(),
            },
            Request::UpdateList {
                id: list.id.clone(),
                title: "Home".into(),
            },
            Request::DeleteList {
                id: list.id.clone(),
            },
            Request::CreateTask {
                list_id: list.id.clone(),
                input: TaskInput {
                    title: "Call mum".into(),
                    ..TaskInput::default()
                },
            },
            Request::UpdateTask {
                list_id: list.id.clone(),
                id: before.lists[0].tasks[0].id.clone(),
                patch: TaskPatch::toggle(false),
            },
            Request::DeleteTask {
                list_id: list.id.clone(),
                id: before.lists[0].tasks[0].id.clone(),
            },
        ];
        for request in &attempts {
            let err = b.execute(request).unwrap_err();
            assert!(matches!(err, ApiError::Storage(_)), "{}: {:?}", request.name(), err);
            assert_eq!(b.db, before);
        }
        assert_eq!(
            b.execute(&Request::FetchLists).unwrap(),
            Reply::Lists(vec![list.clone()])
        );
        match b.execute(&Request::FetchTasks { list_id: list.id }).unwrap() {
            Reply::Tasks(tasks) => assert_eq!(tasks, before.lists[0].tasks),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn unknown_list_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = backend(&dir);
        let err = b
            .execute(&Request::FetchTasks {
                list_id: "nope".into(),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "list nope not found");
    }

    #[test]
    fn project_store_is_found_from_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: dir.path().join(PROJECT_FILE),
            scope: StoreScope::Project,
        };
        save_database(&location, &Database::default()).unwrap();
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = locate_store(&nested).unwrap();
        assert_eq!(found.scope, StoreScope::Project);
        assert_eq!(found.path, location.path);
    }
}
