use crate::api::{Reply, Request};
use crate::cli::DueArgs;
use crate::config::Config;
use crate::due::{classify, format_limit, DueMode};
use crate::model::{ListId, Task, TaskInput, TaskPatch, TodoList};
use crate::storage::{init_project_store, locate_store, FileBackend, StoreLocation, StoreScope};
use crate::store::Store;
use crate::{due, ui};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use std::env;
use std::io::{self, Write};
use tracing::debug;

/// One-shot access to the todo file for a single command.
pub struct Session {
    store: Store,
    backend: FileBackend,
}

impl Session {
    pub fn open(config: &Config) -> Result<Self> {
        let location = match &config.data_file {
            Some(path) => StoreLocation {
                path: path.clone(),
                scope: StoreScope::Explicit,
            },
            None => locate_store(&env::current_dir()?)?,
        };
        Ok(Session::with_backend(FileBackend::open(location)?))
    }

    fn with_backend(backend: FileBackend) -> Self {
        Session {
            store: Store::new(),
            backend,
        }
    }

    fn call(&mut self, request: Request) -> Result<Reply> {
        let name = request.name();
        let reply = self
            .store
            .resolve(&mut self.backend, request)
            .with_context(|| format!("{} failed", name))?;
        debug!(request = name, "resolved");
        Ok(reply)
    }

    fn lists(&mut self) -> Result<Vec<TodoList>> {
        match self.call(Request::FetchLists)? {
            Reply::Lists(lists) => Ok(lists),
            other => bail!("unexpected reply {:?}", other),
        }
    }

    fn tasks(&mut self, list_id: &str) -> Result<Vec<Task>> {
        match self.call(Request::FetchTasks {
            list_id: list_id.to_string(),
        })? {
            Reply::Tasks(tasks) => Ok(tasks),
            other => bail!("unexpected reply {:?}", other),
        }
    }

    /// Matches `wanted` against list ids first, then exact names. `None`
    /// picks the first list.
    fn resolve_list(&mut self, wanted: Option<&str>) -> Result<TodoList> {
        let lists = self.lists()?;
        let found = match wanted {
            None => lists.into_iter().next(),
            Some(key) => {
                let by_id = lists.iter().position(|l| l.id == key);
                let idx = by_id.or_else(|| lists.iter().position(|l| l.title == key));
                idx.map(|i| lists[i].clone())
            }
        };
        match (found, wanted) {
            (Some(list), _) => Ok(list),
            (None, Some(key)) => bail!("list {} not found", key),
            (None, None) => bail!("no lists yet; create one with `todos list-add <name>`"),
        }
    }

    /// Finds the list holding `task_id`, searching every list unless one is
    /// named.
    fn find_task(&mut self, list: Option<&str>, task_id: &str) -> Result<(ListId, Task)> {
        let candidates = match list {
            Some(_) => vec![self.resolve_list(list)?],
            None => self.lists()?,
        };
        for candidate in candidates {
            if let Some(task) = self
                .tasks(&candidate.id)?
                .into_iter()
                .find(|t| t.id == task_id)
            {
                return Ok((candidate.id, task));
            }
        }
        bail!("task {} not found", task_id)
    }

    fn update(&mut self, list_id: ListId, task_id: String, patch: TaskPatch) -> Result<Task> {
        match self.call(Request::UpdateTask {
            list_id,
            id: task_id,
            patch,
        })? {
            Reply::Task(task) => Ok(task),
            other => bail!("unexpected reply {:?}", other),
        }
    }
}

pub fn init() -> Result<()> {
    let location = init_project_store()?;
    println!("Initialized todo file at {}", location.path.display());
    Ok(())
}

pub fn lists(config: &Config) -> Result<()> {
    let mut session = Session::open(config)?;
    print_lists(&mut session, &mut io::stdout())
}

pub fn list_add(config: &Config, title: String) -> Result<()> {
    let mut session = Session::open(config)?;
    match session.call(Request::CreateList { title })? {
        Reply::List(list) => println!("Created list {} ({})", list.title, list.id),
        other => bail!("unexpected reply {:?}", other),
    }
    Ok(())
}

pub fn list_rename(config: &Config, list: String, title: String) -> Result<()> {
    let mut session = Session::open(config)?;
    let target = session.resolve_list(Some(&list))?;
    session.call(Request::UpdateList {
        id: target.id.clone(),
        title: title.clone(),
    })?;
    println!("Renamed {} to {}", target.title, title.trim());
    Ok(())
}

pub fn list_rm(config: &Config, list: String) -> Result<()> {
    let mut session = Session::open(config)?;
    let target = session.resolve_list(Some(&list))?;
    session.call(Request::DeleteList {
        id: target.id.clone(),
    })?;
    println!("Deleted list {}", target.title);
    Ok(())
}

pub fn tasks(config: &Config, list: Option<String>, done: bool, clock: bool) -> Result<()> {
    let mut session = Session::open(config)?;
    let mode = if clock { DueMode::Clock } else { config.due_mode };
    print_tasks(
        &mut session,
        list.as_deref(),
        done,
        mode,
        &Local::now(),
        &mut io::stdout(),
    )
}

pub fn add(
    config: &Config,
    title: String,
    list: Option<String>,
    detail: Option<String>,
    due_args: DueArgs,
) -> Result<()> {
    let mut session = Session::open(config)?;
    let target = session.resolve_list(list.as_deref())?;
    let limit = parse_due(&due_args)?;
    let input = TaskInput {
        title,
        detail: detail.unwrap_or_default(),
        done: false,
        limit,
    };
    match session.call(Request::CreateTask {
        list_id: target.id.clone(),
        input,
    })? {
        Reply::Task(task) => println!("Added task {} to {}", task.id, target.title),
        other => bail!("unexpected reply {:?}", other),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    config: &Config,
    task_id: String,
    list: Option<String>,
    title: Option<String>,
    detail: Option<String>,
    due_args: DueArgs,
    clear_due: bool,
    done: bool,
    undone: bool,
) -> Result<()> {
    let mut session = Session::open(config)?;
    let (list_id, task) = session.find_task(list.as_deref(), &task_id)?;
    let limit = if clear_due {
        Some(None)
    } else {
        parse_due(&due_args)?.map(Some)
    };
    let patch = TaskPatch {
        title,
        detail,
        done: match (done, undone) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        limit,
    };
    if patch.is_empty() {
        bail!("nothing to change; pass --title, --detail, --due, --clear-due, --done or --undone");
    }
    session.update(list_id, task.id, patch)?;
    println!("Updated task {}", task_id);
    Ok(())
}

pub fn toggle(config: &Config, task_id: String, list: Option<String>) -> Result<()> {
    let mut session = Session::open(config)?;
    let (list_id, task) = session.find_task(list.as_deref(), &task_id)?;
    let updated = session.update(list_id, task.id, TaskPatch::toggle(task.done))?;
    let state = if updated.done { "done" } else { "to do" };
    println!("Marked {} as {}", updated.id, state);
    Ok(())
}

pub fn rm(config: &Config, task_id: String, list: Option<String>) -> Result<()> {
    let mut session = Session::open(config)?;
    let (list_id, task) = session.find_task(list.as_deref(), &task_id)?;
    session.call(Request::DeleteTask {
        list_id,
        id: task.id,
    })?;
    println!("Deleted task {}", task_id);
    Ok(())
}

pub fn tui(config: &Config) -> Result<()> {
    let session = Session::open(config)?;
    ui::run(session.backend, config)
}

fn parse_due(args: &DueArgs) -> Result<Option<DateTime<Utc>>> {
    let Some(date) = args.due.as_deref() else {
        return Ok(None);
    };
    due::parse_limit(date, args.at.as_deref().unwrap_or(""), &Local)
        .map_err(|err| anyhow!("invalid --due/--at: {}", err))
}

fn print_lists(session: &mut Session, out: &mut dyn Write) -> Result<()> {
    let lists = session.lists()?;
    let location = session.backend.location();
    writeln!(
        out,
        "Lists in {} ({})",
        location.path.display(),
        location.scope.label()
    )?;
    if lists.is_empty() {
        writeln!(out, "  (none)")?;
    }
    for list in lists {
        writeln!(out, "  {}  {}", list.id, list.title)?;
    }
    Ok(())
}

fn print_tasks(
    session: &mut Session,
    list: Option<&str>,
    done: bool,
    mode: DueMode,
    now: &DateTime<Local>,
    out: &mut dyn Write,
) -> Result<()> {
    let target = session.resolve_list(list)?;
    let tasks: Vec<Task> = session
        .tasks(&target.id)?
        .into_iter()
        .filter(|t| t.done == done)
        .collect();
    let heading = if done { "Done" } else { "To Do" };
    writeln!(out, "{} / {} ({})", target.title, heading, tasks.len())?;
    if tasks.is_empty() {
        writeln!(out, "  (empty)")?;
    }
    for task in &tasks {
        writeln!(out, "{}", task_line(task, mode, now))?;
        if !task.detail.is_empty() {
            for line in task.detail.lines() {
                writeln!(out, "      {}", line)?;
            }
        }
    }
    Ok(())
}

fn task_line(task: &Task, mode: DueMode, now: &DateTime<Local>) -> String {
    let mark = if task.done { "[x]" } else { "[ ]" };
    let mut line = format!("  {} {}  {}", mark, task.id, task.title);
    if let (Some(limit), false) = (task.limit.as_ref(), task.done) {
        let due = classify(mode, task.limit, now);
        line.push_str(&format!(
            "  (due {}, {})",
            format_limit(limit, &now.timezone()),
            due.label
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn session(dir: &tempfile::TempDir) -> Session {
        let location = StoreLocation {
            path: dir.path().join("todos.yml"),
            scope: StoreScope::Explicit,
        };
        Session::with_backend(FileBackend::open(location).unwrap())
    }

    fn seed(session: &mut Session) -> ListId {
        let list = match session
            .call(Request::CreateList {
                title: "Family".into(),
            })
            .unwrap()
        {
            Reply::List(list) => list,
            other => panic!("unexpected {:?}", other),
        };
        for title in ["Buy some milk", "Call mum"] {
            session
                .call(Request::CreateTask {
                    list_id: list.id.clone(),
                    input: TaskInput {
                        title: title.into(),
                        ..TaskInput::default()
                    },
                })
                .unwrap();
        }
        list.id
    }

    #[test]
    fn resolve_list_by_id_name_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let err = session.resolve_list(None).unwrap_err();
        assert!(err.to_string().contains("no lists yet"));

        let id = seed(&mut session);
        assert_eq!(session.resolve_list(None).unwrap().id, id);
        assert_eq!(session.resolve_list(Some(&id)).unwrap().id, id);
        assert_eq!(session.resolve_list(Some("Family")).unwrap().id, id);
        assert!(session.resolve_list(Some("Work")).is_err());
    }

    #[test]
    fn find_task_searches_every_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session
            .call(Request::CreateList {
                title: "Empty".into(),
            })
            .unwrap();
        let id = seed(&mut session);
        let wanted = session.tasks(&id).unwrap()[1].clone();

        let (found_list, found) = session.find_task(None, &wanted.id).unwrap();
        assert_eq!(found_list, id);
        assert_eq!(found, wanted);
        assert!(session.find_task(Some("Empty"), &wanted.id).is_err());
    }

    #[test]
    fn api_errors_keep_their_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let err = session
            .call(Request::CreateList { title: "  ".into() })
            .unwrap_err();
        assert_eq!(format!("{:#}", err), "create_list failed: title is required");
    }

    #[test]
    fn printed_tasks_carry_due_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let id = seed(&mut session);
        let now = Local.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let milk = session.tasks(&id).unwrap()[0].id.clone();
        let limit = Local.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap();
        session
            .update(
                id.clone(),
                milk.clone(),
                TaskPatch {
                    limit: Some(Some(limit.with_timezone(&Utc))),
                    ..TaskPatch::default()
                },
            )
            .unwrap();

        let mut out = Vec::new();
        print_tasks(&mut session, None, false, DueMode::Days, &now, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Family / To Do (2)"));
        assert!(text.contains(&format!("[ ] {}  Buy some milk  (due 2025/3/10, tomorrow)", milk)));

        let mut out = Vec::new();
        print_tasks(&mut session, None, true, DueMode::Days, &now, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("(empty)"));
    }

    #[test]
    fn parse_due_needs_a_date() {
        assert_eq!(parse_due(&DueArgs::default()).unwrap(), None);
        let bad = DueArgs {
            due: Some("2025-13-01".into()),
            at: None,
        };
        assert!(parse_due(&bad).is_err());
        let ok = DueArgs {
            due: Some("2025-03-10".into()),
            at: Some("14:30".into()),
        };
        assert!(parse_due(&ok).unwrap().is_some());
    }
}
