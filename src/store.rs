use crate::api::{ApiError, Backend, Reply, Request};
use crate::model::{ListId, Task, TaskId, TodoList};
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Identifies one mounted dialog instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenAction {
    Load,
    CreateList,
    UpdateList,
    DeleteList,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Screen(ScreenAction),
    Row(TaskId),
    Dialog(DialogToken),
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub ticket: Ticket,
    pub origin: Origin,
    pub request: Request,
    pub result: Result<Reply, ApiError>,
}

struct Pending {
    ticket: Ticket,
    origin: Origin,
    request: Request,
}

#[derive(Default)]
pub struct Store {
    pub lists: Vec<TodoList>,
    pub current_list: Option<ListId>,
    pub tasks: Vec<Task>,
    queue: VecDeque<Pending>,
    next_ticket: u64,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn dispatch(&mut self, request: Request, origin: Origin) -> Ticket {
        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        debug!(?ticket, request = request.name(), ?origin, "dispatch");
        self.queue.push_back(Pending {
            ticket,
            origin,
            request,
        });
        ticket
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    // Requests queued while reducing (the task fetch after a list switch)
    // wait for the next pump.
    pub fn pump(&mut self, backend: &mut dyn Backend) -> Vec<Completion> {
        let batch: Vec<Pending> = self.queue.drain(..).collect();
        let mut done = Vec::with_capacity(batch.len());
        for pending in batch {
            let result = backend.execute(&pending.request);
            match &result {
                Ok(reply) => self.reduce(&pending.request, reply),
                Err(err) => warn!(request = pending.request.name(), error = %err, "request failed"),
            }
            done.push(Completion {
                ticket: pending.ticket,
                origin: pending.origin,
                request: pending.request,
                result,
            });
        }
        done
    }

    /// Dispatch and resolve immediately. Used by one-shot commands.
    pub fn resolve(
        &mut self,
        backend: &mut dyn Backend,
        request: Request,
    ) -> Result<Reply, ApiError> {
        let ticket = self.dispatch(request, Origin::Screen(ScreenAction::Load));
        let mut result = None;
        for completion in self.pump(backend) {
            if completion.ticket == ticket {
                result = Some(completion.result);
            }
        }
        result.unwrap_or_else(|| Err(ApiError::Storage("request was not resolved".into())))
    }

    /// Makes `list_id` current and queues a fetch of its tasks.
    pub fn select_list(&mut self, list_id: &str) {
        if self.current_list.as_deref() == Some(list_id) {
            return;
        }
        self.current_list = Some(list_id.to_string());
        self.tasks.clear();
        self.dispatch(
            Request::FetchTasks {
                list_id: list_id.to_string(),
            },
            Origin::Screen(ScreenAction::Load),
        );
    }

    pub fn current_list(&self) -> Option<&TodoList> {
        let id = self.current_list.as_deref()?;
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn reduce(&mut self, request: &Request, reply: &Reply) {
        match (request, reply) {
            (Request::FetchLists, Reply::Lists(lists)) => {
                self.lists = lists.clone();
                let current_valid = self
                    .current_list
                    .as_deref()
                    .is_some_and(|id| self.lists.iter().any(|l| l.id == id));
                if !current_valid {
                    self.current_list = None;
                    self.tasks.clear();
                    if let Some(first) = self.lists.first().map(|l| l.id.clone()) {
                        self.select_list(&first);
                    }
                }
            }
            (Request::CreateList { .. }, Reply::List(list)) => {
                self.lists.push(list.clone());
                self.select_list(&list.id);
            }
            (Request::UpdateList { .. }, Reply::List(list)) => {
                if let Some(existing) = self.lists.iter_mut().find(|l| l.id == list.id) {
                    *existing = list.clone();
                }
            }
            (Request::DeleteList { id }, Reply::Deleted) => {
                self.lists.retain(|l| &l.id != id);
                if self.current_list.as_deref() == Some(id.as_str()) {
                    self.current_list = None;
                    self.tasks.clear();
                    if let Some(first) = self.lists.first().map(|l| l.id.clone()) {
                        self.select_list(&first);
                    }
                }
            }
            (Request::FetchTasks { list_id }, Reply::Tasks(tasks)) => {
                if self.current_list.as_deref() == Some(list_id.as_str()) {
                    self.tasks = tasks.clone();
                } else {
                    debug!(%list_id, "dropping tasks for a list that is no longer current");
                }
            }
            (Request::CreateTask { list_id, .. }, Reply::Task(task)) => {
                if self.current_list.as_deref() == Some(list_id.as_str()) {
                    self.tasks.push(task.clone());
                }
            }
            (Request::UpdateTask { .. }, Reply::Task(task)) => {
                if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
                    *existing = task.clone();
                }
            }
            (Request::DeleteTask { id, .. }, Reply::Deleted) => {
                self.tasks.retain(|t| &t.id != id);
            }
            (request, reply) => {
                warn!(request = request.name(), ?reply, "unexpected reply shape");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TaskInput, TaskPatch};
    use pretty_assertions::assert_eq;

    /// In-memory backend with an optional forced failure.
    #[derive(Default)]
    struct Memory {
        lists: Vec<(TodoList, Vec<Task>)>,
        fail_with: Option<String>,
        seq: u32,
    }

    impl Memory {
        fn id(&mut self) -> String {
            self.seq += 1;
            format!("id{}", self.seq)
        }
    }

    impl Backend for Memory {
        fn execute(&mut self, request: &Request) -> Result<Reply, ApiError> {
            if let Some(msg) = &self.fail_with {
                return Err(ApiError::Invalid(msg.clone()));
            }
            match request {
                Request::FetchLists => Ok(Reply::Lists(
                    self.lists.iter().map(|(l, _)| l.clone()).collect(),
                )),
                Request::CreateList { title } => {
                    let list = TodoList {
                        id: self.id(),
                        title: title.clone(),
                    };
                    self.lists.push((list.clone(), vec![]));
                    Ok(Reply::List(list))
                }
                Request::FetchTasks { list_id } => self
                    .lists
                    .iter()
                    .find(|(l, _)| &l.id == list_id)
                    .map(|(_, t)| Reply::Tasks(t.clone()))
                    .ok_or_else(|| ApiError::NotFound(list_id.clone())),
                Request::CreateTask { list_id, input } => {
                    let task = Task::new(self.id(), input.clone());
                    let (_, tasks) = self
                        .lists
                        .iter_mut()
                        .find(|(l, _)| &l.id == list_id)
                        .ok_or_else(|| ApiError::NotFound(list_id.clone()))?;
                    tasks.push(task.clone());
                    Ok(Reply::Task(task))
                }
                Request::UpdateTask { list_id, id, patch } => {
                    let (_, tasks) = self
                        .lists
                        .iter_mut()
                        .find(|(l, _)| &l.id == list_id)
                        .ok_or_else(|| ApiError::NotFound(list_id.clone()))?;
                    let task = tasks
                        .iter_mut()
                        .find(|t| &t.id == id)
                        .ok_or_else(|| ApiError::NotFound(id.clone()))?;
                    task.apply(patch);
                    Ok(Reply::Task(task.clone()))
                }
                Request::DeleteList { id } => {
                    self.lists.retain(|(l, _)| &l.id != id);
                    Ok(Reply::Deleted)
                }
                Request::DeleteTask { list_id, id } => {
                    if let Some((_, tasks)) = self.lists.iter_mut().find(|(l, _)| &l.id == list_id) {
                        tasks.retain(|t| &t.id != id);
                    }
                    Ok(Reply::Deleted)
                }
                Request::UpdateList { id, title } => Ok(Reply::List(TodoList {
                    id: id.clone(),
                    title: title.clone(),
                })),
            }
        }
    }

    fn seeded() -> (Store, Memory) {
        let mut backend = Memory::default();
        let mut store = Store::new();
        for title in ["Family", "Work"] {
            store
                .resolve(&mut backend, Request::CreateList { title: title.into() })
                .unwrap();
        }
        store.pump(&mut backend);
        (store, backend)
    }

    #[test]
    fn dispatch_is_deferred_until_pump() {
        let (mut store, mut backend) = seeded();
        let list_id = store.current_list.clone().unwrap();
        store.dispatch(
            Request::CreateTask {
                list_id,
                input: TaskInput {
                    title: "Buy some milk".into(),
                    ..TaskInput::default()
                },
            },
            Origin::Dialog(DialogToken(1)),
        );
        assert!(store.has_pending());
        assert!(store.tasks.is_empty());

        let done = store.pump(&mut backend);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].origin, Origin::Dialog(DialogToken(1)));
        assert!(done[0].result.is_ok());
        assert_eq!(store.tasks.len(), 1);
        assert!(!store.has_pending());
    }

    #[test]
    fn creating_a_list_makes_it_current_and_loads_tasks() {
        let (store, _) = seeded();
        assert_eq!(store.lists.len(), 2);
        assert_eq!(store.current_list().map(|l| l.title.as_str()), Some("Work"));
    }

    #[test]
    fn failures_leave_cache_untouched() {
        let (mut store, mut backend) = seeded();
        let before = store.lists.clone();
        backend.fail_with = Some("server says no".into());
        let err = store
            .resolve(&mut backend, Request::CreateList { title: "X".into() })
            .unwrap_err();
        assert_eq!(err.to_string(), "server says no");
        assert_eq!(store.lists, before);
    }

    #[test]
    fn update_and_delete_reduce_into_tasks() {
        let (mut store, mut backend) = seeded();
        let list_id = store.current_list.clone().unwrap();
        let reply = store
            .resolve(
                &mut backend,
                Request::CreateTask {
                    list_id: list_id.clone(),
                    input: TaskInput {
                        title: "Report".into(),
                        ..TaskInput::default()
                    },
                },
            )
            .unwrap();
        let Reply::Task(task) = reply else {
            panic!("expected a task");
        };

        store
            .resolve(
                &mut backend,
                Request::UpdateTask {
                    list_id: list_id.clone(),
                    id: task.id.clone(),
                    patch: TaskPatch::toggle(false),
                },
            )
            .unwrap();
        assert!(store.task(&task.id).unwrap().done);

        store
            .resolve(
                &mut backend,
                Request::DeleteTask {
                    list_id,
                    id: task.id.clone(),
                },
            )
            .unwrap();
        assert!(store.task(&task.id).is_none());
    }

    #[test]
    fn deleting_current_list_falls_back_to_first() {
        let (mut store, mut backend) = seeded();
        let current = store.current_list.clone().unwrap();
        store
            .resolve(&mut backend, Request::DeleteList { id: current })
            .unwrap();
        assert_eq!(store.current_list().map(|l| l.title.as_str()), Some("Family"));
        assert!(store.has_pending());
    }

    #[test]
    fn stale_task_fetch_is_ignored() {
        let (mut store, mut backend) = seeded();
        let family = store.lists[0].id.clone();
        let work = store.lists[1].id.clone();
        store.current_list = Some(work.clone());
        store.dispatch(
            Request::FetchTasks { list_id: family },
            Origin::Screen(ScreenAction::Load),
        );
        store.tasks = vec![Task::new("keep".into(), TaskInput::default())];
        store.pump(&mut backend);
        assert_eq!(store.tasks.len(), 1);
        assert_eq!(store.current_list.as_deref(), Some(work.as_str()));
    }
}
