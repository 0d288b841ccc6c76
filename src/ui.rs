use crate::api::{Reply, Request};
use crate::config::Config;
use crate::dialog::{DialogAction, TaskDialog};
use crate::due::{classify, classify_clock, format_limit, Bucket, DueMode};
use crate::field::{field_lines, FieldValue};
use crate::focus::{Document, ElementId};
use crate::model::{ListId, Task, TaskId, TaskPatch};
use crate::storage::FileBackend;
use crate::store::{Completion, DialogToken, Origin, ScreenAction, Store};
use anyhow::Result;
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend as TerminalBackend, CrosstermBackend};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::collections::{HashMap, HashSet};
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{debug, info};

pub fn run(backend: FileBackend, config: &Config) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(backend, config);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: Store,
    backend: FileBackend,
    document: Document,
    rows: HashMap<TaskId, ElementId>,
    screen: Screen,
    dialog: Option<TaskDialog>,
    pane: Pane,
    filter: Filter,
    due_mode: DueMode,
    list_idx: usize,
    task_idx: usize,
    task_offset: usize,
    toggling: HashSet<TaskId>,
    next_token: u64,
    status: String,
    error: Option<String>,
}

enum Screen {
    Main,
    ListForm(ListForm),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Pane {
    Lists,
    Tasks,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Filter {
    Todo,
    Done,
}

struct ListForm {
    list_id: Option<ListId>,
    title: FieldValue,
    submitting: bool,
    deleting: bool,
    confirming_delete: bool,
    error: Option<String>,
}

impl Filter {
    fn label(&self) -> &'static str {
        match self {
            Filter::Todo => "To Do",
            Filter::Done => "Done",
        }
    }

    fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::Todo => !task.done,
            Filter::Done => task.done,
        }
    }
}

impl ListForm {
    fn new() -> Self {
        ListForm {
            list_id: None,
            title: FieldValue::default(),
            submitting: false,
            deleting: false,
            confirming_delete: false,
            error: None,
        }
    }

    fn edit(list_id: &str, title: &str) -> Self {
        ListForm {
            list_id: Some(list_id.to_string()),
            title: FieldValue::new(title),
            ..ListForm::new()
        }
    }

    fn busy(&self) -> bool {
        self.submitting || self.deleting
    }
}

impl App {
    fn new(backend: FileBackend, config: &Config) -> Self {
        let mut store = Store::new();
        store.dispatch(Request::FetchLists, Origin::Screen(ScreenAction::Load));
        let status = format!("Loaded {}", backend.location().path.display());
        App {
            store,
            backend,
            document: Document::new(),
            rows: HashMap::new(),
            screen: Screen::Main,
            dialog: None,
            pane: Pane::Tasks,
            filter: if config.show_done {
                Filter::Done
            } else {
                Filter::Todo
            },
            due_mode: config.due_mode,
            list_idx: 0,
            task_idx: 0,
            task_offset: 0,
            toggling: HashSet::new(),
            next_token: 0,
            status,
            error: None,
        }
    }

    fn event_loop<B: TerminalBackend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            // Draw once with the in-flight state before resolving requests.
            if self.store.has_pending() {
                self.pump();
                continue;
            }
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn pump(&mut self) {
        for completion in self.store.pump(&mut self.backend) {
            self.handle_completion(completion);
        }
        self.sync_rows();
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            origin,
            request,
            result,
            ..
        } = completion;
        match origin {
            Origin::Dialog(token) => match self.dialog.as_mut() {
                Some(dialog) if dialog.token == token => {
                    if dialog.settle(&result) {
                        self.status = match request {
                            Request::CreateTask { .. } => "Task created".into(),
                            Request::DeleteTask { .. } => "Task deleted".into(),
                            _ => "Task updated".into(),
                        };
                        self.close_dialog();
                    }
                }
                _ => debug!(?token, "dropping reply for a dialog that is gone"),
            },
            Origin::Row(task_id) => {
                self.toggling.remove(&task_id);
                match (result, self.store.task(&task_id)) {
                    (Err(err), _) => self.error = Some(err.to_string()),
                    (Ok(_), Some(task)) => {
                        let state = if task.done { "done" } else { "to do" };
                        self.status = format!("Marked {} as {}", task.title, state);
                    }
                    (Ok(_), None) => {}
                }
            }
            Origin::Screen(ScreenAction::Load) => {
                if let Err(err) = result {
                    self.error = Some(err.to_string());
                }
            }
            Origin::Screen(action) => {
                let Screen::ListForm(form) = &mut self.screen else {
                    debug!(?action, "dropping reply for a closed list form");
                    return;
                };
                form.submitting = false;
                form.deleting = false;
                match result {
                    Ok(reply) => {
                        self.status = match (action, reply) {
                            (ScreenAction::CreateList, Reply::List(list)) => {
                                self.pane = Pane::Tasks;
                                format!("Created list {}", list.title)
                            }
                            (ScreenAction::DeleteList, _) => "List deleted".into(),
                            _ => "List updated".into(),
                        };
                        self.navigate_main();
                    }
                    Err(err) => form.error = Some(err.to_string()),
                }
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.dialog.is_some() {
            self.handle_dialog_key(key);
            return false;
        }
        match self.screen {
            Screen::Main => self.handle_main_key(key),
            Screen::ListForm(_) => {
                self.handle_list_form_key(key);
                false
            }
        }
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> bool {
        self.error = None;
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab | KeyCode::BackTab => {
                self.pane = match self.pane {
                    Pane::Lists => Pane::Tasks,
                    Pane::Tasks => Pane::Lists,
                };
                self.focus_selected_row();
            }
            KeyCode::Char('r') => {
                self.store
                    .dispatch(Request::FetchLists, Origin::Screen(ScreenAction::Load));
                self.status = "Refreshing".into();
            }
            _ => match self.pane {
                Pane::Lists => self.handle_lists_key(key),
                Pane::Tasks => self.handle_tasks_key(key),
            },
        }
        false
    }

    fn handle_lists_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.list_idx = self.list_idx.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.list_idx + 1 < self.store.lists.len() {
                    self.list_idx += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                if let Some(list) = self.store.lists.get(self.list_idx) {
                    let id = list.id.clone();
                    self.status = format!("Opened {}", list.title);
                    self.store.select_list(&id);
                    self.task_idx = 0;
                    self.pane = Pane::Tasks;
                }
            }
            KeyCode::Char('n') => self.screen = Screen::ListForm(ListForm::new()),
            KeyCode::Char('e') => {
                if let Some(list) = self.store.lists.get(self.list_idx) {
                    self.screen = Screen::ListForm(ListForm::edit(&list.id, &list.title));
                }
            }
            _ => {}
        }
    }

    fn handle_tasks_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.task_idx = self.task_idx.saturating_sub(1);
                self.focus_selected_row();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.task_idx + 1 < self.visible_tasks().len() {
                    self.task_idx += 1;
                }
                self.focus_selected_row();
            }
            KeyCode::Char('f') => {
                self.filter = match self.filter {
                    Filter::Todo => Filter::Done,
                    Filter::Done => Filter::Todo,
                };
                self.task_idx = 0;
                self.task_offset = 0;
                self.focus_selected_row();
            }
            KeyCode::Char(' ') | KeyCode::Char('x') => self.toggle_selected(),
            KeyCode::Enter | KeyCode::Char('e') => self.open_edit_dialog(),
            KeyCode::Char('n') => self.open_create_dialog(),
            _ => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        match dialog.handle_key(key) {
            DialogAction::None => {}
            DialogAction::Close => {
                self.status = "Canceled".into();
                self.close_dialog();
            }
            DialogAction::Submit => match dialog.submission(&Local) {
                Ok(request) => {
                    dialog.begin(&request);
                    let origin = Origin::Dialog(dialog.token);
                    self.store.dispatch(request, origin);
                }
                Err(message) => dialog.fail(message),
            },
            DialogAction::Delete => {
                if let Some(request) = dialog.delete_request() {
                    dialog.begin(&request);
                    let origin = Origin::Dialog(dialog.token);
                    self.store.dispatch(request, origin);
                }
            }
        }
    }

    fn handle_list_form_key(&mut self, key: KeyEvent) {
        let Screen::ListForm(form) = &mut self.screen else {
            return;
        };
        if form.confirming_delete {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    form.confirming_delete = false;
                    if let Some(id) = form.list_id.clone() {
                        form.deleting = true;
                        form.error = None;
                        self.store.dispatch(
                            Request::DeleteList { id },
                            Origin::Screen(ScreenAction::DeleteList),
                        );
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => form.confirming_delete = false,
                _ => {}
            }
            return;
        }
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.navigate_main(),
            KeyCode::Enter => {
                if form.busy() {
                    return;
                }
                form.submitting = true;
                form.error = None;
                let title = form.title.value.clone();
                let (request, action) = match &form.list_id {
                    Some(id) => (
                        Request::UpdateList {
                            id: id.clone(),
                            title,
                        },
                        ScreenAction::UpdateList,
                    ),
                    None => (Request::CreateList { title }, ScreenAction::CreateList),
                };
                self.store.dispatch(request, Origin::Screen(action));
            }
            KeyCode::Char('d') if control => {
                if form.list_id.is_some() && !form.busy() {
                    form.confirming_delete = true;
                }
            }
            KeyCode::Left => form.title.move_left(),
            KeyCode::Right => form.title.move_right(),
            KeyCode::Backspace => form.title.backspace(),
            KeyCode::Char(c) if !control => form.title.insert_char(c),
            _ => {}
        }
    }

    fn navigate_main(&mut self) {
        self.screen = Screen::Main;
        if let Some(current) = &self.store.current_list {
            if let Some(idx) = self.store.lists.iter().position(|l| &l.id == current) {
                self.list_idx = idx;
            }
        }
        self.clamp_selection();
    }

    fn next_token(&mut self) -> DialogToken {
        self.next_token += 1;
        DialogToken(self.next_token)
    }

    fn open_edit_dialog(&mut self) {
        let Some(list_id) = self.store.current_list.clone() else {
            return;
        };
        let Some(task) = self.selected_task().cloned() else {
            self.status = "No task selected to edit".into();
            return;
        };
        self.focus_selected_row();
        let token = self.next_token();
        info!(task = %task.id, "editing task");
        self.dialog = Some(TaskDialog::edit(&self.document, token, list_id, &task, &Local));
    }

    fn open_create_dialog(&mut self) {
        let Some(list_id) = self.store.current_list.clone() else {
            self.status = "Create a list first".into();
            return;
        };
        self.focus_selected_row();
        let token = self.next_token();
        self.dialog = Some(TaskDialog::create(&self.document, token, list_id));
    }

    fn close_dialog(&mut self) {
        if let Some(mut dialog) = self.dialog.take() {
            if dialog.is_open() {
                dialog.close();
            }
        }
        self.sync_rows();
        self.select_focused_row();
    }

    fn toggle_selected(&mut self) {
        let Some(list_id) = self.store.current_list.clone() else {
            return;
        };
        let Some(task) = self.selected_task() else {
            return;
        };
        if self.toggling.contains(&task.id) {
            return;
        }
        let id = task.id.clone();
        let patch = TaskPatch::toggle(task.done);
        self.toggling.insert(id.clone());
        self.store.dispatch(
            Request::UpdateTask {
                list_id,
                id: id.clone(),
                patch,
            },
            Origin::Row(id),
        );
    }

    fn visible_tasks(&self) -> Vec<&Task> {
        self.store
            .tasks
            .iter()
            .filter(|t| self.filter.matches(t))
            .collect()
    }

    fn selected_task(&self) -> Option<&Task> {
        self.visible_tasks().get(self.task_idx).copied()
    }

    /// Keeps one document element per cached task.
    fn sync_rows(&mut self) {
        let live: HashSet<&str> = self.store.tasks.iter().map(|t| t.id.as_str()).collect();
        let document = &self.document;
        self.rows.retain(|id, element| {
            let keep = live.contains(id.as_str());
            if !keep {
                document.detach(*element);
            }
            keep
        });
        for task in &self.store.tasks {
            if !self.rows.contains_key(&task.id) {
                self.rows.insert(task.id.clone(), self.document.create());
            }
        }
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        self.list_idx = self
            .list_idx
            .min(self.store.lists.len().saturating_sub(1));
        self.task_idx = self
            .task_idx
            .min(self.visible_tasks().len().saturating_sub(1));
    }

    fn focus_selected_row(&mut self) {
        if self.pane != Pane::Tasks {
            return;
        }
        if let Some(element) = self
            .selected_task()
            .and_then(|task| self.rows.get(&task.id))
        {
            self.document.focus(*element);
        }
    }

    /// After a dialog closes, focus is back on whatever row opened it.
    fn select_focused_row(&mut self) {
        let Some(active) = self.document.active() else {
            return;
        };
        let found = self
            .visible_tasks()
            .iter()
            .position(|task| self.rows.get(&task.id) == Some(&active));
        if let Some(idx) = found {
            self.task_idx = idx;
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let now = Local::now();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        if let Screen::ListForm(form) = &self.screen {
            draw_list_form(f, layout[1], form);
        } else {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(layout[1]);
            self.draw_lists(f, body[0]);
            self.draw_tasks(f, body[1], &now);
        }
        self.draw_footer(f, layout[2], &now);

        if let Some(dialog) = &self.dialog {
            let area = centered_rect(70, 70, f.size());
            dialog.draw(f, area);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let location = self.backend.location();
        let list = self
            .store
            .current_list()
            .map(|l| l.title.clone())
            .unwrap_or_else(|| "(no list)".into());
        let title = Line::from(vec![
            Span::styled(
                "todos ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(list, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(location.scope.label(), Style::default().fg(Color::Green)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", location.path.display()),
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_lists(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.pane == Pane::Lists;
        let current = self.store.current_list.as_deref();
        let items = if self.store.lists.is_empty() {
            vec![ListItem::new("No lists yet (n to create)")]
        } else {
            self.store
                .lists
                .iter()
                .map(|list| {
                    let style = if Some(list.id.as_str()) == current {
                        Style::default()
                            .fg(Color::LightYellow)
                            .add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(Color::White)
                    };
                    ListItem::new(format!("≡ {}", list.title)).style(style)
                })
                .collect()
        };
        let mut state = ListState::default();
        if focused && !self.store.lists.is_empty() {
            state.select(Some(self.list_idx));
        }
        let list = List::new(items)
            .block(pane_block("Lists", focused))
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_tasks(&mut self, f: &mut ratatui::Frame<'_>, area: Rect, now: &DateTime<Local>) {
        let focused = self.pane == Pane::Tasks;
        let tasks = self.visible_tasks();
        let count = tasks.len();
        let items = if tasks.is_empty() {
            vec![ListItem::new("No tasks")]
        } else {
            tasks
                .iter()
                .enumerate()
                .map(|(idx, task)| {
                    task_item(
                        task,
                        now,
                        self.due_mode,
                        focused && idx == self.task_idx,
                        self.toggling.contains(&task.id),
                    )
                })
                .collect()
        };
        let title = format!("{} ({})", self.filter.label(), count);
        let list = List::new(items).block(pane_block(&title, focused));

        // The background list stays put while a dialog holds the scroll lock.
        if !self.document.scroll_locked() {
            let viewport = area.height.saturating_sub(2) as usize / 3;
            self.task_offset = adjust_offset(self.task_idx, self.task_offset, viewport, 1, count);
        }
        let mut state = ListState::default();
        *state.offset_mut() = self.task_offset;
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect, now: &DateTime<Local>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let status = match &self.error {
            Some(err) => Line::from(Span::styled(err.clone(), Style::default().fg(Color::LightRed))),
            None => Line::from(self.status.clone()),
        };
        let status = Paragraph::new(status).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray)),
        );
        f.render_widget(status, bottom[0]);

        let detail = match self.selected_task() {
            Some(task) => selected_task_detail(task, now),
            None => Line::from("No task selected"),
        };
        let detail = Paragraph::new(detail).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Selected"),
        );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        let mut spans = vec![key("Tab", Color::LightCyan), Span::raw(" pane  ")];
        if self.dialog.is_some() {
            return Line::from(vec![
                key("Tab/Shift-Tab", Color::LightCyan),
                Span::raw(" move  "),
                key("Enter", Color::LightYellow),
                Span::raw(" activate  "),
                key("Ctrl+Enter", Color::LightGreen),
                Span::raw(" save from description  "),
                key("Esc", Color::LightRed),
                Span::raw(" close"),
            ]);
        }
        match (&self.screen, self.pane) {
            (Screen::ListForm(_), _) => {
                return Line::from(vec![
                    key("Enter", Color::LightGreen),
                    Span::raw(" save  "),
                    key("Ctrl+D", Color::LightRed),
                    Span::raw(" delete  "),
                    key("Esc", Color::LightRed),
                    Span::raw(" cancel"),
                ])
            }
            (Screen::Main, Pane::Lists) => spans.extend([
                key("↑↓ / j k", Color::LightCyan),
                Span::raw(" move  "),
                key("Enter", Color::LightYellow),
                Span::raw(" open  "),
                key("n", Color::LightMagenta),
                Span::raw(" new list  "),
                key("e", Color::LightYellow),
                Span::raw(" edit list  "),
            ]),
            (Screen::Main, Pane::Tasks) => spans.extend([
                key("↑↓ / j k", Color::LightCyan),
                Span::raw(" move  "),
                key("Space", Color::LightGreen),
                Span::raw(" done  "),
                key("n", Color::LightMagenta),
                Span::raw(" new  "),
                key("e", Color::LightYellow),
                Span::raw(" edit  "),
                key("f", Color::LightCyan),
                Span::raw(" to do/done  "),
            ]),
        }
        spans.extend([
            key("r", Color::LightCyan),
            Span::raw(" refresh  "),
            key("q", Color::LightRed),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }
}

fn draw_list_form(f: &mut ratatui::Frame<'_>, area: Rect, form: &ListForm) {
    let title = if form.list_id.is_some() {
        "Edit List"
    } else {
        "New List"
    };
    let mut lines = Vec::new();
    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::LightRed),
        )));
    }
    lines.extend(field_lines("Name", &form.title, "Family", true, false));
    lines.push(Line::from(""));
    let action = match (form.list_id.is_some(), form.submitting, form.deleting) {
        (_, _, true) => "Deleting...",
        (true, true, _) => "Updating...",
        (false, true, _) => "Creating...",
        (true, false, _) => "Enter to update, Ctrl+D to delete, Esc to cancel",
        (false, false, _) => "Enter to create, Esc to cancel",
    };
    lines.push(Line::from(Span::styled(action, Style::default().fg(Color::Gray))));
    if form.confirming_delete {
        lines.push(Line::from(Span::styled(
            "Are you sure you want to delete this list? (y/n)",
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        )));
    }
    let paragraph = Paragraph::new(lines)
        .block(pane_block(title, true))
        .wrap(Wrap { trim: false });
    let area = centered_rect(60, 60, area);
    f.render_widget(Clear, area);
    f.render_widget(paragraph, area);
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
}

fn bucket_style(bucket: Bucket) -> Style {
    match bucket {
        Bucket::Overdue => Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD),
        Bucket::Today => Style::default().fg(Color::LightBlue),
        Bucket::Tomorrow => Style::default().fg(Color::LightYellow),
        Bucket::Future | Bucket::None => Style::default().fg(Color::Gray),
    }
}

fn task_item(
    task: &Task,
    now: &DateTime<Local>,
    mode: DueMode,
    selected: bool,
    in_flight: bool,
) -> ListItem<'static> {
    let mark = match (in_flight, task.done) {
        (true, _) => "[…]",
        (false, true) => "[x]",
        (false, false) => "[ ]",
    };
    let title_style = if task.done {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(format!("{} ", mark), Style::default().fg(Color::LightGreen)),
        Span::styled(task.title.clone(), title_style),
    ])];
    lines.push(Line::from(Span::styled(
        format!("    {}", task.detail.lines().next().unwrap_or_default()),
        Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
    )));
    let due = classify(mode, task.limit, now);
    match (task.limit.as_ref(), task.done) {
        (Some(limit), false) => lines.push(Line::from(vec![
            Span::raw("    due "),
            Span::styled(format_limit(limit, &Local), Style::default().fg(Color::Gray)),
            Span::raw("  "),
            Span::styled(due.label, bucket_style(due.bucket)),
        ])),
        _ => lines.push(Line::from("")),
    }
    let mut item = ListItem::new(lines);
    if selected {
        item = item.style(Style::default().bg(Color::Rgb(40, 44, 56)));
    }
    item
}

fn selected_task_detail(task: &Task, now: &DateTime<Local>) -> Line<'static> {
    let mut spans = vec![Span::styled(
        task.title.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(limit) = task.limit.as_ref() {
        let due = classify_clock(task.limit, now);
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format_limit(limit, &Local),
            Style::default().fg(Color::LightRed),
        ));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(due.label, bucket_style(due.bucket)));
    }
    if !task.detail.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            task.detail.clone(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}
