use crate::api::{ApiError, Reply, Request};
use crate::due::{parse_limit, split_limit};
use crate::field::{checkbox_line, field_lines, FieldValue};
use crate::focus::{
    step_focus, Document, Element, ElementId, FocusScope, KeyOutcome, ModalFocus, Role, TrapKey,
};
use crate::model::{ListId, Task, TaskId, TaskInput, TaskPatch};
use crate::store::DialogToken;
use chrono::TimeZone;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::prelude::{Alignment, Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogTarget {
    Create { list_id: ListId },
    Edit { list_id: ListId, task_id: TaskId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Title,
    Detail,
    Date,
    Time,
    Done,
    Cancel,
    Delete,
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    None,
    Close,
    Submit,
    Delete,
}

const CONTROLS: [Control; 8] = [
    Control::Title,
    Control::Detail,
    Control::Date,
    Control::Time,
    Control::Done,
    Control::Cancel,
    Control::Delete,
    Control::Submit,
];

pub struct DialogForm {
    pub target: DialogTarget,
    pub title: FieldValue,
    pub detail: FieldValue,
    pub date: FieldValue,
    pub time: FieldValue,
    pub done: bool,
    pub updating: bool,
    pub deleting: bool,
    pub confirming_delete: bool,
    pub error: Option<String>,
    ids: Vec<(Control, ElementId)>,
}

impl DialogForm {
    fn busy(&self) -> bool {
        self.updating || self.deleting
    }

    fn id(&self, control: Control) -> ElementId {
        self.ids
            .iter()
            .find(|(c, _)| *c == control)
            .map(|(_, id)| *id)
            .unwrap_or_else(|| self.ids[0].1)
    }

    fn control(&self, id: ElementId) -> Option<Control> {
        self.ids.iter().find(|(_, i)| *i == id).map(|(c, _)| *c)
    }

    fn enabled(&self, control: Control) -> bool {
        match control {
            Control::Time => !self.date.is_blank(),
            Control::Delete | Control::Submit => !self.busy(),
            _ => true,
        }
    }

    fn is_edit(&self) -> bool {
        matches!(self.target, DialogTarget::Edit { .. })
    }
}

impl FocusScope for DialogForm {
    fn elements(&self) -> Vec<Element> {
        CONTROLS
            .iter()
            .filter(|c| **c != Control::Delete || self.is_edit())
            .map(|c| {
                let role = match c {
                    Control::Title | Control::Date | Control::Time | Control::Done => Role::Input,
                    Control::Detail => Role::TextArea,
                    Control::Cancel | Control::Delete | Control::Submit => Role::Button,
                };
                Element::new(self.id(*c), role).disabled(!self.enabled(*c))
            })
            .collect()
    }
}

pub struct TaskDialog {
    pub token: DialogToken,
    pub form: DialogForm,
    focus: ModalFocus,
    document: Document,
}

impl TaskDialog {
    pub fn create(document: &Document, token: DialogToken, list_id: ListId) -> Self {
        TaskDialog::open(
            document,
            token,
            DialogTarget::Create { list_id },
            &Task::new(String::new(), TaskInput::default()),
            ("", ""),
        )
    }

    pub fn edit<Tz: TimeZone>(
        document: &Document,
        token: DialogToken,
        list_id: ListId,
        task: &Task,
        tz: &Tz,
    ) -> Self {
        let (date, time) = split_limit(task.limit.as_ref(), tz);
        TaskDialog::open(
            document,
            token,
            DialogTarget::Edit {
                list_id,
                task_id: task.id.clone(),
            },
            task,
            (&date, &time),
        )
    }

    fn open(
        document: &Document,
        token: DialogToken,
        target: DialogTarget,
        task: &Task,
        (date, time): (&str, &str),
    ) -> Self {
        let form = DialogForm {
            target,
            title: FieldValue::new(&task.title),
            detail: FieldValue::new(&task.detail),
            date: FieldValue::new(date),
            time: FieldValue::new(time),
            done: task.done,
            updating: false,
            deleting: false,
            confirming_delete: false,
            error: None,
            ids: CONTROLS.iter().map(|c| (*c, document.create())).collect(),
        };
        let mut focus = ModalFocus::new(document);
        focus.set_open(true, &form);
        debug!(?token, target = ?form.target, "task dialog opened");
        TaskDialog {
            token,
            form,
            focus,
            document: document.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.focus.is_open()
    }

    pub fn close(&mut self) {
        self.focus.set_open(false, &self.form);
        debug!(token = ?self.token, "task dialog closed");
    }

    pub fn active_control(&self) -> Option<Control> {
        self.form.control(self.document.active()?)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> DialogAction {
        if self.form.confirming_delete {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.form.confirming_delete = false;
                    return DialogAction::Delete;
                }
                KeyCode::Char('n') | KeyCode::Esc => self.form.confirming_delete = false,
                _ => {}
            }
            return DialogAction::None;
        }

        let trap_key = match key.code {
            KeyCode::Esc => TrapKey::Escape,
            KeyCode::Tab => TrapKey::Tab,
            KeyCode::BackTab => TrapKey::BackTab,
            _ => TrapKey::Other,
        };
        match self.focus.handle_key(trap_key, &self.form) {
            KeyOutcome::Close => return DialogAction::Close,
            KeyOutcome::Redirected => return DialogAction::None,
            KeyOutcome::PassThrough => {}
        }
        match trap_key {
            TrapKey::Tab => step_focus(&self.document, &self.form, false),
            TrapKey::BackTab => step_focus(&self.document, &self.form, true),
            _ => return self.activate(key),
        }
        DialogAction::None
    }

    fn activate(&mut self, key: KeyEvent) -> DialogAction {
        let Some(control) = self.active_control() else {
            return DialogAction::None;
        };
        if !self.form.enabled(control) {
            return DialogAction::None;
        }
        let pressed = matches!(key.code, KeyCode::Enter | KeyCode::Char(' '));
        match control {
            Control::Done => {
                if pressed {
                    self.form.done = !self.form.done;
                }
                DialogAction::None
            }
            Control::Cancel if pressed => DialogAction::Close,
            Control::Delete if pressed => {
                self.form.confirming_delete = true;
                DialogAction::None
            }
            Control::Submit if pressed => DialogAction::Submit,
            Control::Cancel | Control::Delete | Control::Submit => DialogAction::None,
            Control::Title | Control::Detail | Control::Date | Control::Time => {
                self.edit_text(control, key)
            }
        }
    }

    fn edit_text(&mut self, control: Control, key: KeyEvent) -> DialogAction {
        let multiline = control == Control::Detail;
        let field = match control {
            Control::Title => &mut self.form.title,
            Control::Detail => &mut self.form.detail,
            Control::Date => &mut self.form.date,
            _ => &mut self.form.time,
        };
        match key.code {
            KeyCode::Enter => {
                if multiline && !key.modifiers.contains(KeyModifiers::CONTROL) {
                    field.insert_char('\n');
                } else if !self.form.updating && !self.form.deleting {
                    return DialogAction::Submit;
                }
            }
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Up if multiline => field.move_up(),
            KeyCode::Down if multiline => field.move_down(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    field.insert_char(c);
                }
            }
            _ => {}
        }
        if self.form.date.is_blank() && !self.form.time.value.is_empty() {
            self.form.time = FieldValue::default();
        }
        DialogAction::None
    }

    /// Builds the create/update request from the draft.
    pub fn submission<Tz: TimeZone>(&self, tz: &Tz) -> Result<Request, String> {
        let limit = parse_limit(&self.form.date.value, &self.form.time.value, tz)
            .map_err(|err| err.to_string())?;
        let form = &self.form;
        Ok(match &form.target {
            DialogTarget::Create { list_id } => Request::CreateTask {
                list_id: list_id.clone(),
                input: TaskInput {
                    title: form.title.value.clone(),
                    detail: form.detail.value.clone(),
                    done: form.done,
                    limit,
                },
            },
            DialogTarget::Edit { list_id, task_id } => Request::UpdateTask {
                list_id: list_id.clone(),
                id: task_id.clone(),
                patch: TaskPatch {
                    title: Some(form.title.value.clone()),
                    detail: Some(form.detail.value.clone()),
                    done: Some(form.done),
                    limit: Some(limit),
                },
            },
        })
    }

    pub fn delete_request(&self) -> Option<Request> {
        match &self.form.target {
            DialogTarget::Edit { list_id, task_id } => Some(Request::DeleteTask {
                list_id: list_id.clone(),
                id: task_id.clone(),
            }),
            DialogTarget::Create { .. } => None,
        }
    }

    pub fn begin(&mut self, request: &Request) {
        self.form.error = None;
        match request {
            Request::DeleteTask { .. } => self.form.deleting = true,
            _ => self.form.updating = true,
        }
    }

    /// Clears the in-flight flags. Returns `true` when the dialog should
    /// close.
    pub fn settle(&mut self, result: &Result<Reply, ApiError>) -> bool {
        self.form.updating = false;
        self.form.deleting = false;
        match result {
            Ok(_) => true,
            Err(err) => {
                self.form.error = Some(err.to_string());
                false
            }
        }
    }

    pub fn fail(&mut self, message: String) {
        self.form.error = Some(message);
    }

    pub fn draw(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let form = &self.form;
        let active = self.active_control();
        let is = |c: Control| active == Some(c);
        let (title, submit) = if form.is_edit() {
            ("Edit Task", "Update")
        } else {
            ("New Task", "Create")
        };

        let mut lines = Vec::new();
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::LightRed),
            )));
            lines.push(Line::from(""));
        }
        lines.extend(field_lines("Title", &form.title, "Buy some milk", is(Control::Title), false));
        lines.extend(field_lines(
            "Description",
            &form.detail,
            "Blah blah blah",
            is(Control::Detail),
            false,
        ));
        lines.extend(field_lines(
            "Due Date",
            &form.date,
            "YYYY-MM-DD",
            is(Control::Date),
            false,
        ));
        lines.extend(field_lines(
            "Time",
            &form.time,
            "--:--",
            is(Control::Time),
            !form.enabled(Control::Time),
        ));
        lines.push(checkbox_line("Is Done", form.done, is(Control::Done)));
        lines.push(Line::from(""));

        let mut buttons = vec![button("Cancel", is(Control::Cancel), true), Span::raw("   ")];
        if form.is_edit() {
            let label = if form.deleting { "Deleting..." } else { "Delete" };
            buttons.push(button(label, is(Control::Delete), form.enabled(Control::Delete)));
            buttons.push(Span::raw("   "));
        }
        let label = if form.updating { "Updating..." } else { submit };
        buttons.push(button(label, is(Control::Submit), form.enabled(Control::Submit)));
        lines.push(Line::from(buttons).alignment(Alignment::Right));

        if form.confirming_delete {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Are you sure you want to delete this task? (y/n)",
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )));
        }

        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        title,
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

impl Drop for TaskDialog {
    fn drop(&mut self) {
        for (_, id) in &self.form.ids {
            self.document.detach(*id);
        }
    }
}

fn button(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let style = if !enabled {
        Style::default().fg(Color::DarkGray)
    } else if focused {
        Style::default()
            .bg(Color::Cyan)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };
    Span::styled(format!("[ {} ]", label), style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use crossterm::event::KeyEventKind;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(dialog: &mut TaskDialog, text: &str) {
        for ch in text.chars() {
            dialog.handle_key(key(KeyCode::Char(ch)));
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn task() -> Task {
        Task {
            id: "t1".into(),
            title: "Buy some milk".into(),
            detail: String::new(),
            done: false,
            limit: Some(Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap()),
        }
    }

    #[test]
    fn opening_focuses_title_and_prefills_draft() {
        let doc = Document::new();
        let dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        assert!(dialog.is_open());
        assert!(doc.scroll_locked());
        assert_eq!(dialog.active_control(), Some(Control::Title));
        assert_eq!(dialog.form.date.value, "2025-03-10");
        assert_eq!(dialog.form.time.value, "09:30");
    }

    #[test]
    fn tab_cycles_through_controls_and_wraps() {
        let doc = Document::new();
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        let mut seen = vec![dialog.active_control().unwrap()];
        for _ in 0..8 {
            dialog.handle_key(key(KeyCode::Tab));
            seen.push(dialog.active_control().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                Control::Title,
                Control::Detail,
                Control::Date,
                Control::Time,
                Control::Done,
                Control::Cancel,
                Control::Delete,
                Control::Submit,
                Control::Title,
            ]
        );
        dialog.handle_key(key(KeyCode::BackTab));
        assert_eq!(dialog.active_control(), Some(Control::Submit));
    }

    #[test]
    fn time_leaves_tab_order_without_date() {
        let doc = Document::new();
        let mut dialog = TaskDialog::create(&doc, DialogToken(2), "l1".into());
        dialog.handle_key(key(KeyCode::Tab));
        dialog.handle_key(key(KeyCode::Tab));
        assert_eq!(dialog.active_control(), Some(Control::Date));
        dialog.handle_key(key(KeyCode::Tab));
        assert_eq!(dialog.active_control(), Some(Control::Done));
        // Create dialogs have no delete button.
        dialog.handle_key(key(KeyCode::Tab));
        dialog.handle_key(key(KeyCode::Tab));
        assert_eq!(dialog.active_control(), Some(Control::Submit));
    }

    #[test]
    fn escape_requests_close_and_close_restores_focus() {
        let doc = Document::new();
        let row = doc.create();
        doc.focus(row);
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), DialogAction::Close);
        dialog.close();
        drop(dialog);
        assert_eq!(doc.active(), Some(row));
        assert!(!doc.scroll_locked());
    }

    #[test]
    fn submit_builds_update_request() {
        let doc = Document::new();
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        type_text(&mut dialog, "!");
        dialog.handle_key(key(KeyCode::Tab));
        dialog.handle_key(key(KeyCode::Tab));
        dialog.handle_key(key(KeyCode::Tab));
        for _ in 0..5 {
            dialog.handle_key(key(KeyCode::Backspace));
        }
        assert_eq!(dialog.handle_key(key(KeyCode::Enter)), DialogAction::Submit);

        let request = dialog.submission(&utc()).unwrap();
        assert_eq!(
            request,
            Request::UpdateTask {
                list_id: "l1".into(),
                id: "t1".into(),
                patch: TaskPatch {
                    title: Some("Buy some milk!".into()),
                    detail: Some(String::new()),
                    done: Some(false),
                    limit: Some(Some(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap())),
                },
            }
        );
    }

    #[test]
    fn invalid_date_is_reported_not_submitted() {
        let doc = Document::new();
        let mut dialog = TaskDialog::create(&doc, DialogToken(3), "l1".into());
        dialog.handle_key(key(KeyCode::Tab));
        dialog.handle_key(key(KeyCode::Tab));
        type_text(&mut dialog, "tomorrow");
        let err = dialog.submission(&utc()).unwrap_err();
        assert_eq!(err, "invalid date (use YYYY-MM-DD): tomorrow");
    }

    #[test]
    fn in_flight_disables_actions_until_settled() {
        let doc = Document::new();
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        let request = dialog.submission(&utc()).unwrap();
        dialog.begin(&request);
        assert_eq!(dialog.handle_key(key(KeyCode::Enter)), DialogAction::None);
        // Delete and Update are disabled, so Cancel is the last stop.
        dialog.handle_key(key(KeyCode::BackTab));
        assert_eq!(dialog.active_control(), Some(Control::Cancel));

        let close = dialog.settle(&Err(ApiError::Invalid("title is required".into())));
        assert!(!close);
        assert_eq!(dialog.form.error.as_deref(), Some("title is required"));
        assert!(dialog.settle(&Ok(Reply::Deleted)));
    }

    #[test]
    fn delete_needs_confirmation() {
        let doc = Document::new();
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        dialog.handle_key(key(KeyCode::BackTab));
        dialog.handle_key(key(KeyCode::BackTab));
        assert_eq!(dialog.active_control(), Some(Control::Delete));
        assert_eq!(dialog.handle_key(key(KeyCode::Enter)), DialogAction::None);
        assert!(dialog.form.confirming_delete);
        assert_eq!(dialog.handle_key(key(KeyCode::Esc)), DialogAction::None);
        assert!(dialog.is_open());
        dialog.handle_key(key(KeyCode::Enter));
        assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), DialogAction::Delete);
        assert!(matches!(dialog.delete_request(), Some(Request::DeleteTask { .. })));
    }

    #[test]
    fn checkbox_toggles_with_space() {
        let doc = Document::new();
        let mut dialog = TaskDialog::edit(&doc, DialogToken(1), "l1".into(), &task(), &utc());
        for _ in 0..4 {
            dialog.handle_key(key(KeyCode::Tab));
        }
        let mut space = key(KeyCode::Char(' '));
        space.kind = KeyEventKind::Press;
        dialog.handle_key(space);
        assert!(dialog.form.done);
    }

    #[test]
    fn dropping_detaches_controls() {
        let doc = Document::new();
        let dialog = TaskDialog::create(&doc, DialogToken(4), "l1".into());
        let ids: Vec<ElementId> = dialog.form.ids.iter().map(|(_, id)| *id).collect();
        drop(dialog);
        assert!(ids.iter().all(|id| !doc.is_attached(*id)));
        assert!(!doc.scroll_locked());
    }
}
