use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(not(test), allow(dead_code))]
pub enum Role {
    Link { href: bool },
    Button,
    Input,
    Select,
    TextArea,
    Static,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub id: ElementId,
    pub role: Role,
    pub disabled: bool,
    pub tab_index: Option<i32>,
}

impl Element {
    pub fn new(id: ElementId, role: Role) -> Self {
        Element {
            id,
            role,
            disabled: false,
            tab_index: None,
        }
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn tab_index(mut self, index: i32) -> Self {
        self.tab_index = Some(index);
        self
    }

    pub fn is_focusable(&self) -> bool {
        let native = match self.role {
            Role::Link { href } => href,
            Role::Button | Role::Input | Role::Select | Role::TextArea => !self.disabled,
            Role::Static => false,
        };
        native || self.tab_index.is_some_and(|i| i >= 0)
    }
}

/// Something that owns a subtree of elements, listed in document order.
pub trait FocusScope {
    fn elements(&self) -> Vec<Element>;
}

pub fn focusable(scope: &dyn FocusScope) -> Vec<ElementId> {
    scope
        .elements()
        .into_iter()
        .filter(Element::is_focusable)
        .map(|e| e.id)
        .collect()
}

#[derive(Debug, Default)]
struct DocumentState {
    next_id: u64,
    attached: BTreeSet<ElementId>,
    active: Option<ElementId>,
    scroll_locks: usize,
}

/// Shared handle to the focus/scroll state. Cloning shares the state.
#[derive(Debug, Clone, Default)]
pub struct Document {
    state: Rc<RefCell<DocumentState>>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    pub fn create(&self) -> ElementId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = ElementId(state.next_id);
        state.attached.insert(id);
        id
    }

    pub fn detach(&self, id: ElementId) {
        let mut state = self.state.borrow_mut();
        state.attached.remove(&id);
        if state.active == Some(id) {
            state.active = None;
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_attached(&self, id: ElementId) -> bool {
        self.state.borrow().attached.contains(&id)
    }

    /// Focuses `id`. Detached elements cannot take focus.
    pub fn focus(&self, id: ElementId) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.attached.contains(&id) {
            return false;
        }
        state.active = Some(id);
        true
    }

    pub fn active(&self) -> Option<ElementId> {
        self.state.borrow().active
    }

    pub fn scroll_locked(&self) -> bool {
        self.state.borrow().scroll_locks > 0
    }

    fn lock_scroll(&self) {
        self.state.borrow_mut().scroll_locks += 1;
    }

    fn unlock_scroll(&self) {
        let mut state = self.state.borrow_mut();
        state.scroll_locks = state.scroll_locks.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKey {
    Escape,
    Tab,
    BackTab,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Close,
    Redirected,
    PassThrough,
}

/// Holds focus inside a scope until dropped.
#[derive(Debug)]
pub struct FocusTrap {
    document: Document,
    restore_to: Option<ElementId>,
}

impl FocusTrap {
    pub fn acquire(document: &Document, scope: &dyn FocusScope) -> Self {
        let restore_to = document.active();
        document.lock_scroll();
        if let Some(first) = focusable(scope).first() {
            document.focus(*first);
        }
        debug!(?restore_to, "focus trap acquired");
        FocusTrap {
            document: document.clone(),
            restore_to,
        }
    }

    pub fn handle_key(&self, key: TrapKey, scope: &dyn FocusScope) -> KeyOutcome {
        match key {
            TrapKey::Escape => KeyOutcome::Close,
            TrapKey::Tab | TrapKey::BackTab => {
                let items = focusable(scope);
                let (Some(first), Some(last)) = (items.first(), items.last()) else {
                    return KeyOutcome::PassThrough;
                };
                let active = self.document.active();
                if key == TrapKey::BackTab && active == Some(*first) {
                    self.document.focus(*last);
                    KeyOutcome::Redirected
                } else if key == TrapKey::Tab && active == Some(*last) {
                    self.document.focus(*first);
                    KeyOutcome::Redirected
                } else {
                    KeyOutcome::PassThrough
                }
            }
            TrapKey::Other => KeyOutcome::PassThrough,
        }
    }
}

impl Drop for FocusTrap {
    fn drop(&mut self) {
        self.document.unlock_scroll();
        if let Some(id) = self.restore_to {
            if !self.document.focus(id) {
                trace!(?id, "previous focus target is gone");
            }
        }
        debug!("focus trap released");
    }
}

/// Open/closed state machine for one dialog instance.
#[derive(Debug)]
pub struct ModalFocus {
    document: Document,
    trap: Option<FocusTrap>,
}

impl ModalFocus {
    pub fn new(document: &Document) -> Self {
        ModalFocus {
            document: document.clone(),
            trap: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.trap.is_some()
    }

    /// Drives the transition from the dialog's visibility flag. Setting the
    /// current state again is a no-op.
    pub fn set_open(&mut self, open: bool, scope: &dyn FocusScope) {
        match (open, self.trap.is_some()) {
            (true, false) => self.trap = Some(FocusTrap::acquire(&self.document, scope)),
            (false, true) => self.trap = None,
            _ => {}
        }
    }

    pub fn handle_key(&self, key: TrapKey, scope: &dyn FocusScope) -> KeyOutcome {
        match &self.trap {
            Some(trap) => trap.handle_key(key, scope),
            None => KeyOutcome::PassThrough,
        }
    }
}

/// Default tab movement within `scope`: next (or previous) focusable element
/// after the active one, or the first one if focus is elsewhere. Stops at the
/// ends; wrapping is the trap's job.
pub fn step_focus(document: &Document, scope: &dyn FocusScope, backward: bool) {
    let items = focusable(scope);
    if items.is_empty() {
        return;
    }
    let target = match document.active().and_then(|a| items.iter().position(|i| *i == a)) {
        Some(idx) if backward => items[idx.saturating_sub(1)],
        Some(idx) => items[(idx + 1).min(items.len() - 1)],
        None if backward => items[items.len() - 1],
        None => items[0],
    };
    document.focus(target);
}
