#![forbid(unsafe_code)]

//! A component that stores its properties and records every change hook
//! call.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use scopebind::{ChangeSet, Component, OutputEmitter, Value};

/// Shared log of component names, appended on every change hook call.
///
/// Lets tests observe the order in which several components were notified.
pub type Journal = Rc<RefCell<Vec<String>>>;

/// Runs inside the change hook, after the changes were recorded.
pub type Reaction = Box<dyn FnMut(&ChangeSet)>;

pub struct RecordingComponent {
    name: String,
    fields: IndexMap<String, Value>,
    outputs: IndexMap<String, OutputEmitter>,
    hook: bool,
    notifications: Vec<ChangeSet>,
    journal: Option<Journal>,
    reaction: Option<Reaction>,
}

impl RecordingComponent {
    /// A component with a change hook.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fields: IndexMap::new(),
            outputs: IndexMap::new(),
            hook: true,
            notifications: Vec::new(),
            journal: None,
            reaction: None,
        }
    }

    /// A component without a change hook.
    #[must_use]
    pub fn without_hook(name: &str) -> Self {
        Self {
            hook: false,
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn with_journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(Rc::clone(journal));
        self
    }

    /// Run `reaction` on every change hook call. It may re-enter the host,
    /// e.g. by applying a scope change.
    #[must_use]
    pub fn with_reaction(mut self, reaction: impl FnMut(&ChangeSet) + 'static) -> Self {
        self.reaction = Some(Box::new(reaction));
        self
    }

    /// Wrap for installation.
    #[must_use]
    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value of a property; `Undefined` when never written.
    #[must_use]
    pub fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or(Value::Undefined)
    }

    /// Whether the property was ever written.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Write a property from inside the component.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_owned(), value.into());
    }

    #[must_use]
    pub fn output(&self, name: &str) -> Option<&OutputEmitter> {
        self.outputs.get(name)
    }

    /// Every change set delivered so far, oldest first.
    #[must_use]
    pub fn notifications(&self) -> &[ChangeSet] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<ChangeSet> {
        std::mem::take(&mut self.notifications)
    }
}

impl Component for RecordingComponent {
    fn get(&self, property: &str) -> Value {
        self.field(property)
    }

    fn set(&mut self, property: &str, value: Value) {
        self.fields.insert(property.to_owned(), value);
    }

    fn set_output(&mut self, property: &str, emitter: OutputEmitter) {
        self.outputs.insert(property.to_owned(), emitter);
    }

    fn has_change_hook(&self) -> bool {
        self.hook
    }

    fn on_changes(&mut self, changes: &ChangeSet) {
        self.notifications.push(changes.clone());
        if let Some(journal) = &self.journal {
            journal.borrow_mut().push(self.name.clone());
        }
        if let Some(reaction) = self.reaction.as_mut() {
            reaction(changes);
        }
    }
}

impl fmt::Debug for RecordingComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingComponent")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("hook", &self.hook)
            .field("notifications", &self.notifications.len())
            .field("reaction", &self.reaction.is_some())
            .finish()
    }
}
