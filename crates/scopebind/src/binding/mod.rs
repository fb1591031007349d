#![forbid(unsafe_code)]

//! Binding installers and their lifecycle handles.
//!
//! Each installer wires one component property to the host and reports an
//! [`Installation`]: either a [`BindingHandle`] owning the host-side watch or
//! observer, or `Skipped` when an optional attribute is absent.
//!
//! | Installer | Host mechanism | Records changes | Initial snapshot |
//! |-----------|----------------|-----------------|------------------|
//! | [`one_way`] | watch | yes | yes |
//! | [`two_way`] | stateful watch | no | no |
//! | [`output`] | none | no | no |
//! | [`attribute`] | attribute observer | yes | yes |
//!
//! # Invariants
//!
//! 1. Disposing a handle twice is a no-op.
//! 2. Dropping a handle disposes it.
//! 3. [`Teardown::teardown`] disposes every held handle exactly once, in
//!    registration order, and marks the installation dead so queued change
//!    deliveries are dropped.

pub mod attribute;
pub mod one_way;
pub mod output;
pub mod two_way;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::change::ChangeRecorder;
use crate::component::ComponentRef;
use crate::host::{AttrValue, Attributes, Disposer, Parser, Scope};

// ---------------------------------------------------------------------------
// BindingHandle
// ---------------------------------------------------------------------------

/// Owns the host-side registration of one binding.
#[must_use = "dropping a BindingHandle removes the binding"]
pub struct BindingHandle {
    disposer: Option<Disposer>,
}

impl BindingHandle {
    pub fn new(disposer: Disposer) -> Self {
        Self {
            disposer: Some(disposer),
        }
    }

    /// A handle with nothing to remove (output bindings).
    pub fn inert() -> Self {
        Self { disposer: None }
    }

    /// Whether a host registration is still held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.disposer.is_some()
    }

    /// Remove the registration. Later calls do nothing.
    pub fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for BindingHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for BindingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Outcome of one installer.
#[derive(Debug)]
pub enum Installation {
    Installed(BindingHandle),
    /// Optional binding whose attribute is absent; nothing was installed.
    Skipped,
}

impl Installation {
    #[must_use]
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }

    #[must_use]
    pub fn into_handle(self) -> Option<BindingHandle> {
        match self {
            Self::Installed(handle) => Some(handle),
            Self::Skipped => None,
        }
    }
}

/// Which installer produced a held handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    OneWay,
    TwoWay,
    Output,
    Attribute,
}

impl BindingKind {
    /// Kinds backed by a host watch.
    #[must_use]
    pub fn is_watcher(self) -> bool {
        matches!(self, Self::OneWay | Self::TwoWay)
    }
}

// ---------------------------------------------------------------------------
// Teardown
// ---------------------------------------------------------------------------

/// Owns every binding of one component instance.
///
/// Call [`teardown`](Self::teardown) when the component is destroyed;
/// dropping the `Teardown` does the same.
#[must_use = "dropping a Teardown removes all bindings"]
pub struct Teardown {
    handles: Vec<(BindingKind, BindingHandle)>,
    alive: Rc<Cell<bool>>,
}

impl Teardown {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            alive: Rc::new(Cell::new(true)),
        }
    }

    /// Liveness flag shared with change deliveries and output emitters.
    #[must_use]
    pub fn liveness(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.alive)
    }

    /// Keep an installer's handle. `Skipped` installations are ignored.
    pub fn hold(&mut self, kind: BindingKind, installation: Installation) {
        if let Some(handle) = installation.into_handle() {
            self.handles.push((kind, handle));
        }
    }

    /// Number of held bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.handles.len()
    }

    /// Number of held bindings of `kind`.
    #[must_use]
    pub fn count_of(&self, kind: BindingKind) -> usize {
        self.handles.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Held bindings backed by a host watch.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.handles.iter().filter(|(k, _)| k.is_watcher()).count()
    }

    /// Held attribute observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.count_of(BindingKind::Attribute)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.alive.get()
    }

    /// Dispose every binding. Safe to call any number of times.
    pub fn teardown(&mut self) {
        self.alive.set(false);
        for (_, handle) in &mut self.handles {
            handle.dispose();
        }
        self.handles.clear();
    }
}

impl Default for Teardown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Teardown")
            .field("binding_count", &self.handles.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BindingSite
// ---------------------------------------------------------------------------

/// What every installer needs to wire one property.
pub struct BindingSite<'a> {
    pub component: &'a ComponentRef,
    /// Component name for diagnostics.
    pub name: &'a str,
    /// Scope expressions are evaluated against (the parent scope for
    /// isolated components).
    pub scope: &'a Rc<dyn Scope>,
    pub attributes: &'a dyn Attributes,
    pub parser: &'a dyn Parser,
    pub recorder: &'a Rc<ChangeRecorder>,
}

/// Expression text for an input binding, or `None` when it must be skipped.
///
/// A required binding with an absent attribute gets an `Undefined`
/// attribute and an empty expression.
pub(crate) fn input_expression(
    attributes: &dyn Attributes,
    external_name: &str,
    optional: bool,
) -> Option<String> {
    match attributes.get(external_name) {
        None if optional => None,
        None => {
            attributes.set(external_name, AttrValue::Undefined);
            Some(String::new())
        }
        Some(value) if optional && value.is_empty() => None,
        Some(value) => Some(attr_text(&value)),
    }
}

pub(crate) fn attr_text(value: &AttrValue) -> String {
    match value {
        AttrValue::Undefined => String::new(),
        AttrValue::Text(text) => text.clone(),
        AttrValue::Bool(b) => b.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn counting_handle(count: &Rc<Cell<u32>>) -> BindingHandle {
        let count = Rc::clone(count);
        BindingHandle::new(Box::new(move || count.set(count.get() + 1)))
    }

    #[test]
    fn handle_disposes_once() {
        let count = Rc::new(Cell::new(0));
        let mut handle = counting_handle(&count);
        assert!(handle.is_active());
        handle.dispose();
        handle.dispose();
        assert!(!handle.is_active());
        drop(handle);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn handle_drop_disposes() {
        let count = Rc::new(Cell::new(0));
        {
            let _handle = counting_handle(&count);
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn inert_handle_is_noop() {
        let mut handle = BindingHandle::inert();
        assert!(!handle.is_active());
        handle.dispose();
    }

    #[test]
    fn teardown_ignores_skipped_and_is_idempotent() {
        let count = Rc::new(Cell::new(0));
        let mut teardown = Teardown::new();
        teardown.hold(BindingKind::OneWay, Installation::Installed(counting_handle(&count)));
        teardown.hold(BindingKind::TwoWay, Installation::Skipped);
        teardown.hold(BindingKind::Attribute, Installation::Installed(counting_handle(&count)));
        teardown.hold(BindingKind::Output, Installation::Installed(BindingHandle::inert()));
        assert_eq!(teardown.binding_count(), 3);
        assert_eq!(teardown.watcher_count(), 1);
        assert_eq!(teardown.observer_count(), 1);

        let alive = teardown.liveness();
        teardown.teardown();
        teardown.teardown();
        assert_eq!(count.get(), 2);
        assert!(teardown.is_empty());
        assert!(teardown.is_disposed());
        assert!(!alive.get());
    }

    #[test]
    fn teardown_disposes_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut teardown = Teardown::new();
        for i in 0..3 {
            let order = Rc::clone(&order);
            let handle = BindingHandle::new(Box::new(move || order.borrow_mut().push(i)));
            teardown.hold(BindingKind::OneWay, Installation::Installed(handle));
        }
        drop(teardown);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn teardown_debug_format() {
        let mut teardown = Teardown::new();
        teardown.hold(BindingKind::Output, Installation::Installed(BindingHandle::inert()));
        let debug = format!("{teardown:?}");
        assert!(debug.contains("binding_count: 1"));
        assert!(debug.contains("disposed: false"));
    }
}
