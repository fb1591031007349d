//! The component side of a binding installation.
//!
//! Bindings never poke at arbitrary fields. They go through the
//! [`Component`] capability: a closed set of bound properties read with
//! [`Component::get`], written with [`Component::set`], plus an optional
//! change hook.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crate::binding::output::OutputEmitter;
use crate::change::ChangeSet;
use crate::descriptor::BindingDeclarations;
use crate::error::{BindingError, Result};
use crate::value::Value;

/// A component instance whose properties are driven by bindings.
pub trait Component {
    /// Current value of a bound property. Unknown properties read as
    /// [`Value::Undefined`].
    fn get(&self, property: &str) -> Value;

    fn set(&mut self, property: &str, value: Value);

    /// Install the callable bridge for an output property.
    fn set_output(&mut self, property: &str, emitter: OutputEmitter);

    /// Whether the component wants aggregated change notifications.
    ///
    /// Components returning `false` pay no bookkeeping cost for changes.
    fn has_change_hook(&self) -> bool {
        false
    }

    /// Receive every change of one cycle at once.
    fn on_changes(&mut self, _changes: &ChangeSet) {}
}

/// Shared handle to a component instance.
pub type ComponentRef = Rc<RefCell<dyn Component>>;

pub(crate) fn borrow_mut(component: &ComponentRef) -> Result<RefMut<'_, dyn Component + 'static>> {
    component
        .try_borrow_mut()
        .map_err(|_| BindingError::ComponentBusy)
}

/// Whether the bound type is a full component or a plain directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentKind {
    #[default]
    Component,
    Directive,
}

/// Change detection policy of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeDetection {
    #[default]
    Default,
    /// Inputs are treated as immutable: the component only ever receives
    /// deep copies of host values.
    OnPush,
}

/// Everything the orchestrator needs to know about the bound type.
#[derive(Debug, Clone, Default)]
pub struct BindingMetadata {
    /// Name used in diagnostics.
    pub name: String,
    pub kind: ComponentKind,
    pub change_detection: ChangeDetection,
    pub declarations: BindingDeclarations,
}

impl BindingMetadata {
    #[must_use]
    pub fn component(name: impl Into<String>, declarations: BindingDeclarations) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Component,
            change_detection: ChangeDetection::Default,
            declarations,
        }
    }

    #[must_use]
    pub fn directive(name: impl Into<String>, declarations: BindingDeclarations) -> Self {
        Self {
            kind: ComponentKind::Directive,
            ..Self::component(name, declarations)
        }
    }

    #[must_use]
    pub fn with_change_detection(mut self, change_detection: ChangeDetection) -> Self {
        self.change_detection = change_detection;
        self
    }

    /// Inputs are deep-copied only for `OnPush` components; directives
    /// never get immutable inputs.
    #[must_use]
    pub fn has_immutable_inputs(&self) -> bool {
        self.kind == ComponentKind::Component && self.change_detection == ChangeDetection::OnPush
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutability_requires_on_push_component() {
        let decls = BindingDeclarations::new();
        let plain = BindingMetadata::component("a", decls.clone());
        assert!(!plain.has_immutable_inputs());

        let on_push = plain.clone().with_change_detection(ChangeDetection::OnPush);
        assert!(on_push.has_immutable_inputs());

        let directive =
            BindingMetadata::directive("d", decls).with_change_detection(ChangeDetection::OnPush);
        assert!(!directive.has_immutable_inputs());
    }
}
