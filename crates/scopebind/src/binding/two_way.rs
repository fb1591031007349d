//! Two-way input bindings.
//!
//! The host re-runs [`TwoWaySync::reconcile`] every cycle. Three cases:
//!
//! 1. parent and component agree: nothing to do;
//! 2. the parent moved since the last cycle: the parent wins and overwrites
//!    the component, even if the component changed too;
//! 3. only the component moved: its value is written back to the parent
//!    expression, or, for a non-assignable expression, local state is reset
//!    to the parent value before [`BindingError::NonAssignable`] is raised,
//!    so the error fires once instead of every cycle.
//!
//! Literal expressions compare structurally, everything else by
//! [`Value::is_same_value`].
//!
//! While the component is borrowed (its change hook re-entered the host
//! cycle) only the parent side is checked; a moved parent is written once the
//! hook returns.

use std::rc::Rc;

use tracing::{trace, warn};

use super::{BindingHandle, BindingSite, Installation, input_expression};
use crate::change::ChangeRecorder;
use crate::component::{self, ComponentRef};
use crate::descriptor::BindingDescriptor;
use crate::error::{BindingError, Result};
use crate::host::{Expression, Scope, WatchGetter};
use crate::value::Value;

struct TwoWaySync {
    property: String,
    attribute: String,
    component_name: String,
    component: ComponentRef,
    recorder: Rc<ChangeRecorder>,
    expression: Rc<dyn Expression>,
    last_parent: Value,
    compare: fn(&Value, &Value) -> bool,
}

impl TwoWaySync {
    fn reconcile(&mut self, scope: &dyn Scope) -> Result<Value> {
        let mut parent = self.expression.evaluate(scope, None)?;
        let Ok(current) = self.component.try_borrow().map(|c| c.get(&self.property)) else {
            if !(self.compare)(&parent, &self.last_parent) {
                self.recorder.overwrite(&self.property, parent.clone());
            }
            self.last_parent = parent.clone();
            return Ok(parent);
        };

        if !(self.compare)(&parent, &current) {
            if !(self.compare)(&parent, &self.last_parent) {
                self.recorder.overwrite(&self.property, parent.clone());
            } else if self.expression.is_assignable() {
                parent = current;
                self.expression.assign(scope, parent.clone())?;
            } else {
                let reset = self.expression.evaluate(scope, None)?;
                self.recorder.overwrite(&self.property, reset.clone());
                self.last_parent = reset;
                warn!(
                    expression = self.expression.source(),
                    attribute = %self.attribute,
                    component = %self.component_name,
                    "two-way binding target is non-assignable"
                );
                return Err(BindingError::NonAssignable {
                    expression: self.expression.source().to_owned(),
                    attribute: self.attribute.clone(),
                    component: self.component_name.clone(),
                });
            }
        }

        self.last_parent = parent.clone();
        Ok(parent)
    }
}

/// Install a two-way binding for `descriptor`.
///
/// The property takes the parent's current value immediately; no initial
/// change record is produced.
pub fn install(site: &BindingSite<'_>, descriptor: &BindingDescriptor) -> Result<Installation> {
    let Some(text) = input_expression(site.attributes, &descriptor.external_name, descriptor.optional)
    else {
        trace!(property = %descriptor.property, "optional two-way input absent, skipped");
        return Ok(Installation::Skipped);
    };

    let expression = site.parser.parse(&text)?;
    let literal = expression.is_literal();
    let compare: fn(&Value, &Value) -> bool = if literal {
        Value::deep_equals
    } else {
        Value::is_same_value
    };

    let initial = expression.evaluate(site.scope.as_ref(), None)?;
    component::borrow_mut(site.component)?.set(&descriptor.property, initial.clone());

    let mut sync = TwoWaySync {
        property: descriptor.property.clone(),
        attribute: descriptor.external_name.clone(),
        component_name: site.name.to_owned(),
        component: Rc::clone(site.component),
        recorder: Rc::clone(site.recorder),
        expression,
        last_parent: initial,
        compare,
    };
    let getter: WatchGetter = Box::new(move |scope| sync.reconcile(scope));
    let disposer = site.scope.watch(getter, None, literal);

    trace!(property = %descriptor.property, expression = %text, literal, "two-way input installed");
    Ok(Installation::Installed(BindingHandle::new(disposer)))
}
