//! One-way input bindings: the host expression is the source of truth.

use std::rc::Rc;

use tracing::trace;

use super::{BindingHandle, BindingSite, Installation, input_expression};
use crate::change::{ChangeRecord, ChangeRecorder, ChangeSet};
use crate::component;
use crate::descriptor::BindingDescriptor;
use crate::error::Result;
use crate::host::{WatchGetter, WatchListener};
use crate::value::Value;

/// Per-binding state driven by the host watch.
struct OneWaySync {
    property: String,
    recorder: Rc<ChangeRecorder>,
    immutable: bool,
}

impl OneWaySync {
    fn apply(&self, value: &Value) {
        self.recorder.assign(&self.property, value, self.immutable);
    }
}

/// Install a one-way binding for `descriptor`.
///
/// The property is assigned synchronously and its initial value is added to
/// `initial_changes`. With `immutable` set, values delivered by the watch are
/// deep-copied before assignment.
pub fn install(
    site: &BindingSite<'_>,
    descriptor: &BindingDescriptor,
    immutable: bool,
    initial_changes: &mut ChangeSet,
) -> Result<Installation> {
    let Some(text) = input_expression(site.attributes, &descriptor.external_name, descriptor.optional)
    else {
        trace!(property = %descriptor.property, "optional one-way input absent, skipped");
        return Ok(Installation::Skipped);
    };

    let expression = site.parser.parse(&text)?;
    let initial = expression.evaluate(site.scope.as_ref(), None)?;
    component::borrow_mut(site.component)?.set(&descriptor.property, initial.clone());
    initial_changes.insert(descriptor.property.clone(), ChangeRecord::first(initial));

    let sync = OneWaySync {
        property: descriptor.property.clone(),
        recorder: Rc::clone(site.recorder),
        immutable,
    };
    let literal = expression.is_literal();
    let getter: WatchGetter = Box::new(move |scope| expression.evaluate(scope, None));
    let listener: WatchListener = Box::new(move |value, _old| {
        sync.apply(value);
        Ok(())
    });
    let disposer = site.scope.watch(getter, Some(listener), literal);

    trace!(property = %descriptor.property, expression = %text, literal, "one-way input installed");
    Ok(Installation::Installed(BindingHandle::new(disposer)))
}
