//! Attribute bindings: the property mirrors an interpolated host attribute.

use std::rc::Rc;

use tracing::trace;

use super::{BindingHandle, BindingSite, Installation};
use crate::change::{ChangeRecord, ChangeRecorder, ChangeSet};
use crate::component;
use crate::descriptor::BindingDescriptor;
use crate::error::Result;
use crate::host::{AttrValue, AttributeObserver};
use crate::value::Value;

struct AttributeSync {
    property: String,
    recorder: Rc<ChangeRecorder>,
}

impl AttributeSync {
    fn apply(&self, text: &str) {
        self.recorder.assign(&self.property, &Value::from(text), false);
    }
}

/// Install an attribute binding for `descriptor`.
///
/// Unlike inputs, an absent optional attribute is still observed, and the
/// property's value after installation always lands in `initial_changes`.
pub fn install(
    site: &BindingSite<'_>,
    descriptor: &BindingDescriptor,
    initial_changes: &mut ChangeSet,
) -> Result<Installation> {
    let name = descriptor.external_name.as_str();
    let property = descriptor.property.as_str();

    if !descriptor.optional && site.attributes.get(name).is_none() {
        site.attributes.set(name, AttrValue::Undefined);
        component::borrow_mut(site.component)?.set(property, Value::Undefined);
    }

    let sync = AttributeSync {
        property: property.to_owned(),
        recorder: Rc::clone(site.recorder),
    };
    let observer: AttributeObserver = Box::new(move |value| {
        if let AttrValue::Text(text) = value {
            sync.apply(text);
        }
        Ok(())
    });
    let handle = BindingHandle::new(site.attributes.observe(name, Rc::clone(site.scope), observer));

    match site.attributes.get(name) {
        Some(AttrValue::Text(template)) => {
            let rendered = site
                .parser
                .interpolate(&template)?
                .render(site.scope.as_ref())?;
            component::borrow_mut(site.component)?.set(property, Value::from(rendered));
        }
        Some(AttrValue::Bool(flag)) => {
            component::borrow_mut(site.component)?.set(property, Value::Bool(flag));
        }
        Some(AttrValue::Undefined) | None => {}
    }

    let initial = component::borrow_mut(site.component)?.get(property);
    initial_changes.insert(property.to_owned(), ChangeRecord::first(initial));

    trace!(property, attribute = name, "attribute binding installed");
    Ok(Installation::Installed(handle))
}
