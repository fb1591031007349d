#![forbid(unsafe_code)]

//! Element attribute map with interpolating observers.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use scopebind::host::{AttributeObserver, Disposer};
use scopebind::{AttrValue, Attributes, Interpolation, Parser, Scope, Value};

use crate::parser::HarnessParser;

/// Attributes of one element.
///
/// Observers are scope watches over the interpolated attribute text, so they
/// fire on the first digest after registration and whenever the rendered
/// value changes. Boolean attributes are delivered as [`AttrValue::Bool`].
#[derive(Debug, Default)]
pub struct HarnessAttributes {
    values: Rc<RefCell<IndexMap<String, AttrValue>>>,
    parser: HarnessParser,
}

impl HarnessAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, AttrValue)>,
        K: Into<String>,
    {
        let attrs = Self::new();
        attrs
            .values
            .borrow_mut()
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v)));
        attrs
    }

    /// Builder: add a text attribute.
    #[must_use]
    pub fn with_text(self, name: &str, text: &str) -> Self {
        self.set(name, AttrValue::Text(text.to_owned()));
        self
    }

    /// Builder: add a boolean attribute.
    #[must_use]
    pub fn with_bool(self, name: &str, flag: bool) -> Self {
        self.set(name, AttrValue::Bool(flag));
        self
    }

    /// Remove an attribute.
    pub fn remove(&self, name: &str) -> Option<AttrValue> {
        self.values.borrow_mut().shift_remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl Attributes for HarnessAttributes {
    fn get(&self, name: &str) -> Option<AttrValue> {
        self.values.borrow().get(name).cloned()
    }

    fn set(&self, name: &str, value: AttrValue) {
        self.values.borrow_mut().insert(name.to_owned(), value);
    }

    fn observe(&self, name: &str, scope: Rc<dyn Scope>, mut observer: AttributeObserver) -> Disposer {
        let values = Rc::clone(&self.values);
        let parser = self.parser;
        let name = name.to_owned();

        scope.watch(
            Box::new(move |scope| {
                let current = values.borrow().get(&name).cloned();
                match current {
                    Some(AttrValue::Text(template)) => {
                        let rendered = parser.interpolate(&template)?.render(scope)?;
                        Ok(Value::from(rendered))
                    }
                    Some(AttrValue::Bool(flag)) => Ok(Value::Bool(flag)),
                    Some(AttrValue::Undefined) | None => Ok(Value::Undefined),
                }
            }),
            Some(Box::new(move |new, _| {
                let observed = match new {
                    Value::Text(text) => AttrValue::Text(text.to_string()),
                    Value::Bool(flag) => AttrValue::Bool(*flag),
                    _ => AttrValue::Undefined,
                };
                observer(&observed)
            })),
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::HarnessScope;

    #[test]
    fn observer_sees_interpolated_values() {
        let scope = HarnessScope::new_root();
        scope.set("name", Value::from("ada"));
        let attrs = HarnessAttributes::new().with_text("greeting", "hi {{name}}");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _dispose = attrs.observe(
            "greeting",
            scope.shared(),
            Box::new(move |value| {
                sink.borrow_mut().push(value.clone());
                Ok(())
            }),
        );

        scope.digest();
        scope.apply(|s| s.set("name", Value::from("bob")));
        scope.digest();
        assert_eq!(
            *seen.borrow(),
            vec![
                AttrValue::Text("hi ada".into()),
                AttrValue::Text("hi bob".into())
            ]
        );
    }

    #[test]
    fn absent_attribute_reads_none() {
        let attrs = HarnessAttributes::from_pairs([("x", AttrValue::Undefined)]);
        assert_eq!(attrs.get("x"), Some(AttrValue::Undefined));
        assert_eq!(attrs.get("y"), None);
        assert_eq!(attrs.remove("x"), Some(AttrValue::Undefined));
        assert!(attrs.is_empty());
    }
}
