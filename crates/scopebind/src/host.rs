#![forbid(unsafe_code)]

//! Interfaces the host reactive environment provides.
//!
//! The engine never evaluates, schedules or dirty-checks anything itself. It
//! reaches the host through these traits:
//!
//! - [`Scope`]: property bag with watches and a post-cycle queue.
//! - [`Expression`] / [`Interpolation`]: compiled host expressions.
//! - [`Parser`]: compiles expression and template text.
//! - [`Attributes`]: the element's attribute map and its observers.
//!
//! All callbacks return [`Result`]; errors travel back to the host's own
//! cycle-error handling untouched.

use std::rc::Rc;

use crate::error::Result;
use crate::value::{Value, ValueMap};

/// Extra names visible to an expression on top of its scope.
pub type Locals = ValueMap;

/// Removes a watch or observer. Called at most once.
pub type Disposer = Box<dyn FnOnce()>;

/// Produces the watched value; re-run by the host every cycle.
pub type WatchGetter = Box<dyn FnMut(&dyn Scope) -> Result<Value>>;

/// Called with `(new, old)` when the watched value changed.
///
/// On the first invocation `old` is the same value as `new`.
pub type WatchListener = Box<dyn FnMut(&Value, &Value) -> Result<()>>;

/// Runs once after the current cycle completes.
pub type PostCycleCallback = Box<dyn FnOnce() -> Result<()>>;

/// Receives observed attribute values.
pub type AttributeObserver = Box<dyn FnMut(&AttrValue) -> Result<()>>;

/// A scope of the host environment.
pub trait Scope {
    /// Read a property, following whatever inheritance the host implements.
    fn get(&self, name: &str) -> Value;

    /// Write a property on this scope.
    fn set(&self, name: &str, value: Value);

    /// The enclosing scope, if any.
    fn parent(&self) -> Option<Rc<dyn Scope>>;

    /// Register a watch.
    ///
    /// The host calls `getter` every cycle and, when its result differs from
    /// the previous one, calls `listener`. With `literal` set the comparison
    /// is structural ([`Value::deep_equals`]), otherwise
    /// [`Value::is_same_value`]. The listener runs once on the first cycle
    /// after registration.
    fn watch(&self, getter: WatchGetter, listener: Option<WatchListener>, literal: bool)
    -> Disposer;

    /// Schedule `callback` to run once after the current cycle.
    fn post_cycle(&self, callback: PostCycleCallback);
}

/// A compiled host expression.
pub trait Expression {
    /// Source text the expression was compiled from.
    fn source(&self) -> &str;

    /// Whether the expression is a literal (constant, array or object
    /// literal). Literal expressions are compared structurally.
    fn is_literal(&self) -> bool;

    /// Whether [`Expression::assign`] can write through this expression.
    fn is_assignable(&self) -> bool;

    fn evaluate(&self, scope: &dyn Scope, locals: Option<&Locals>) -> Result<Value>;

    /// Write `value` to the location this expression denotes.
    fn assign(&self, scope: &dyn Scope, value: Value) -> Result<()>;
}

/// A compiled interpolation template.
pub trait Interpolation {
    fn render(&self, scope: &dyn Scope) -> Result<String>;
}

/// Compiles host expressions and templates.
pub trait Parser {
    fn parse(&self, text: &str) -> Result<Rc<dyn Expression>>;

    fn interpolate(&self, template: &str) -> Result<Rc<dyn Interpolation>>;
}

/// Raw value held by a host attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Present but without a value.
    Undefined,
    /// Attribute text, possibly containing interpolation markup.
    Text(String),
    /// A boolean attribute the host has already coerced.
    Bool(bool),
}

impl AttrValue {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether the value is falsy (undefined, empty text or `false`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Undefined => true,
            Self::Text(text) => text.is_empty(),
            Self::Bool(b) => !b,
        }
    }
}

/// The attribute map of the element a component is attached to.
pub trait Attributes {
    /// `None` when the attribute is absent, as opposed to present-but-undefined.
    fn get(&self, name: &str) -> Option<AttrValue>;

    fn set(&self, name: &str, value: AttrValue);

    /// Observe the interpolated value of `name` against `scope`.
    ///
    /// The observer fires once on the first cycle after registration and
    /// then whenever the interpolated value changes.
    fn observe(&self, name: &str, scope: Rc<dyn Scope>, observer: AttributeObserver) -> Disposer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_value_emptiness() {
        assert!(AttrValue::Undefined.is_empty());
        assert!(AttrValue::Text(String::new()).is_empty());
        assert!(AttrValue::Bool(false).is_empty());
        assert!(!AttrValue::Text("x".into()).is_empty());
        assert!(!AttrValue::Bool(true).is_empty());
    }
}
