//! Output bindings: a callable bridge from the component to a host
//! expression.
//!
//! Nothing is watched. The component receives an [`OutputEmitter`]; calling
//! [`OutputEmitter::emit`] evaluates the bound expression with the given
//! locals and returns the result.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::{BindingHandle, BindingSite, Installation, attr_text};
use crate::component;
use crate::descriptor::BindingDescriptor;
use crate::error::Result;
use crate::host::{Expression, Locals, Scope};
use crate::value::Value;

/// Invokes a host expression on behalf of a component.
///
/// A no-op emitter (required output with no attribute) always returns
/// [`Value::Undefined`], as does any emitter once its installation has been
/// torn down.
#[derive(Clone)]
pub struct OutputEmitter {
    expression: Option<Rc<dyn Expression>>,
    scope: Rc<dyn Scope>,
    alive: Rc<Cell<bool>>,
}

impl OutputEmitter {
    #[must_use]
    pub fn new(
        expression: Option<Rc<dyn Expression>>,
        scope: Rc<dyn Scope>,
        alive: Rc<Cell<bool>>,
    ) -> Self {
        Self {
            expression,
            scope,
            alive,
        }
    }

    /// Evaluate the bound expression with `locals`.
    pub fn emit(&self, locals: &Locals) -> Result<Value> {
        match &self.expression {
            Some(expression) if self.alive.get() => {
                expression.evaluate(self.scope.as_ref(), Some(locals))
            }
            _ => Ok(Value::Undefined),
        }
    }

    /// Evaluate with no locals.
    pub fn emit_empty(&self) -> Result<Value> {
        self.emit(&Locals::new())
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.expression.is_none()
    }
}

impl fmt::Debug for OutputEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputEmitter")
            .field("expression", &self.expression.as_ref().map(|e| e.source()))
            .field("alive", &self.alive.get())
            .finish()
    }
}

/// Install an output binding for `descriptor`.
pub fn install(site: &BindingSite<'_>, descriptor: &BindingDescriptor) -> Result<Installation> {
    let expression = match site.attributes.get(&descriptor.external_name) {
        Some(value) => Some(site.parser.parse(&attr_text(&value))?),
        None if descriptor.optional => {
            trace!(property = %descriptor.property, "optional output absent, skipped");
            return Ok(Installation::Skipped);
        }
        None => None,
    };

    let emitter = OutputEmitter::new(
        expression,
        Rc::clone(site.scope),
        site.recorder.liveness(),
    );
    trace!(property = %descriptor.property, noop = emitter.is_noop(), "output installed");
    component::borrow_mut(site.component)?.set_output(&descriptor.property, emitter);
    Ok(Installation::Installed(BindingHandle::inert()))
}
