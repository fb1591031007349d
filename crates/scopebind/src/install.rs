#![forbid(unsafe_code)]

//! Installation orchestrator.
//!
//! [`install_bindings`] normalizes a component's declarations, runs the right
//! installer for each one and hands back the initial changes together with a
//! [`Teardown`] owning every installed binding.
//!
//! # Usage
//!
//! ```ignore
//! let cycle = CycleContext::new();
//! let host = HostContext::new(scope, attributes, parser).isolated();
//! let installed = install_bindings(&component, &metadata, &host, &cycle)?;
//!
//! component.borrow_mut().on_changes(&installed.initial_changes);
//! // ... host cycles run, change hooks fire once per cycle ...
//! drop(installed); // or installed.teardown.teardown()
//! ```
//!
//! # Failure Modes
//!
//! Any installer error aborts installation. Bindings installed before the
//! failure are disposed when the partially built [`Teardown`] is dropped.

use std::rc::Rc;

use tracing::debug_span;

use crate::binding::{self, BindingKind, BindingSite, Teardown};
use crate::change::{ChangeRecorder, ChangeSet};
use crate::component::{BindingMetadata, ComponentRef};
use crate::cycle::CycleContext;
use crate::descriptor::BindingMode;
use crate::error::Result;
use crate::host::{Attributes, Parser, Scope};

/// Host services for one component instance.
#[derive(Clone)]
pub struct HostContext {
    /// The component's own scope.
    pub scope: Rc<dyn Scope>,
    pub attributes: Rc<dyn Attributes>,
    pub parser: Rc<dyn Parser>,
    /// Whether `scope` is an isolated scope. Isolated components evaluate
    /// bindings against the parent scope and may use two-way bindings.
    pub has_isolate_scope: bool,
}

impl HostContext {
    #[must_use]
    pub fn new(scope: Rc<dyn Scope>, attributes: Rc<dyn Attributes>, parser: Rc<dyn Parser>) -> Self {
        Self {
            scope,
            attributes,
            parser,
            has_isolate_scope: false,
        }
    }

    /// Mark the scope as isolated.
    #[must_use]
    pub fn isolated(mut self) -> Self {
        self.has_isolate_scope = true;
        self
    }

    /// Scope binding expressions are evaluated against.
    #[must_use]
    pub fn binding_scope(&self) -> Rc<dyn Scope> {
        if self.has_isolate_scope {
            self.scope.parent().unwrap_or_else(|| Rc::clone(&self.scope))
        } else {
            Rc::clone(&self.scope)
        }
    }
}

/// Result of a successful installation.
#[must_use = "dropping InstalledBindings removes all bindings"]
#[derive(Debug)]
pub struct InstalledBindings {
    /// `(uninitialized -> value)` for every one-way input and attribute.
    pub initial_changes: ChangeSet,
    pub teardown: Teardown,
}

impl InstalledBindings {
    /// Bindings backed by a host watch.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.teardown.watcher_count()
    }

    /// Attribute observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.teardown.observer_count()
    }
}

/// Install every declared binding of `component`.
pub fn install_bindings(
    component: &ComponentRef,
    metadata: &BindingMetadata,
    host: &HostContext,
    cycle: &CycleContext,
) -> Result<InstalledBindings> {
    let bindings = metadata
        .declarations
        .normalize(cycle.config().default_input_mode);
    let _span = debug_span!(
        "install_bindings",
        component = %metadata.name,
        inputs = bindings.inputs.len(),
        outputs = bindings.outputs.len(),
        attrs = bindings.attrs.len(),
        isolate = host.has_isolate_scope,
    )
    .entered();

    let scope = host.binding_scope();
    let immutable = metadata.has_immutable_inputs();
    let mut teardown = Teardown::new();
    let recorder = Rc::new(ChangeRecorder::new(
        Rc::clone(component),
        Rc::clone(&scope),
        cycle.clone(),
        teardown.liveness(),
    )?);
    let site = BindingSite {
        component,
        name: &metadata.name,
        scope: &scope,
        attributes: host.attributes.as_ref(),
        parser: host.parser.as_ref(),
        recorder: &recorder,
    };
    let mut initial_changes = ChangeSet::new();

    for descriptor in &bindings.inputs {
        if host.has_isolate_scope && descriptor.mode == BindingMode::TwoWay {
            let installation = binding::two_way::install(&site, descriptor)?;
            teardown.hold(BindingKind::TwoWay, installation);
        } else {
            let installation =
                binding::one_way::install(&site, descriptor, immutable, &mut initial_changes)?;
            teardown.hold(BindingKind::OneWay, installation);
        }
    }

    for descriptor in &bindings.outputs {
        let installation = binding::output::install(&site, descriptor)?;
        teardown.hold(BindingKind::Output, installation);
    }

    for descriptor in &bindings.attrs {
        let installation = binding::attribute::install(&site, descriptor, &mut initial_changes)?;
        teardown.hold(BindingKind::Attribute, installation);
    }

    tracing::debug!(
        bindings = teardown.binding_count(),
        initial_changes = initial_changes.len(),
        "bindings installed"
    );
    Ok(InstalledBindings {
        initial_changes,
        teardown,
    })
}
