#![forbid(unsafe_code)]

//! One-stop fixture: a root scope, a parser and a cycle context.

use std::cell::RefCell;
use std::rc::Rc;

use scopebind::{
    BindingMetadata, ComponentRef, CycleContext, EngineConfig, HostContext, InstalledBindings,
    Result, install_bindings,
};

use crate::attributes::HarnessAttributes;
use crate::component::RecordingComponent;
use crate::parser::HarnessParser;
use crate::scope::{DigestReport, HarnessScope};

/// A mounted component: its scope, attributes and installed bindings.
#[derive(Debug)]
pub struct Mounted {
    pub component: Rc<RefCell<RecordingComponent>>,
    /// The component's own scope.
    pub scope: HarnessScope,
    pub attributes: Rc<HarnessAttributes>,
    pub bindings: InstalledBindings,
}

impl Mounted {
    /// Tear down the bindings.
    pub fn teardown(&mut self) {
        self.bindings.teardown.teardown();
    }
}

/// A host environment for mounting components.
#[derive(Debug, Clone, Default)]
pub struct HarnessHost {
    pub root: HarnessScope,
    pub parser: HarnessParser,
    pub cycle: CycleContext,
}

impl HarnessHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            cycle: CycleContext::with_config(config),
            ..Self::default()
        }
    }

    /// Mount `component` below the root scope.
    ///
    /// With `isolate` the component gets an isolated child scope and
    /// bindings evaluate against the root.
    pub fn mount(
        &self,
        component: RecordingComponent,
        metadata: &BindingMetadata,
        attributes: HarnessAttributes,
        isolate: bool,
    ) -> Result<Mounted> {
        let scope = if isolate {
            self.root.new_isolate_child()
        } else {
            self.root.new_child()
        };
        let component = component.shared();
        let attributes = Rc::new(attributes);

        let mut context = HostContext::new(scope.shared(), attributes.clone(), Rc::new(self.parser));
        if isolate {
            context = context.isolated();
        }
        let erased: ComponentRef = component.clone();
        let bindings = install_bindings(&erased, metadata, &context, &self.cycle)?;

        Ok(Mounted {
            component,
            scope,
            attributes,
            bindings,
        })
    }

    /// Run `f` against the root scope, then digest.
    pub fn apply(&self, f: impl FnOnce(&HarnessScope)) -> DigestReport {
        self.root.apply(f)
    }

    pub fn digest(&self) -> DigestReport {
        self.root.digest()
    }
}
