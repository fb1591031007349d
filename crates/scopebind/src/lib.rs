#![forbid(unsafe_code)]

//! Binding installation and per-cycle change batching for scope-based,
//! dirty-checking hosts.
//!
//! A component declares inputs, outputs and attribute bindings. scopebind
//! wires each declaration to the host and keeps the component in sync:
//!
//! - [`descriptor`]: normalizes raw declarations into descriptors.
//! - [`binding`]: one installer per binding kind, plus lifecycle handles.
//! - [`change`]: records distinct value transitions per component.
//! - [`cycle`]: coalesces them into one change-hook call per cycle.
//! - [`install`]: orchestrates a full installation.
//! - [`host`]: the traits a host environment implements.
//!
//! # Architecture
//!
//! Everything is single-threaded and callback driven. Shared state lives in
//! `Rc<RefCell<..>>`; the host calls back into bindings during its cycle and
//! runs the aggregated change flush after the cycle through its post-cycle
//! queue.
//!
//! # Invariants
//!
//! 1. A component's change hook runs at most once per cycle, carrying every
//!    property that changed in that cycle.
//! 2. A change record holds the cycle-start value and the latest value;
//!    intermediate values never surface.
//! 3. Components are notified in the order their first change was recorded.
//! 4. For two-way bindings the parent wins concurrent changes.
//! 5. Teardown is idempotent and no hook runs for a torn-down component.

pub mod binding;
pub mod change;
pub mod component;
pub mod config;
pub mod cycle;
pub mod descriptor;
pub mod error;
pub mod host;
pub mod install;
pub mod value;

pub use binding::output::OutputEmitter;
pub use binding::{BindingHandle, BindingKind, Installation, Teardown};
pub use change::{ChangeRecord, ChangeRecorder, ChangeSet};
pub use component::{BindingMetadata, ChangeDetection, Component, ComponentKind, ComponentRef};
pub use config::EngineConfig;
pub use cycle::{CycleContext, PendingFlush};
pub use descriptor::{BindingDeclarations, BindingDescriptor, BindingMode, RawBinding};
pub use error::{BindingError, Result};
pub use host::{AttrValue, Attributes, Expression, Interpolation, Locals, Parser, Scope};
pub use install::{HostContext, InstalledBindings, install_bindings};
pub use value::{Value, ValueMap};
