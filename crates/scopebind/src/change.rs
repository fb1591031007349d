#![forbid(unsafe_code)]

//! Change records and the per-component change recorder.
//!
//! The [`ChangeRecorder`] turns individual value transitions into one
//! [`ChangeSet`] per component per cycle:
//!
//! - a transition is recorded only when the values are not
//!   [identical](Value::is_identical) and the component has a change hook;
//! - the first recorded change of a cycle enqueues the component on the
//!   [`CycleContext`];
//! - repeated changes of one property keep the cycle-start previous value and
//!   overwrite the current value, so intermediate values never surface;
//! - with net-zero suppression enabled, a property whose value returned to
//!   its cycle-start value is dropped from the pending set.
//!
//! Every binding writes the component through the recorder. While the
//! component is borrowed, typically because its own change hook is running
//! and re-entered the host cycle, writes are held back and applied as soon as
//! the hook returns. Changes they produce are delivered in another round of
//! the same flush entry. More than `flush_ttl` rounds abandon the entry with
//! [`BindingError::InfiniteChangeLoop`].
//!
//! # Example
//!
//! ```
//! use scopebind::{ChangeRecord, Value};
//!
//! let first = ChangeRecord::first(Value::from(1));
//! assert!(first.is_first_change());
//!
//! let next = ChangeRecord::new(Value::from(1), Value::from(2));
//! assert!(!next.is_first_change());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::component::ComponentRef;
use crate::cycle::{CycleContext, PendingFlush};
use crate::error::{BindingError, Result};
use crate::host::Scope;
use crate::value::Value;

/// One property transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Value at the start of the batch; `None` before the first assignment.
    pub previous_value: Option<Value>,
    pub current_value: Value,
}

impl ChangeRecord {
    /// Record for a property that had no value before.
    #[must_use]
    pub fn first(current_value: Value) -> Self {
        Self {
            previous_value: None,
            current_value,
        }
    }

    #[must_use]
    pub fn new(previous_value: Value, current_value: Value) -> Self {
        Self {
            previous_value: Some(previous_value),
            current_value,
        }
    }

    #[must_use]
    pub fn is_first_change(&self) -> bool {
        self.previous_value.is_none()
    }
}

/// Property name to change record, in first-change order.
pub type ChangeSet = IndexMap<String, ChangeRecord>;

// ---------------------------------------------------------------------------
// Recorder state
// ---------------------------------------------------------------------------

/// A property write, possibly held back while the component is borrowed.
struct Write {
    property: String,
    value: Value,
    record: bool,
    deep_copy: bool,
}

enum WriteOutcome {
    Applied { recorded: bool },
    Deferred,
}

/// State shared between a recorder and its queued delivery.
struct RecorderState {
    component: ComponentRef,
    has_hook: bool,
    suppress_net_zero: bool,
    pending: RefCell<Option<ChangeSet>>,
    deferred: RefCell<Vec<Write>>,
    queued: Cell<bool>,
    delivering: Cell<bool>,
    alive: Rc<Cell<bool>>,
}

impl RecorderState {
    /// Fold one transition into the pending set. Returns whether anything
    /// was recorded.
    fn note(&self, property: &str, current: &Value, previous: &Value) -> bool {
        if current.is_identical(previous) || !self.has_hook {
            return false;
        }

        let mut pending = self.pending.borrow_mut();
        let changes = pending.get_or_insert_with(ChangeSet::new);
        let start = match changes.get(property) {
            Some(existing) => existing.previous_value.clone(),
            None => Some(previous.clone()),
        };
        if self.suppress_net_zero && start.as_ref().is_some_and(|v| v.is_identical(current)) {
            trace!(property, "net-zero change dropped");
            changes.shift_remove(property);
            return true;
        }
        changes.insert(
            property.to_owned(),
            ChangeRecord {
                previous_value: start,
                current_value: current.clone(),
            },
        );
        true
    }

    fn apply(&self, write: Write) -> WriteOutcome {
        let Ok(mut component) = self.component.try_borrow_mut() else {
            trace!(property = %write.property, "component busy, write deferred");
            self.deferred.borrow_mut().push(write);
            return WriteOutcome::Deferred;
        };
        let recorded = write.record && {
            let current = component.get(&write.property);
            self.note(&write.property, &write.value, &current)
        };
        let value = if write.deep_copy {
            write.value.deep_copy()
        } else {
            write.value
        };
        component.set(&write.property, value);
        WriteOutcome::Applied { recorded }
    }

    /// Apply held-back writes. Returns whether the component accepted all of
    /// them.
    fn apply_deferred(&self) -> bool {
        let writes = std::mem::take(&mut *self.deferred.borrow_mut());
        for write in writes {
            self.apply(write);
        }
        self.deferred.borrow().is_empty()
    }

    fn take_pending(&self) -> Option<ChangeSet> {
        self.pending.borrow_mut().take()
    }

    fn abandon(&self) {
        self.pending.borrow_mut().take();
        self.deferred.borrow_mut().clear();
        self.queued.set(false);
    }
}

// ---------------------------------------------------------------------------
// ChangeRecorder
// ---------------------------------------------------------------------------

/// Records changes for one component instance.
pub struct ChangeRecorder {
    state: Rc<RecorderState>,
    scope: Rc<dyn Scope>,
    cycle: CycleContext,
}

impl ChangeRecorder {
    /// `alive` is cleared on teardown; a queued delivery for a dead
    /// component is dropped without calling the hook.
    ///
    /// # Errors
    ///
    /// [`BindingError::ComponentBusy`] if the component is mutably borrowed.
    pub fn new(
        component: ComponentRef,
        scope: Rc<dyn Scope>,
        cycle: CycleContext,
        alive: Rc<Cell<bool>>,
    ) -> Result<Self> {
        let has_hook = component
            .try_borrow()
            .map_err(|_| BindingError::ComponentBusy)?
            .has_change_hook();
        let suppress_net_zero = cycle.config().suppress_net_zero_changes;
        Ok(Self {
            state: Rc::new(RecorderState {
                component,
                has_hook,
                suppress_net_zero,
                pending: RefCell::new(None),
                deferred: RefCell::new(Vec::new()),
                queued: Cell::new(false),
                delivering: Cell::new(false),
                alive,
            }),
            scope,
            cycle,
        })
    }

    #[must_use]
    pub fn component(&self) -> &ComponentRef {
        &self.state.component
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.state.alive.get()
    }

    /// Shared liveness flag of the installation.
    #[must_use]
    pub fn liveness(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.state.alive)
    }

    /// Snapshot of the changes waiting for this cycle's flush.
    #[must_use]
    pub fn pending(&self) -> Option<ChangeSet> {
        self.state.pending.borrow().clone()
    }

    /// Writes waiting for the component to become available.
    #[must_use]
    pub fn deferred_len(&self) -> usize {
        self.state.deferred.borrow().len()
    }

    /// Record `property` moving from `previous` to `current`.
    pub fn record(&self, property: &str, current: &Value, previous: &Value) {
        if self.state.note(property, current, previous) {
            self.schedule(property);
        }
    }

    /// Record the change of `property` to `value`, then assign it. With
    /// `deep_copy` the component receives a deep copy while the record keeps
    /// `value`.
    pub fn assign(&self, property: &str, value: &Value, deep_copy: bool) {
        self.write(Write {
            property: property.to_owned(),
            value: value.clone(),
            record: true,
            deep_copy,
        });
    }

    /// Assign `value` without recording a change.
    pub fn overwrite(&self, property: &str, value: Value) {
        self.write(Write {
            property: property.to_owned(),
            value,
            record: false,
            deep_copy: false,
        });
    }

    fn write(&self, write: Write) {
        let property = write.property.clone();
        match self.state.apply(write) {
            WriteOutcome::Applied { recorded: true } | WriteOutcome::Deferred => {
                self.schedule(&property);
            }
            WriteOutcome::Applied { recorded: false } => {}
        }
    }

    /// Queue this component on the cycle unless it already is, or its
    /// delivery is running and will pick the change up itself.
    fn schedule(&self, property: &str) {
        if self.state.delivering.get() || self.state.queued.replace(true) {
            return;
        }
        trace!(property, "first change of cycle, enqueueing component");
        self.cycle.enqueue(
            self.scope.as_ref(),
            Box::new(Delivery {
                state: Rc::clone(&self.state),
                ttl: self.cycle.config().flush_ttl,
            }),
        );
    }
}

impl fmt::Debug for ChangeRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRecorder")
            .field("alive", &self.state.alive.get())
            .field("pending", &self.state.pending.borrow().as_ref().map(IndexMap::len))
            .field("deferred", &self.deferred_len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// Queued change hook call for one component.
struct Delivery {
    state: Rc<RecorderState>,
    ttl: u32,
}

impl PendingFlush for Delivery {
    fn deliver(self: Box<Self>) -> Result<bool> {
        let state = &self.state;
        state.queued.set(false);
        let _delivering = DeliveringGuard::enter(&state.delivering);

        let mut rounds = 0u32;
        loop {
            if !state.alive.get() {
                state.abandon();
                return Ok(rounds > 0);
            }
            if !state.apply_deferred() {
                state.abandon();
                return Err(BindingError::ComponentBusy);
            }
            let Some(changes) = state.take_pending() else {
                return Ok(rounds > 0);
            };
            if changes.is_empty() {
                return Ok(rounds > 0);
            }
            if rounds == self.ttl {
                warn!(ttl = self.ttl, "change hook keeps re-triggering its inputs, abandoning");
                state.abandon();
                return Err(BindingError::InfiniteChangeLoop { ttl: self.ttl });
            }
            rounds += 1;

            let Ok(mut component) = state.component.try_borrow_mut() else {
                state.abandon();
                return Err(BindingError::ComponentBusy);
            };
            component.on_changes(&changes);
        }
    }

    fn abandon(self: Box<Self>) {
        self.state.abandon();
    }
}

struct DeliveringGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> DeliveringGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
