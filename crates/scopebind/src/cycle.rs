#![forbid(unsafe_code)]

//! Per-cycle batching of change notifications.
//!
//! A [`CycleContext`] owns the queue of components waiting for their change
//! hook. The first change of a cycle schedules exactly one flush through the
//! host's post-cycle primitive; every component with changes appends one
//! entry. When the host runs the flush, entries are drained in FIFO order and
//! the queue is discarded, ready for the next cycle.
//!
//! # Invariants
//!
//! 1. At most one flush is scheduled per cycle.
//! 2. Entries run in the order their first change was recorded.
//! 3. The queue is mutated only by [`CycleContext::enqueue`] and drained only
//!    by [`CycleContext::flush`].
//! 4. Re-entrant flushes nest at most `flush_ttl` deep. Entries discarded
//!    past that depth are [abandoned](PendingFlush::abandon), never dropped
//!    silently.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{BindingError, Result};
use crate::host::Scope;

/// One component's pending delivery.
pub trait PendingFlush {
    /// Run the change hook. Returns whether a hook ran.
    fn deliver(self: Box<Self>) -> Result<bool>;

    /// Discard the delivery without running the hook. Per-cycle state must be
    /// released so the next change schedules the component again.
    fn abandon(self: Box<Self>);
}

pub type QueuedFlush = Box<dyn PendingFlush>;

struct CycleState {
    config: EngineConfig,
    queue: RefCell<Option<Vec<QueuedFlush>>>,
    depth: Cell<u32>,
    flushes: Cell<u64>,
}

/// Shared batching state for every installation attached to one host.
///
/// Cloning is cheap and yields a handle to the same queue.
#[derive(Clone)]
pub struct CycleContext {
    inner: Rc<CycleState>,
}

impl Default for CycleContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(CycleState {
                config,
                queue: RefCell::new(None),
                depth: Cell::new(0),
                flushes: Cell::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Whether a flush is scheduled for the current cycle.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.queue.borrow().is_some()
    }

    /// Number of entries waiting for the scheduled flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.queue.borrow().as_ref().map_or(0, Vec::len)
    }

    /// Number of flushes that have run so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.get()
    }

    /// Append an entry, scheduling the cycle flush on `scope` if this is the
    /// first entry of the cycle.
    pub fn enqueue(&self, scope: &dyn Scope, entry: QueuedFlush) {
        let first = {
            let mut queue = self.inner.queue.borrow_mut();
            match queue.as_mut() {
                Some(entries) => {
                    entries.push(entry);
                    false
                }
                None => {
                    *queue = Some(vec![entry]);
                    true
                }
            }
        };
        if first {
            trace!("scheduling change flush");
            let ctx = self.clone();
            scope.post_cycle(Box::new(move || ctx.flush()));
        }
    }

    /// Deliver every queued entry, then discard the queue.
    ///
    /// The queue is detached before any entry runs, so changes recorded by a
    /// change hook start a new cycle queue. A failing entry does not stop the
    /// others; the first error is returned once all have run.
    pub fn flush(&self) -> Result<()> {
        let ttl = self.inner.config.flush_ttl;
        let depth = self.inner.depth.get() + 1;
        if depth > ttl {
            let abandoned = self.inner.queue.borrow_mut().take().unwrap_or_default();
            warn!(ttl, abandoned = abandoned.len(), "flush nesting exceeded, abandoning change hooks");
            for entry in abandoned {
                entry.abandon();
            }
            return Err(BindingError::InfiniteChangeLoop { ttl });
        }
        let _depth = DepthGuard::enter(&self.inner.depth);

        let entries = self.inner.queue.borrow_mut().take().unwrap_or_default();
        let queued = entries.len();
        let mut delivered = 0usize;
        let mut first_error = None;
        for entry in entries {
            match entry.deliver() {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        self.inner.flushes.set(self.inner.flushes.get() + 1);
        debug!(queued, delivered, depth, "flushed change hooks");
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for CycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CycleContext")
            .field("scheduled", &self.is_scheduled())
            .field("pending", &self.pending_len())
            .field("flushes", &self.flush_count())
            .finish()
    }
}

struct DepthGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
