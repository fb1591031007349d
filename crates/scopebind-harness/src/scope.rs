#![forbid(unsafe_code)]

//! Property-bag scopes with a dirty-checking digest loop.
//!
//! Every scope of a tree shares one root holding the watch registry and the
//! post-digest queue. [`HarnessScope::digest`] re-runs all watches until none
//! reports a change (bounded by [`DIGEST_TTL`] iterations), then drains the
//! post-digest queue.
//!
//! Lookups walk up through non-isolated parents; writes always land on the
//! scope they are made on.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use scopebind::host::{Disposer, PostCycleCallback, WatchGetter, WatchListener};
use scopebind::{BindingError, Scope, Value};
use tracing::trace;

/// Maximum digest iterations before the digest is declared unstable.
pub const DIGEST_TTL: u32 = 10;

struct Watcher {
    scope: Weak<ScopeData>,
    getter: RefCell<WatchGetter>,
    listener: RefCell<Option<WatchListener>>,
    last: RefCell<Option<Value>>,
    literal: bool,
    active: Cell<bool>,
}

struct Root {
    watchers: RefCell<Vec<Rc<Watcher>>>,
    post_digest: RefCell<VecDeque<PostCycleCallback>>,
    digests: Cell<u64>,
}

struct ScopeData {
    values: RefCell<IndexMap<String, Value>>,
    parent: Option<HarnessScope>,
    isolate: bool,
    root: Rc<Root>,
}

/// A host scope.
///
/// Cloning yields another handle to the same scope.
#[derive(Clone)]
pub struct HarnessScope {
    inner: Rc<ScopeData>,
}

/// Outcome of one digest.
#[derive(Debug, Default)]
pub struct DigestReport {
    /// Watch passes run, including the final clean one.
    pub iterations: u32,
    /// Errors raised by watches and post-digest callbacks, in order.
    pub errors: Vec<BindingError>,
    /// The TTL ran out before the watches settled.
    pub unstable: bool,
}

impl DigestReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.unstable
    }
}

impl Default for HarnessScope {
    fn default() -> Self {
        Self::new_root()
    }
}

impl HarnessScope {
    /// Create the root of a new scope tree.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            inner: Rc::new(ScopeData {
                values: RefCell::new(IndexMap::new()),
                parent: None,
                isolate: false,
                root: Rc::new(Root {
                    watchers: RefCell::new(Vec::new()),
                    post_digest: RefCell::new(VecDeque::new()),
                    digests: Cell::new(0),
                }),
            }),
        }
    }

    fn child(&self, isolate: bool) -> Self {
        Self {
            inner: Rc::new(ScopeData {
                values: RefCell::new(IndexMap::new()),
                parent: Some(self.clone()),
                isolate,
                root: Rc::clone(&self.inner.root),
            }),
        }
    }

    /// Child scope inheriting lookups from `self`.
    #[must_use]
    pub fn new_child(&self) -> Self {
        self.child(false)
    }

    /// Child scope that does not inherit lookups but keeps `self` as parent.
    #[must_use]
    pub fn new_isolate_child(&self) -> Self {
        self.child(true)
    }

    /// This scope as a shared trait object.
    #[must_use]
    pub fn shared(&self) -> Rc<dyn Scope> {
        Rc::new(self.clone())
    }

    /// Number of active watches in the whole tree.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.inner.root.watchers.borrow().len()
    }

    /// Number of callbacks waiting for the end of the digest.
    #[must_use]
    pub fn post_digest_len(&self) -> usize {
        self.inner.root.post_digest.borrow().len()
    }

    /// Digests run so far in this tree.
    #[must_use]
    pub fn digest_count(&self) -> u64 {
        self.inner.root.digests.get()
    }

    /// Run `f`, then digest the whole tree.
    pub fn apply(&self, f: impl FnOnce(&HarnessScope)) -> DigestReport {
        f(self);
        self.digest()
    }

    /// Run every watch in the tree to a fixpoint, then the post-digest queue.
    pub fn digest(&self) -> DigestReport {
        let root = &self.inner.root;
        let mut report = DigestReport::default();

        loop {
            report.iterations += 1;
            let mut dirty = false;
            let watchers: Vec<Rc<Watcher>> = root.watchers.borrow().clone();
            for watcher in watchers {
                match run_watcher(&watcher) {
                    Ok(changed) => dirty |= changed,
                    Err(err) => report.errors.push(err),
                }
            }
            if !dirty {
                break;
            }
            if report.iterations >= DIGEST_TTL {
                report.unstable = true;
                break;
            }
        }

        loop {
            let next = root.post_digest.borrow_mut().pop_front();
            let Some(callback) = next else {
                break;
            };
            if let Err(err) = callback() {
                report.errors.push(err);
            }
        }

        root.digests.set(root.digests.get() + 1);
        trace!(
            iterations = report.iterations,
            errors = report.errors.len(),
            "digest complete"
        );
        report
    }
}

/// Evaluate one watcher; returns whether its value changed.
fn run_watcher(watcher: &Watcher) -> Result<bool, BindingError> {
    if !watcher.active.get() {
        return Ok(false);
    }
    let Some(inner) = watcher.scope.upgrade() else {
        return Ok(false);
    };
    let scope = HarnessScope { inner };

    let value = (watcher.getter.borrow_mut())(&scope)?;
    let previous = watcher.last.borrow().clone();
    let changed = match &previous {
        None => true,
        Some(last) if watcher.literal => !last.deep_equals(&value),
        Some(last) => !last.is_same_value(&value),
    };
    if !changed {
        return Ok(false);
    }

    *watcher.last.borrow_mut() = Some(if watcher.literal {
        value.deep_copy()
    } else {
        value.clone()
    });
    if let Some(listener) = watcher.listener.borrow_mut().as_mut() {
        let old = previous.unwrap_or_else(|| value.clone());
        listener(&value, &old)?;
    }
    Ok(true)
}

impl Scope for HarnessScope {
    fn get(&self, name: &str) -> Value {
        if let Some(value) = self.inner.values.borrow().get(name) {
            return value.clone();
        }
        match &self.inner.parent {
            Some(parent) if !self.inner.isolate => parent.get(name),
            _ => Value::Undefined,
        }
    }

    fn set(&self, name: &str, value: Value) {
        self.inner.values.borrow_mut().insert(name.to_owned(), value);
    }

    fn parent(&self) -> Option<Rc<dyn Scope>> {
        self.inner.parent.as_ref().map(HarnessScope::shared)
    }

    fn watch(
        &self,
        getter: WatchGetter,
        listener: Option<WatchListener>,
        literal: bool,
    ) -> Disposer {
        let watcher = Rc::new(Watcher {
            scope: Rc::downgrade(&self.inner),
            getter: RefCell::new(getter),
            listener: RefCell::new(listener),
            last: RefCell::new(None),
            literal,
            active: Cell::new(true),
        });
        self.inner
            .root
            .watchers
            .borrow_mut()
            .push(Rc::clone(&watcher));

        let root = Rc::downgrade(&self.inner.root);
        let watcher = Rc::downgrade(&watcher);
        Box::new(move || {
            let Some(watcher) = watcher.upgrade() else {
                return;
            };
            watcher.active.set(false);
            if let Some(root) = root.upgrade() {
                root.watchers
                    .borrow_mut()
                    .retain(|w| !Rc::ptr_eq(w, &watcher));
            }
        })
    }

    fn post_cycle(&self, callback: PostCycleCallback) {
        self.inner.root.post_digest.borrow_mut().push_back(callback);
    }
}

impl fmt::Debug for HarnessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessScope")
            .field("values", &self.inner.values.borrow().len())
            .field("isolate", &self.inner.isolate)
            .field("watchers", &self.watcher_count())
            .finish()
    }
}
