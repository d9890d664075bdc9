//! Awaitable values read during render.
//!
//! A [`Thenable`] is settled from outside the engine with
//! [`resolve`](Thenable::resolve) or [`reject`](Thenable::reject). Reading an
//! unsettled thenable with [`Hooks::use_value`](crate::Hooks::use_value)
//! suspends the component; the engine registers a settle listener and retries
//! the nearest Suspense boundary once the value is in.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{FiberError, Unwind};

static NEXT_WAKEABLE_ID: AtomicUsize = AtomicUsize::new(1);

/// Settle state of a thenable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThenableStatus {
    /// Never read by a render.
    Untracked,
    Pending,
    Fulfilled,
    Rejected,
}

/// Listener invoked once the awaitable settles.
pub type SettleListener = Box<dyn FnOnce()>;

/// Type-erased view of an awaitable, used to register retries.
pub trait Wakeable: fmt::Debug {
    /// Stable identity, used to deduplicate listeners.
    fn id(&self) -> usize;

    fn is_settled(&self) -> bool;

    /// Call `listener` once settled. Runs it right away if already settled.
    fn on_settle(&self, listener: SettleListener);
}

/// Handle carried by a suspending render.
pub type SuspendHandle = Rc<dyn Wakeable>;

enum State<T> {
    Untracked,
    Pending,
    Fulfilled(T),
    Rejected(String),
}

struct ThenableInner<T> {
    id: usize,
    state: RefCell<State<T>>,
    listeners: RefCell<Vec<SettleListener>>,
}

impl<T> ThenableInner<T> {
    fn settle(&self, next: State<T>) {
        {
            let mut state = self.state.borrow_mut();
            if matches!(*state, State::Fulfilled(_) | State::Rejected(_)) {
                return;
            }
            *state = next;
        }
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }
}

impl<T> fmt::Debug for ThenableInner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.state.borrow() {
            State::Untracked => ThenableStatus::Untracked,
            State::Pending => ThenableStatus::Pending,
            State::Fulfilled(_) => ThenableStatus::Fulfilled,
            State::Rejected(_) => ThenableStatus::Rejected,
        };
        f.debug_struct("Thenable")
            .field("id", &self.id)
            .field("status", &status)
            .finish()
    }
}

impl<T> Wakeable for ThenableInner<T> {
    fn id(&self) -> usize {
        self.id
    }

    fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), State::Fulfilled(_) | State::Rejected(_))
    }

    fn on_settle(&self, listener: SettleListener) {
        self.listeners.borrow_mut().push(listener);
        // settled between the read and the registration
        if self.is_settled() {
            let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
            for listener in listeners {
                listener();
            }
        }
    }
}

/// A value that arrives later. Clones share the same slot.
pub struct Thenable<T> {
    inner: Rc<ThenableInner<T>>,
}

impl<T> Clone for Thenable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Thenable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: 'static> Thenable<T> {
    /// An unsettled thenable.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ThenableInner {
                id: NEXT_WAKEABLE_ID.fetch_add(1, Ordering::Relaxed),
                state: RefCell::new(State::Untracked),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A thenable that is already fulfilled.
    pub fn resolved(value: T) -> Self {
        let thenable = Self::new();
        *thenable.inner.state.borrow_mut() = State::Fulfilled(value);
        thenable
    }

    pub fn resolve(&self, value: T) {
        self.inner.settle(State::Fulfilled(value));
    }

    pub fn reject(&self, reason: impl Into<String>) {
        self.inner.settle(State::Rejected(reason.into()));
    }

    pub fn status(&self) -> ThenableStatus {
        match &*self.inner.state.borrow() {
            State::Untracked => ThenableStatus::Untracked,
            State::Pending => ThenableStatus::Pending,
            State::Fulfilled(_) => ThenableStatus::Fulfilled,
            State::Rejected(_) => ThenableStatus::Rejected,
        }
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Erased handle for listener registration.
    pub fn handle(&self) -> SuspendHandle {
        self.inner.clone()
    }
}

impl<T: Clone + 'static> Thenable<T> {
    /// Read the value: `Ok` once fulfilled, `Unwind::Fail` once rejected,
    /// otherwise `Unwind::Suspend` after marking the thenable as tracked.
    pub fn read(&self) -> Result<T, Unwind> {
        let mut state = self.inner.state.borrow_mut();
        match &*state {
            State::Fulfilled(value) => return Ok(value.clone()),
            State::Rejected(reason) => return Err(FiberError::Rejected(reason.clone()).into()),
            State::Untracked | State::Pending => {}
        }
        *state = State::Pending;
        drop(state);
        Err(Unwind::Suspend(self.handle()))
    }
}

impl<T: 'static> Default for Thenable<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
