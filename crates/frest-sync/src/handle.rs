//! Single-assignment completion cell.
//!
//! [`channel`] creates a connected pair:
//!
//! - [`Completer`] is handed to the asynchronous side (a put callback, a
//!   plugin reply handler). It may be cloned so that a second actor can race
//!   a cancellation against the callback.
//! - [`OperationHandle`] stays with the requesting thread, which blocks on
//!   [`OperationHandle::wait`] until a terminal outcome is recorded.
//!
//! ```text
//!  request thread                   callback thread
//!  ──────────────                   ───────────────
//!  (completer, handle) = channel()
//!  submit(work, completer) ───────▶ ... network ...
//!  handle.wait()  ─┐                completer.succeed(uri)
//!                  │  lock + condvar      │
//!                  └◀─────────────────────┘
//! ```
//!
//! # Invariants
//!
//! 1. The slot moves `Pending -> Ready -> Taken` and never backwards.
//! 2. Only the first `complete*` call observes `Pending`; later calls return
//!    `false` without touching the slot or notifying.
//! 3. Mutation and waiting share one mutex, so a completion that happens
//!    before `wait` is entered is never lost.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Observable state of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TerminalState {
    /// No outcome recorded yet
    Pending,
    /// Operation completed with a payload
    Succeeded,
    /// Operation failed with an error detail
    Failed,
    /// Operation was cancelled before it completed
    Cancelled,
}

impl TerminalState {
    /// Whether this is one of the three terminal states.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminalState::Pending)
    }

    /// Lowercase name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalState::Pending => "pending",
            TerminalState::Succeeded => "succeeded",
            TerminalState::Failed => "failed",
            TerminalState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// Completed with a payload
    Succeeded(T),
    /// Failed with an error detail
    Failed(E),
    /// Cancelled
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    /// The terminal state this outcome represents.
    pub fn state(&self) -> TerminalState {
        match self {
            Outcome::Succeeded(_) => TerminalState::Succeeded,
            Outcome::Failed(_) => TerminalState::Failed,
            Outcome::Cancelled => TerminalState::Cancelled,
        }
    }

    /// Map the success payload, leaving failures and cancellation untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Outcome::Succeeded(value) => Outcome::Succeeded(f(value)),
            Outcome::Failed(error) => Outcome::Failed(error),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

enum Slot<T, E> {
    Pending,
    Ready(Outcome<T, E>),
    /// Outcome already handed to the waiter; the state is kept for queries
    /// from the completer side.
    Taken(TerminalState),
}

impl<T, E> Slot<T, E> {
    fn state(&self) -> TerminalState {
        match self {
            Slot::Pending => TerminalState::Pending,
            Slot::Ready(outcome) => outcome.state(),
            Slot::Taken(state) => *state,
        }
    }

    fn take_ready(&mut self) -> Option<Outcome<T, E>> {
        let state = match self {
            Slot::Ready(outcome) => outcome.state(),
            _ => return None,
        };
        match std::mem::replace(self, Slot::Taken(state)) {
            Slot::Ready(outcome) => Some(outcome),
            _ => None,
        }
    }
}

struct Cell<T, E> {
    slot: Mutex<Slot<T, E>>,
    ready: Condvar,
}

impl<T, E> Cell<T, E> {
    // A panicking `on_win` closure poisons the mutex; the slot itself is
    // still consistent because it is only written after the closure returns.
    fn lock(&self) -> MutexGuard<'_, Slot<T, E>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected completer/handle pair in the `Pending` state.
pub fn channel<T, E>() -> (Completer<T, E>, OperationHandle<T, E>) {
    let cell = Arc::new(Cell {
        slot: Mutex::new(Slot::Pending),
        ready: Condvar::new(),
    });
    (
        Completer {
            cell: Arc::clone(&cell),
        },
        OperationHandle { cell },
    )
}

/// Callback-side half of a completion cell.
pub struct Completer<T, E> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Clone for Completer<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> Completer<T, E> {
    /// Record a successful outcome. Returns `false` if already terminal.
    pub fn succeed(&self, value: T) -> bool {
        self.complete(Outcome::Succeeded(value))
    }

    /// Record a failure. Returns `false` if already terminal.
    pub fn fail(&self, error: E) -> bool {
        self.complete(Outcome::Failed(error))
    }

    /// Record a cancellation. Returns `false` if already terminal.
    pub fn cancelled(&self) -> bool {
        self.complete(Outcome::Cancelled)
    }

    /// Record `outcome` if the cell is still pending.
    pub fn complete(&self, outcome: Outcome<T, E>) -> bool {
        self.complete_with(outcome, || {})
    }

    /// Record `outcome` if the cell is still pending, running `on_win` under
    /// the cell lock first.
    ///
    /// `on_win` runs at most once across all completers of the cell, and only
    /// for the transition that wins. It must not call back into the same
    /// cell; the lock is not reentrant.
    pub fn complete_with<F>(&self, outcome: Outcome<T, E>, on_win: F) -> bool
    where
        F: FnOnce(),
    {
        let mut slot = self.cell.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        on_win();
        *slot = Slot::Ready(outcome);
        drop(slot);
        self.cell.ready.notify_all();
        true
    }

    /// Current state of the cell.
    pub fn state(&self) -> TerminalState {
        self.cell.lock().state()
    }

    /// Whether a terminal outcome has been recorded.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("state", &self.state())
            .finish()
    }
}

/// Waiter-side half of a completion cell.
///
/// Waiting consumes the handle, which makes "wait exactly once" a property
/// of the type rather than a convention.
pub struct OperationHandle<T, E> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> OperationHandle<T, E> {
    /// Current state without blocking.
    pub fn state(&self) -> TerminalState {
        self.cell.lock().state()
    }

    /// Block until a terminal outcome is recorded.
    ///
    /// Blocks forever if no completer ever fires. Create handles only for
    /// work whose submission is guaranteed to complete or be cancelled.
    pub fn wait(self) -> Outcome<T, E> {
        let mut slot = self.cell.lock();
        loop {
            if let Some(outcome) = slot.take_ready() {
                return outcome;
            }
            slot = self
                .cell
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`.
    ///
    /// On timeout the handle is returned unchanged so the caller can cancel
    /// the operation and wait again.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Outcome<T, E>, Self> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait());
        };

        let mut slot = self.cell.lock();
        loop {
            if let Some(outcome) = slot.take_ready() {
                return Ok(outcome);
            }
            let now = Instant::now();
            if now >= deadline {
                drop(slot);
                return Err(self);
            }
            let (guard, _) = self
                .cell
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }
}

impl<T, E> fmt::Debug for OperationHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
