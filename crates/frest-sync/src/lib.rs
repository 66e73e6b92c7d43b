//! Completion cells for the frest gateway
//!
//! Every network operation the gateway performs (content inserts, resolver
//! plugin exchanges) reports its outcome through a callback fired on a thread
//! owned by the network client. HTTP handlers, on the other hand, want a
//! plain blocking call. This crate holds the single primitive that joins the
//! two worlds.
//!
//! # Module Organization
//!
//! - `handle` - [`OperationHandle`] / [`Completer`] pair over one shared cell
//! - `loom_tests` - Concurrency tests using loom (with `loom` feature)
//!
//! # Guarantees
//!
//! 1. **First terminal transition wins**: success, failure and cancellation
//!    race through one lock; the losers are discarded.
//! 2. **No missed wakeup**: a completion that lands before the waiter starts
//!    waiting is observed immediately.
//! 3. **Single consumer**: waiting consumes the handle, so an outcome is
//!    delivered at most once.
//!
//! # Verification
//!
//! 1. **Loom tests** (`cargo test -p frest-sync --features loom -- loom`)
//! 2. **Unit tests**: std-thread stress tests for the real cell

pub mod handle;


pub use handle::{channel, Completer, OperationHandle, Outcome, TerminalState};
