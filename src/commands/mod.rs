//! Command Layer
//!
//! Turns decoded commands into replies.
//!
//! ```text
//! Session (connection module)
//!       │  Vec<Command>
//!       ▼
//! ┌─────────────────┐
//! │ ExecutorHandle  │  mpsc + oneshot
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  validate, dispatch
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! - `handler`: per-command validation and dispatch
//! - `executor`: the task that owns the handler and runs batches

pub mod executor;
pub mod handler;

pub use executor::{spawn_executor, ExecutorClosed, ExecutorHandle, DEFAULT_QUEUE_DEPTH};
pub use handler::{CommandError, CommandHandler, CommandResult};
