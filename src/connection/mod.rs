//! Connection Module
//!
//! One session task per client. Sessions never touch the store; they decode
//! bytes into commands, submit them to the executor and write the replies
//! back.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server module)                          │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept() + spawn
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Decode all  │───>│ Submit batch│──────┼──> executor
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌───────────────┐      │
//! │                                      │ Write replies │      │
//! │                                      └───────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use nimbuskv::commands::{spawn_executor, CommandHandler};
//! use nimbuskv::connection::{handle_connection, ConnectionStats};
//! use std::sync::Arc;
//!
//! let (executor, _task) = spawn_executor(CommandHandler::default(), 1024);
//! let stats = Arc::new(ConnectionStats::new());
//!
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, executor.clone(), stats));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
