//! # NimbusKV - An In-Memory, Multi-Type Key-Value Store
//!
//! NimbusKV speaks the RESP wire protocol, so any Redis client can talk to
//! it. Keys map to strings, lists, sets or hashes, and any key may carry a
//! time-to-live.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              NimbusKV                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │ TCP Server  │───>│  Session    │───>│  Executor task               │ │
//! │  │ (Listener)  │    │  (per conn) │    │                              │ │
//! │  └─────────────┘    └──────┬──────┘    │  CommandHandler              │ │
//! │                            │           │     │                        │ │
//! │                     ┌──────┴──────┐    │     ▼                        │ │
//! │                     │ RESP codec  │    │  StorageEngine               │ │
//! │                     └─────────────┘    │  HashMap<Bytes, Entry>       │ │
//! │                                        └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions run concurrently, but only the executor task touches the store.
//! Each session hands over everything it decoded from one read as a single
//! batch, so a command always observes the effects of every command that
//! finished before it.
//!
//! ## Quick Start
//!
//! ```ignore
//! use nimbuskv::commands::{spawn_executor, CommandHandler};
//! use nimbuskv::connection::ConnectionStats;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (executor, _task) = spawn_executor(CommandHandler::default(), 1024);
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await?;
//!
//!     nimbuskv::server::serve(listener, executor, stats).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Expiry
//!
//! Expiry is lazy: a key whose deadline has passed is removed the next time
//! a command touches it. Nothing scans the keyspace in the background.
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP decoder and reply encoding
//! - [`storage`]: the typed store and its expiry rules
//! - [`commands`]: command dispatch and the executor task
//! - [`connection`]: per-client sessions
//! - [`server`]: the accept loop
//! - [`config`]: command-line options

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::{spawn_executor, CommandHandler, ExecutorHandle};
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port NimbusKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host NimbusKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of NimbusKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
