//! Storage Module
//!
//! The typed value store and its lazy expiration policy.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                StorageEngine                  │
//! │                                               │
//! │   HashMap<Bytes, Entry>                       │
//! │                  │                            │
//! │                  ▼                            │
//! │   Entry { value: Value, expires_at }          │
//! │           │                                   │
//! │           └─ String | List | Set | Hash       │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! - `engine`: the store and its typed operations
//! - `value`: the `Value` variants and `Entry`
//! - `expiry`: TTL parsing and the expiry test used on every access
//!
//! ## Example
//!
//! ```
//! use nimbuskv::storage::{Expiry, SetOptions, StorageEngine};
//! use bytes::Bytes;
//!
//! let mut store = StorageEngine::new();
//! let options = SetOptions {
//!     expiry: Some(Expiry::Seconds(60)),
//!     condition: None,
//! };
//! assert!(store.set(Bytes::from("session"), Bytes::from("token"), options));
//! assert_eq!(store.get(b"session"), Ok(Some(Bytes::from("token"))));
//! ```

pub mod engine;
pub mod expiry;
pub mod value;

pub use engine::{
    KeyTtl, SetCondition, SetOptions, StorageEngine, StorageError, StorageResult, StorageStats,
};
pub use expiry::{Expiry, ExpiryError};
pub use value::{Entry, Value};
