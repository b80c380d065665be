//! Storage
//!
//! A sharded, thread-safe map from text keys to text values, shared by all
//! connections through an `Arc`. There is no expiry and nothing is written
//! to disk; the data lives as long as the process.

pub mod store;

pub use store::{Store, StoreError};
