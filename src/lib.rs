//! # EmberKV - A Small In-Memory Key-Value Server
//!
//! EmberKV speaks the Redis serialization protocol (RESP) over TCP and keeps
//! text keys and values in a shared in-memory map. It supports a fixed set of
//! commands: `SET`, `GET`, `DEL`, `EXISTS`, `INCR`, `DECR`, `DUMP`,
//! `FLUSHALL` and `ECHO`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                             EmberKV                               │
//! │                                                                   │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐            │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │            │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │            │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘            │
//! │                            │                  │                   │
//! │                            ▼                  ▼                   │
//! │                     ┌─────────────┐    ┌──────────────────────┐   │
//! │                     │ RESP Parser │    │        Store         │   │
//! │                     │ (per conn)  │    │  64 RwLock shards    │   │
//! │                     └─────────────┘    └──────────────────────┘   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use emberkv::connection::ConnectionStats;
//! use emberkv::server::accept_loop;
//! use emberkv::storage::Store;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let storage = Arc::new(Store::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:8000").await?;
//!     accept_loop(listener, storage, stats).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP frames, reply encoding and the incremental parser
//! - [`storage`]: the shared, sharded key-value store
//! - [`commands`]: command parsing and execution
//! - [`connection`]: per-client connection handling
//! - [`server`]: the accept loop
//! - [`config`]: command-line options

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

pub use commands::{Command, CommandError, CommandHandler};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{Store, StoreError};

/// The default port EmberKV listens on
pub const DEFAULT_PORT: u16 = 8000;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
