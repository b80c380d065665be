//! Client Connections
//!
//! One `ConnectionHandler` per accepted socket, each in its own Tokio task.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read bytes  │───>│ Parse RESP  │───>│ Execute cmd │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send reply  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decode errors and command errors are answered in-band with `-ERR`
//! replies; only a transport failure or the client hanging up ends a
//! connection, and it never affects any other connection.

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
