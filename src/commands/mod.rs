//! Commands
//!
//! ```text
//! frame ──> command_args() ──> Command::parse() ──> CommandHandler::dispatch() ──> reply
//!                                                          │
//!                                                          ▼
//!                                                        Store
//! ```
//!
//! ## Supported Commands
//!
//! | Command               | Reply                                    |
//! |-----------------------|------------------------------------------|
//! | `SET key value`       | `+OK`                                    |
//! | `GET key`             | bulk value, or nil                       |
//! | `DEL key [key ...]`   | integer: keys actually removed           |
//! | `EXISTS key`          | integer 1 or 0                           |
//! | `INCR key`            | integer: new value                       |
//! | `DECR key`            | integer: new value                       |
//! | `DUMP key`            | bulk JSON string literal, or nil         |
//! | `FLUSHALL`            | `+OK`                                    |
//! | `ECHO message`        | bulk value: the message                  |

pub mod command;
pub mod handler;

pub use command::{command_args, Arity, Command, CommandError, CommandKind};
pub use handler::CommandHandler;
