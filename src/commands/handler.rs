//! Command Execution
//!
//! `CommandHandler` runs a parsed [`Command`] against the shared [`Store`]
//! and produces the reply frame.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  dispatch() │───>│  RespValue  │     │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘     │
//! │                            │                                │
//! │                            ▼                                │
//! │                          Store                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures never escape as Rust errors: every [`CommandError`] is turned
//! into an `-ERR` reply so the connection can carry on.

use crate::commands::command::{Command, CommandError};
use crate::protocol::RespValue;
use crate::storage::Store;
use std::sync::Arc;

/// Executes commands against the shared store.
///
/// Cheap to clone; every connection gets its own handle.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<Store>,
}

impl CommandHandler {
    pub fn new(storage: Arc<Store>) -> Self {
        Self { storage }
    }

    /// Parses and runs one command given as tokens, verb first.
    ///
    /// # Example
    ///
    /// ```
    /// use emberkv::commands::CommandHandler;
    /// use emberkv::storage::Store;
    /// use std::sync::Arc;
    ///
    /// let handler = CommandHandler::new(Arc::new(Store::new()));
    /// let args: Vec<String> = ["SET", "foo", "bar"].iter().map(|s| s.to_string()).collect();
    /// assert_eq!(handler.execute(&args).serialize(), b"+OK\r\n");
    /// ```
    pub fn execute(&self, args: &[String]) -> RespValue {
        match Command::parse(args) {
            Ok(command) => self.dispatch(command),
            Err(err) => err.into(),
        }
    }

    /// Runs an already validated command.
    pub fn dispatch(&self, command: Command) -> RespValue {
        let result = match command {
            Command::Set { key, value } => self.cmd_set(key, value),
            Command::Get { key } => self.cmd_get(&key),
            Command::Del { keys } => self.cmd_del(&keys),
            Command::Exists { key } => self.cmd_exists(&key),
            Command::Incr { key } => self.cmd_incr_by(&key, 1),
            Command::Decr { key } => self.cmd_incr_by(&key, -1),
            Command::Dump { key } => self.cmd_dump(&key),
            Command::FlushAll => self.cmd_flushall(),
            Command::Echo { message } => self.cmd_echo(message),
        };

        result.unwrap_or_else(RespValue::from)
    }

    /// SET key value
    fn cmd_set(&self, key: String, value: String) -> Result<RespValue, CommandError> {
        self.storage.set(key, value);
        Ok(RespValue::ok())
    }

    /// GET key
    fn cmd_get(&self, key: &str) -> Result<RespValue, CommandError> {
        Ok(match self.storage.get(key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        })
    }

    /// DEL key [key ...]
    fn cmd_del(&self, keys: &[String]) -> Result<RespValue, CommandError> {
        let deleted = self.storage.delete_many(keys);
        Ok(RespValue::integer(deleted as i64))
    }

    /// EXISTS key
    fn cmd_exists(&self, key: &str) -> Result<RespValue, CommandError> {
        Ok(RespValue::integer(self.storage.exists(key) as i64))
    }

    /// INCR key / DECR key
    fn cmd_incr_by(&self, key: &str, delta: i64) -> Result<RespValue, CommandError> {
        let value = self.storage.incr_by(key, delta)?;
        Ok(RespValue::integer(value))
    }

    /// DUMP key
    ///
    /// Replies with the value as a JSON string literal. This is a debugging
    /// aid; the output cannot be fed to RESTORE.
    fn cmd_dump(&self, key: &str) -> Result<RespValue, CommandError> {
        match self.storage.get(key) {
            Some(value) => {
                let serialized = serde_json::to_string(&value)
                    .map_err(|e| CommandError::Serialization(e.to_string()))?;
                Ok(RespValue::bulk_string(serialized))
            }
            None => Ok(RespValue::null()),
        }
    }

    /// FLUSHALL
    fn cmd_flushall(&self) -> Result<RespValue, CommandError> {
        self.storage.flush();
        Ok(RespValue::ok())
    }

    /// ECHO message
    fn cmd_echo(&self, message: String) -> Result<RespValue, CommandError> {
        Ok(RespValue::bulk_string(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        CommandHandler::new(Arc::new(Store::new()))
    }

    /// Runs a command and returns the encoded reply, as a client would see it.
    fn run(handler: &CommandHandler, tokens: &[&str]) -> Vec<u8> {
        let args: Vec<String> = tokens.iter().map(|s| s.to_string()).collect();
        handler.execute(&args).serialize()
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["SET", "foo", "bar"]), b"+OK\r\n");
        assert_eq!(run(&handler, &["GET", "foo"]), b"$3\r\nbar\r\n");

        assert_eq!(run(&handler, &["SET", "foo", "v2"]), b"+OK\r\n");
        assert_eq!(run(&handler, &["GET", "foo"]), b"$2\r\nv2\r\n");
    }

    #[test]
    fn test_get_missing() {
        let handler = create_handler();
        assert_eq!(run(&handler, &["GET", "missing"]), b"$-1\r\n");
    }

    #[test]
    fn test_incr_existing() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["SET", "counter", "10"]), b"+OK\r\n");
        assert_eq!(run(&handler, &["INCR", "counter"]), b":11\r\n");
        assert_eq!(run(&handler, &["GET", "counter"]), b"$2\r\n11\r\n");
    }

    #[test]
    fn test_incr_decr_absent_key() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["INCR", "fresh"]), b":1\r\n");
        assert_eq!(run(&handler, &["DECR", "other"]), b":-1\r\n");
        assert_eq!(run(&handler, &["DECR", "fresh"]), b":0\r\n");
    }

    #[test]
    fn test_incr_not_an_integer() {
        let handler = create_handler();

        run(&handler, &["SET", "x", "abc"]);
        assert_eq!(
            run(&handler, &["INCR", "x"]),
            b"-ERR value is not an integer\r\n"
        );
        assert_eq!(
            run(&handler, &["DECR", "x"]),
            b"-ERR value is not an integer\r\n"
        );
        assert_eq!(run(&handler, &["GET", "x"]), b"$3\r\nabc\r\n");
    }

    #[test]
    fn test_del_counts_existing_keys() {
        let handler = create_handler();

        run(&handler, &["SET", "a", "1"]);
        run(&handler, &["SET", "b", "2"]);

        assert_eq!(run(&handler, &["DEL", "a", "b", "c"]), b":2\r\n");
        assert_eq!(run(&handler, &["GET", "a"]), b"$-1\r\n");
        assert_eq!(run(&handler, &["DEL", "a"]), b":0\r\n");
    }

    #[test]
    fn test_exists() {
        let handler = create_handler();

        run(&handler, &["SET", "key1", "value1"]);
        assert_eq!(run(&handler, &["EXISTS", "key1"]), b":1\r\n");
        assert_eq!(run(&handler, &["EXISTS", "nonexistent"]), b":0\r\n");
    }

    #[test]
    fn test_flushall() {
        let handler = create_handler();

        run(&handler, &["SET", "a", "1"]);
        run(&handler, &["SET", "b", "2"]);
        assert_eq!(run(&handler, &["FLUSHALL"]), b"+OK\r\n");
        assert_eq!(run(&handler, &["GET", "a"]), b"$-1\r\n");
        assert_eq!(run(&handler, &["EXISTS", "b"]), b":0\r\n");
    }

    #[test]
    fn test_echo() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, &["ECHO", "Hello World"]),
            b"$11\r\nHello World\r\n"
        );
        assert_eq!(run(&handler, &["echo", ""]), b"$0\r\n\r\n");
    }

    #[test]
    fn test_dump() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["DUMP", "missing"]), b"$-1\r\n");

        run(&handler, &["SET", "greeting", "hi \"there\""]);
        assert_eq!(
            run(&handler, &["DUMP", "greeting"]),
            b"$14\r\n\"hi \\\"there\\\"\"\r\n"
        );
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, &["FOO"]),
            b"-ERR unknown command 'FOO'\r\n"
        );
        assert_eq!(
            run(&handler, &["foo", "bar"]),
            b"-ERR unknown command 'FOO'\r\n"
        );
    }

    #[test]
    fn test_unknown_verb_with_line_break_yields_one_reply() {
        let handler = create_handler();

        let reply = run(&handler, &["foo\r\n:66"]);
        assert_eq!(reply, b"-ERR unknown command 'FOO  :66'\r\n");

        let (frame, consumed) = crate::protocol::parse_message(&reply).unwrap().unwrap();
        assert_eq!(consumed, reply.len());
        assert_eq!(frame, RespValue::error("ERR unknown command 'FOO  :66'"));
    }

    #[test]
    fn test_wrong_arity_leaves_store_unchanged() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, &["SET", "k"]),
            b"-ERR wrong number of arguments for 'SET' command\r\n"
        );
        assert_eq!(run(&handler, &["EXISTS", "k"]), b":0\r\n");
        assert_eq!(
            run(&handler, &["DEL"]),
            b"-ERR wrong number of arguments for 'DEL' command\r\n"
        );
        assert_eq!(
            run(&handler, &["ECHO"]),
            b"-ERR wrong number of arguments for 'ECHO' command\r\n"
        );
    }

    #[test]
    fn test_empty_command() {
        let handler = create_handler();
        assert_eq!(handler.execute(&[]).serialize(), b"-ERR empty command\r\n");
    }

    #[test]
    fn test_verb_is_case_insensitive() {
        let handler = create_handler();

        assert_eq!(run(&handler, &["sEt", "k", "v"]), b"+OK\r\n");
        assert_eq!(run(&handler, &["get", "k"]), b"$1\r\nv\r\n");
    }

    #[test]
    fn test_handlers_share_the_store() {
        let storage = Arc::new(Store::new());
        let first = CommandHandler::new(Arc::clone(&storage));
        let second = CommandHandler::new(Arc::clone(&storage));

        run(&first, &["SET", "shared", "yes"]);
        assert_eq!(run(&second, &["GET", "shared"]), b"$3\r\nyes\r\n");
        assert_eq!(storage.len(), 1);
    }
}
