//! Command Parsing
//!
//! Turns a decoded frame into a [`Command`]. The set of verbs is closed: each
//! one has a [`CommandKind`] with a declared arity, and a call with the wrong
//! number of arguments is rejected here, before anything touches the store.

use crate::protocol::RespValue;
use crate::storage::StoreError;
use thiserror::Error;

/// Errors reported back to the client as `-ERR <message>`.
///
/// None of these close the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,

    /// The frame was not an array of strings
    #[error("invalid command format")]
    InvalidFormat,

    /// Carries the verb, already uppercased
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),

    #[error("value is not an integer")]
    NotAnInteger,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("{0}")]
    Serialization(String),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotAnInteger => CommandError::NotAnInteger,
            StoreError::Overflow => CommandError::Overflow,
        }
    }
}

impl From<CommandError> for RespValue {
    fn from(err: CommandError) -> Self {
        RespValue::error_reply(err)
    }
}

/// How many arguments (not counting the verb) a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

/// The supported verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Get,
    Del,
    Exists,
    Incr,
    Decr,
    Dump,
    FlushAll,
    Echo,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::Set,
        CommandKind::Get,
        CommandKind::Del,
        CommandKind::Exists,
        CommandKind::Incr,
        CommandKind::Decr,
        CommandKind::Dump,
        CommandKind::FlushAll,
        CommandKind::Echo,
    ];

    /// Looks up an already uppercased verb. Exact match only.
    pub fn lookup(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == verb)
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Set => "SET",
            CommandKind::Get => "GET",
            CommandKind::Del => "DEL",
            CommandKind::Exists => "EXISTS",
            CommandKind::Incr => "INCR",
            CommandKind::Decr => "DECR",
            CommandKind::Dump => "DUMP",
            CommandKind::FlushAll => "FLUSHALL",
            CommandKind::Echo => "ECHO",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            CommandKind::Set => Arity::Exact(2),
            CommandKind::Del => Arity::AtLeast(1),
            CommandKind::FlushAll => Arity::Exact(0),
            CommandKind::Get
            | CommandKind::Exists
            | CommandKind::Incr
            | CommandKind::Decr
            | CommandKind::Dump
            | CommandKind::Echo => Arity::Exact(1),
        }
    }
}

/// A fully validated command, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    Get { key: String },
    Del { keys: Vec<String> },
    Exists { key: String },
    Incr { key: String },
    Decr { key: String },
    Dump { key: String },
    FlushAll,
    Echo { message: String },
}

impl Command {
    /// Builds a command from its tokens, verb first.
    ///
    /// The verb is matched case-insensitively.
    ///
    /// # Example
    ///
    /// ```
    /// use emberkv::commands::{Command, CommandError};
    ///
    /// let args = vec!["set".to_string(), "foo".to_string(), "bar".to_string()];
    /// assert_eq!(
    ///     Command::parse(&args),
    ///     Ok(Command::Set { key: "foo".to_string(), value: "bar".to_string() })
    /// );
    ///
    /// let args = vec!["SET".to_string(), "foo".to_string()];
    /// assert_eq!(Command::parse(&args), Err(CommandError::WrongArity("SET")));
    /// ```
    pub fn parse(args: &[String]) -> Result<Command, CommandError> {
        let (verb, rest) = args.split_first().ok_or(CommandError::EmptyCommand)?;
        let verb = verb.to_uppercase();

        let kind = CommandKind::lookup(&verb).ok_or(CommandError::UnknownCommand(verb))?;
        if !kind.arity().accepts(rest.len()) {
            return Err(CommandError::WrongArity(kind.name()));
        }

        let command = match (kind, rest) {
            (CommandKind::Set, [key, value]) => Command::Set {
                key: key.clone(),
                value: value.clone(),
            },
            (CommandKind::Get, [key]) => Command::Get { key: key.clone() },
            (CommandKind::Del, keys) => Command::Del {
                keys: keys.to_vec(),
            },
            (CommandKind::Exists, [key]) => Command::Exists { key: key.clone() },
            (CommandKind::Incr, [key]) => Command::Incr { key: key.clone() },
            (CommandKind::Decr, [key]) => Command::Decr { key: key.clone() },
            (CommandKind::Dump, [key]) => Command::Dump { key: key.clone() },
            (CommandKind::FlushAll, []) => Command::FlushAll,
            (CommandKind::Echo, [message]) => Command::Echo {
                message: message.clone(),
            },
            _ => return Err(CommandError::WrongArity(kind.name())),
        };

        Ok(command)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Set { .. } => CommandKind::Set,
            Command::Get { .. } => CommandKind::Get,
            Command::Del { .. } => CommandKind::Del,
            Command::Exists { .. } => CommandKind::Exists,
            Command::Incr { .. } => CommandKind::Incr,
            Command::Decr { .. } => CommandKind::Decr,
            Command::Dump { .. } => CommandKind::Dump,
            Command::FlushAll => CommandKind::FlushAll,
            Command::Echo { .. } => CommandKind::Echo,
        }
    }
}

/// Flattens a decoded frame into command tokens.
///
/// The frame must be an array. Bulk strings are decoded as UTF-8, with
/// invalid sequences replaced; simple strings and integers are taken as text.
pub fn command_args(frame: RespValue) -> Result<Vec<String>, CommandError> {
    let elements = match frame {
        RespValue::Array(elements) => elements,
        _ => return Err(CommandError::InvalidFormat),
    };

    elements
        .into_iter()
        .map(|element| match element {
            RespValue::BulkString(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            RespValue::SimpleString(s) => Ok(s),
            RespValue::Integer(n) => Ok(n.to_string()),
            _ => Err(CommandError::InvalidFormat),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_each_verb() {
        assert_eq!(
            Command::parse(&args(&["GET", "k"])),
            Ok(Command::Get { key: "k".into() })
        );
        assert_eq!(
            Command::parse(&args(&["del", "a", "b"])),
            Ok(Command::Del {
                keys: args(&["a", "b"])
            })
        );
        assert_eq!(
            Command::parse(&args(&["Exists", "k"])),
            Ok(Command::Exists { key: "k".into() })
        );
        assert_eq!(
            Command::parse(&args(&["incr", "k"])),
            Ok(Command::Incr { key: "k".into() })
        );
        assert_eq!(
            Command::parse(&args(&["DECR", "k"])),
            Ok(Command::Decr { key: "k".into() })
        );
        assert_eq!(
            Command::parse(&args(&["dump", "k"])),
            Ok(Command::Dump { key: "k".into() })
        );
        assert_eq!(
            Command::parse(&args(&["flushall"])),
            Ok(Command::FlushAll)
        );
        assert_eq!(
            Command::parse(&args(&["ECHO", "Hello World"])),
            Ok(Command::Echo {
                message: "Hello World".into()
            })
        );
    }

    #[test]
    fn test_arguments_keep_their_case() {
        assert_eq!(
            Command::parse(&args(&["set", "Foo", "BaR"])),
            Ok(Command::Set {
                key: "Foo".into(),
                value: "BaR".into()
            })
        );
    }

    #[test]
    fn test_unknown_command_is_uppercased() {
        assert_eq!(
            Command::parse(&args(&["foo", "bar"])),
            Err(CommandError::UnknownCommand("FOO".into()))
        );
        // No prefix matching
        assert_eq!(
            Command::parse(&args(&["GE", "k"])),
            Err(CommandError::UnknownCommand("GE".into()))
        );
        assert_eq!(
            Command::parse(&args(&["GETS", "k"])),
            Err(CommandError::UnknownCommand("GETS".into()))
        );
    }

    #[test]
    fn test_empty_command() {
        assert_eq!(Command::parse(&[]), Err(CommandError::EmptyCommand));
    }

    #[test]
    fn test_too_few_arguments_for_every_verb() {
        for kind in CommandKind::ALL {
            let minimum = match kind.arity() {
                Arity::Exact(n) | Arity::AtLeast(n) => n,
            };
            if minimum == 0 {
                continue;
            }
            let mut tokens = vec![kind.name().to_string()];
            tokens.extend((1..minimum).map(|i| format!("arg{}", i)));

            assert_eq!(
                Command::parse(&tokens),
                Err(CommandError::WrongArity(kind.name())),
                "{} with {} argument(s)",
                kind.name(),
                minimum - 1
            );
        }
    }

    #[test]
    fn test_too_many_arguments() {
        assert_eq!(
            Command::parse(&args(&["GET", "a", "b"])),
            Err(CommandError::WrongArity("GET"))
        );
        assert_eq!(
            Command::parse(&args(&["FLUSHALL", "ASYNC"])),
            Err(CommandError::WrongArity("FLUSHALL"))
        );
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::lookup(kind.name()), Some(kind));
        }
        let command = Command::parse(&args(&["del", "x"])).unwrap();
        assert_eq!(command.kind(), CommandKind::Del);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CommandError::UnknownCommand("FOO".into()).to_string(),
            "unknown command 'FOO'"
        );
        assert_eq!(
            CommandError::WrongArity("SET").to_string(),
            "wrong number of arguments for 'SET' command"
        );
        assert_eq!(
            RespValue::from(CommandError::NotAnInteger).serialize(),
            b"-ERR value is not an integer\r\n"
        );
    }

    #[test]
    fn test_command_args() {
        let frame = RespValue::array(vec![
            RespValue::bulk_string("SET"),
            RespValue::simple_string("n"),
            RespValue::integer(5),
        ]);
        assert_eq!(command_args(frame), Ok(args(&["SET", "n", "5"])));

        let lossy = RespValue::array(vec![RespValue::bulk_string(&b"a\xffb"[..])]);
        assert_eq!(command_args(lossy), Ok(vec!["a\u{fffd}b".to_string()]));
    }

    #[test]
    fn test_command_args_rejects_non_arrays() {
        assert_eq!(
            command_args(RespValue::simple_string("PING")),
            Err(CommandError::InvalidFormat)
        );
        assert_eq!(
            command_args(RespValue::array(vec![RespValue::null()])),
            Err(CommandError::InvalidFormat)
        );
    }
}
