//! Command-line configuration.

use crate::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Run(Config),
    Help,
    Version,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("invalid port number: {0}")]
    InvalidPort(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Parses command-line arguments, program name excluded.
///
/// # Example
///
/// ```
/// use emberkv::config::{parse_args, CliAction};
///
/// let args = ["--port", "6380"].iter().map(|s| s.to_string());
/// match parse_args(args).unwrap() {
///     CliAction::Run(config) => assert_eq!(config.bind_address(), "0.0.0.0:6380"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn parse_args<I>(args: I) -> Result<CliAction, ConfigError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = Config::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--host" | "-h" => {
                config.host = args
                    .next()
                    .ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
            }
            "--port" | "-p" => {
                let value = args
                    .next()
                    .ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                config.port = value
                    .parse()
                    .map_err(|_| ConfigError::InvalidPort(value))?;
            }
            "--help" => return Ok(CliAction::Help),
            "--version" | "-v" => return Ok(CliAction::Version),
            _ => return Err(ConfigError::UnknownArgument(arg.clone())),
        }
    }

    Ok(CliAction::Run(config))
}

pub fn help_text() -> &'static str {
    r#"
EmberKV - A small in-memory key-value server

USAGE:
    emberkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>    Port to listen on (default: 8000)
    -v, --version        Print version information
        --help           Print this help message

ENVIRONMENT:
    RUST_LOG             Log filter (default: info)

CONNECTING:
    $ redis-cli -p 8000
    127.0.0.1:8000> SET foo bar
    OK
    127.0.0.1:8000> GET foo
    "bar"
"#
}
