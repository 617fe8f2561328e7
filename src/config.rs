//! Server configuration.
//!
//! Settings are layered, later sources winning:
//!
//! ```text
//! defaults ──> MEMKV_* environment variables ──> command-line flags
//! ```
//!
//! | Setting           | Environment               | Flag                | Default     |
//! |-------------------|---------------------------|---------------------|-------------|
//! | bind host         | `MEMKV_HOST`              | `--host`, `-h`      | `127.0.0.1` |
//! | bind port         | `MEMKV_PORT`              | `--port`, `-p`      | `6379`      |
//! | connection limit  | `MEMKV_MAX_CONNECTIONS`   | `--max-connections` | `1024`      |
//! | idle timeout secs | `MEMKV_IDLE_TIMEOUT_SECS` | `--idle-timeout`    | none (`0`)  |

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

const ENV_HOST: &str = "MEMKV_HOST";
const ENV_PORT: &str = "MEMKV_PORT";
const ENV_MAX_CONNECTIONS: &str = "MEMKV_MAX_CONNECTIONS";
const ENV_IDLE_TIMEOUT: &str = "MEMKV_IDLE_TIMEOUT_SECS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0} requires a value")]
    MissingValue(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the process should do after reading its arguments.
#[derive(Debug, PartialEq, Eq)]
pub enum Startup {
    Serve(Config),
    PrintHelp,
    PrintVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Upper bound on concurrently served clients
    pub max_connections: usize,
    /// Disconnect clients that send nothing for this long
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: None,
        }
    }
}

impl Config {
    /// Reads the environment, then the process arguments.
    pub fn load() -> Result<Startup, ConfigError> {
        Self::from_env()?.apply_args(std::env::args().skip(1))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse_port(ENV_PORT, &port)?;
        }
        if let Some(limit) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_limit(ENV_MAX_CONNECTIONS, &limit)?;
        }
        if let Some(secs) = lookup(ENV_IDLE_TIMEOUT) {
            config.idle_timeout = parse_timeout(ENV_IDLE_TIMEOUT, &secs)?;
        }

        Ok(config)
    }

    /// Applies command-line flags on top of `self`.
    pub fn apply_args<I>(mut self, args: I) -> Result<Startup, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--host" | "-h" => {
                    self.host = required(&flag, args.next())?;
                }
                "--port" | "-p" => {
                    self.port = parse_port("--port", &required(&flag, args.next())?)?;
                }
                "--max-connections" => {
                    let value = required(&flag, args.next())?;
                    self.max_connections = parse_limit("--max-connections", &value)?;
                }
                "--idle-timeout" => {
                    let value = required(&flag, args.next())?;
                    self.idle_timeout = parse_timeout("--idle-timeout", &value)?;
                }
                "--help" => return Ok(Startup::PrintHelp),
                "--version" | "-v" => return Ok(Startup::PrintVersion),
                _ => return Err(ConfigError::UnknownArgument(flag)),
            }
        }

        Ok(Startup::Serve(self))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn parse_port(name: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn parse_limit(name: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(invalid(name, value)),
    }
}

/// Seconds; `0` turns the timeout off.
fn parse_timeout(name: &'static str, value: &str) -> Result<Option<Duration>, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(invalid(name, value)),
    }
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn serve(startup: Startup) -> Config {
        match startup {
            Startup::Serve(config) => config,
            other => panic!("expected Serve, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
    }

    #[test]
    fn test_no_vars_gives_defaults() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = from_pairs(&[
            ("MEMKV_HOST", "0.0.0.0"),
            ("MEMKV_PORT", "7000"),
            ("MEMKV_MAX_CONNECTIONS", "16"),
            ("MEMKV_IDLE_TIMEOUT_SECS", "30"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_env_invalid_values() {
        assert_eq!(
            from_pairs(&[("MEMKV_PORT", "not_a_port")]),
            Err(ConfigError::InvalidValue {
                name: "MEMKV_PORT",
                value: "not_a_port".to_string()
            })
        );
        assert!(from_pairs(&[("MEMKV_PORT", "70000")]).is_err());
        assert!(from_pairs(&[("MEMKV_MAX_CONNECTIONS", "0")]).is_err());
        assert!(from_pairs(&[("MEMKV_IDLE_TIMEOUT_SECS", "-1")]).is_err());
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = from_pairs(&[("MEMKV_IDLE_TIMEOUT_SECS", "0")]).unwrap();
        assert_eq!(config.idle_timeout, None);
    }

    #[test]
    fn test_flags_override_env() {
        let base = from_pairs(&[("MEMKV_PORT", "7000"), ("MEMKV_HOST", "0.0.0.0")]).unwrap();
        let config = serve(
            base.apply_args(args(&["-p", "7001", "--max-connections", "8"]))
                .unwrap(),
        );

        assert_eq!(config.port, 7001);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.max_connections, 8);
    }

    #[test]
    fn test_all_flags() {
        let config = serve(
            Config::default()
                .apply_args(args(&[
                    "--host",
                    "10.0.0.1",
                    "--port",
                    "6380",
                    "--idle-timeout",
                    "5",
                ]))
                .unwrap(),
        );

        assert_eq!(config.bind_address(), "10.0.0.1:6380");
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(
            Config::default().apply_args(args(&["--help"])),
            Ok(Startup::PrintHelp)
        );
        assert_eq!(
            Config::default().apply_args(args(&["-v"])),
            Ok(Startup::PrintVersion)
        );
    }

    #[test]
    fn test_flag_errors() {
        assert_eq!(
            Config::default().apply_args(args(&["--port"])),
            Err(ConfigError::MissingValue("--port".to_string()))
        );
        assert_eq!(
            Config::default().apply_args(args(&["--verbose"])),
            Err(ConfigError::UnknownArgument("--verbose".to_string()))
        );
        assert!(Config::default()
            .apply_args(args(&["--port", "http"]))
            .is_err());
    }
}
