//! Process configuration read from `EVENTS_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Sqlite { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub queue_backend: QueueBackend,
    /// Create the two named queues at startup instead of requiring them.
    pub create_queues: bool,
    /// Consumer loops per record kind.
    pub workers: usize,
    pub sink_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from any variable source; unset and empty values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let listen = parse_var(
            "EVENTS_LISTEN",
            get("EVENTS_LISTEN"),
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;
        let log_level = parse_var("EVENTS_LOG_LEVEL", get("EVENTS_LOG_LEVEL"), LogLevel::Info)?;
        let log_format = if parse_bool("EVENTS_LOG_JSON", get("EVENTS_LOG_JSON"), false)? {
            LogFormat::Json
        } else {
            LogFormat::Text
        };

        let queue_backend = match get("EVENTS_QUEUE_BACKEND").as_deref() {
            None | Some("sqlite") => QueueBackend::Sqlite {
                path: get("EVENTS_QUEUE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("events-queue.db")),
            },
            Some("memory") => QueueBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "EVENTS_QUEUE_BACKEND",
                    reason: format!("unknown backend {other:?}, expected sqlite or memory"),
                })
            }
        };
        let create_queues = parse_bool("EVENTS_QUEUE_CREATE", get("EVENTS_QUEUE_CREATE"), true)?;

        let workers: usize = parse_var("EVENTS_WORKERS", get("EVENTS_WORKERS"), 4)?;
        if workers == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENTS_WORKERS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            listen,
            log_level,
            log_format,
            queue_backend,
            create_queues,
            workers,
            sink_url: get("EVENTS_SINK_URL"),
        })
    }
}

fn parse_var<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}
