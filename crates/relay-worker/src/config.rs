//! Worker settings read from the environment at startup.

use std::os::fd::RawFd;

/// Descriptor number of the inherited control-channel socket.
pub const CHANNEL_FD_ENV: &str = "RELAY_CHANNEL_FD";
/// Base log level when `RUST_LOG` is unset.
pub const LOG_LEVEL_ENV: &str = "RELAY_LOG";
/// `json` selects structured log output.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("RELAY_CHANNEL_FD is not set")]
    MissingChannelFd,

    #[error("RELAY_CHANNEL_FD must be a non-negative integer, got {value:?}")]
    InvalidChannelFd { value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Unknown values fall back to info.
    fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("debug") => Self::Debug,
            Some("warn") | Some("warning") => Self::Warn,
            Some("error") => Self::Error,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub channel_fd: RawFd,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
}

impl WorkerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_fd = lookup(CHANNEL_FD_ENV).ok_or(ConfigError::MissingChannelFd)?;
        let channel_fd = raw_fd
            .trim()
            .parse::<RawFd>()
            .ok()
            .filter(|fd| *fd >= 0)
            .ok_or_else(|| ConfigError::InvalidChannelFd {
                value: raw_fd.clone(),
            })?;

        let log_level = LogLevel::parse_lenient(lookup(LOG_LEVEL_ENV).as_deref());
        let log_format = match lookup(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            channel_fd,
            log_level,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| env.get(key).cloned()
    }

    #[test]
    fn reads_channel_fd_with_defaults() {
        let settings = WorkerSettings::from_lookup(lookup(&[(CHANNEL_FD_ENV, "3")])).unwrap();

        assert_eq!(
            settings,
            WorkerSettings {
                channel_fd: 3,
                log_level: LogLevel::Info,
                log_format: LogFormat::Text,
            }
        );
    }

    #[test]
    fn reads_log_settings() {
        let settings = WorkerSettings::from_lookup(lookup(&[
            (CHANNEL_FD_ENV, "4"),
            (LOG_LEVEL_ENV, "warning"),
            (LOG_FORMAT_ENV, "json"),
        ]))
        .unwrap();

        assert_eq!(settings.log_level, LogLevel::Warn);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let settings = WorkerSettings::from_lookup(lookup(&[
            (CHANNEL_FD_ENV, "4"),
            (LOG_LEVEL_ENV, "verbose"),
        ]))
        .unwrap();

        assert_eq!(settings.log_level, LogLevel::Info);
    }

    #[test]
    fn missing_channel_fd_is_error() {
        let err = WorkerSettings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingChannelFd));
        assert_eq!(err.to_string(), "RELAY_CHANNEL_FD is not set");
    }

    #[test]
    fn invalid_channel_fd_is_error() {
        for value in ["abc", "-1", ""] {
            let err = WorkerSettings::from_lookup(lookup(&[(CHANNEL_FD_ENV, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidChannelFd { .. }), "{value}");
        }
    }
}
