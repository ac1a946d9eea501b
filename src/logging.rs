use crate::config::{LogFormat, LogLevel, LoggingConfig};
use crate::error::ServerError;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::io::Write;

/// Installs the global logger. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), ServerError> {
    let level = config.level.clone().unwrap_or_default().to_string();
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if config.format.clone().unwrap_or_default() == LogFormat::Json {
        builder.format(|buf, record| {
            let timestamp: DateTime<Utc> = Utc::now();
            let log_entry = json!({
                "timestamp": timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
                "level": record.level().to_string().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", log_entry)
        });
    }

    builder
        .try_init()
        .map_err(|e| ServerError::Config(format!("Failed to initialize logger: {}", e)))
}

pub fn parse_log_level(s: &str) -> Result<LogLevel, ServerError> {
    match s.to_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => Err(ServerError::Config(format!(
            "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
            s
        ))),
    }
}

pub fn parse_log_format(s: &str) -> Result<LogFormat, ServerError> {
    match s.to_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(ServerError::Config(format!("Invalid log format: {}. Must be one of: text, json", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(parse_log_level("warn").unwrap(), LogLevel::Warn);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(parse_log_format("Json").unwrap(), LogFormat::Json);
        assert_eq!(parse_log_format("text").unwrap(), LogFormat::Text);
        assert!(parse_log_format("xml").is_err());
    }
}
