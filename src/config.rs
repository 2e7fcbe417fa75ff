use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub rider_daily_capacity: u32,
    pub event_buffer_size: usize,
    pub seed_branches: bool,
    pub static_dir: String,
    pub assistant_api_key: Option<String>,
    pub assistant_model: String,
    pub assistant_endpoint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected compact or json")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 5000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            jwt_secret: "change-me-in-production".to_string(),
            token_ttl_hours: 24 * 30,
            rider_daily_capacity: 10,
            event_buffer_size: 1024,
            seed_branches: true,
            static_dir: "static".to_string(),
            assistant_api_key: None,
            assistant_model: "gemini-pro".to_string(),
            assistant_endpoint: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let rider_daily_capacity = parse_or_default("RIDER_DAILY_CAPACITY", defaults.rider_daily_capacity)?;
        if rider_daily_capacity == 0 {
            return Err(AppError::Internal(
                "invalid RIDER_DAILY_CAPACITY: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or_default("LOG_FORMAT", defaults.log_format)?,
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            token_ttl_hours: parse_or_default("TOKEN_TTL_HOURS", defaults.token_ttl_hours)?,
            rider_daily_capacity,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            seed_branches: parse_or_default("SEED_BRANCHES", defaults.seed_branches)?,
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
            assistant_api_key: env::var("ASSISTANT_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            assistant_model: env::var("ASSISTANT_MODEL").unwrap_or(defaults.assistant_model),
            assistant_endpoint: env::var("ASSISTANT_ENDPOINT")
                .unwrap_or(defaults.assistant_endpoint),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::LogFormat;

    #[test]
    fn log_format_accepts_known_values() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Compact".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
