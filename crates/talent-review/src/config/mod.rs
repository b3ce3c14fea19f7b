use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::evaluation360::consensus::{ConsensusPolicy, DEFAULT_DIVERGENCE_THRESHOLD};
use crate::workflows::evaluation360::domain::RatingScale;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub evaluation: EvaluationSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            evaluation: EvaluationSettings::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engine defaults applied to cycles that do not override them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationSettings {
    pub divergence_threshold: f64,
    pub rating_scale: RatingScale,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
            rating_scale: RatingScale::COMPETENCY,
        }
    }
}

impl EvaluationSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let divergence_threshold = match env::var("REVIEW_DIVERGENCE_THRESHOLD") {
            Ok(raw) => parse_divergence_threshold(&raw)?,
            Err(_) => DEFAULT_DIVERGENCE_THRESHOLD,
        };

        let min = scale_bound("RATING_SCALE_MIN", RatingScale::COMPETENCY.min)?;
        let max = scale_bound("RATING_SCALE_MAX", RatingScale::COMPETENCY.max)?;
        let rating_scale =
            RatingScale::new(min, max).map_err(|_| ConfigError::InvalidRatingScale { min, max })?;

        Ok(Self {
            divergence_threshold,
            rating_scale,
        })
    }

    pub fn consensus_policy(&self) -> ConsensusPolicy {
        ConsensusPolicy {
            divergence_threshold: self.divergence_threshold,
        }
    }
}

/// Shared by the environment loader and the CLI flags: finite and non-negative.
pub fn parse_divergence_threshold(raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(ConfigError::InvalidDivergenceThreshold(raw.to_string())),
    }
}

fn scale_bound(key: &'static str, default: u8) -> Result<u8, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u8>()
            .map_err(|_| ConfigError::InvalidRatingBound { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDivergenceThreshold(String),
    InvalidRatingScale { min: u8, max: u8 },
    InvalidRatingBound { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDivergenceThreshold(value) => write!(
                f,
                "REVIEW_DIVERGENCE_THRESHOLD must be a non-negative number, got '{value}'"
            ),
            ConfigError::InvalidRatingScale { min, max } => write!(
                f,
                "RATING_SCALE_MIN/RATING_SCALE_MAX must be integers with min < max (got {min}..={max})"
            ),
            ConfigError::InvalidRatingBound { key, value } => {
                write!(f, "{key} must be an integer between 0 and 255, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidDivergenceThreshold(_)
            | ConfigError::InvalidRatingScale { .. }
            | ConfigError::InvalidRatingBound { .. } => None,
        }
    }
}
