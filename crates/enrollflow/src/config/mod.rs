use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub enrollment: EnrollmentConfig,
    pub payments: PaymentsConfig,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let token_secret_hex = env::var("ENROLLMENT_TOKEN_SECRET").ok();
        let token_ttl_secs = env::var("ENROLLMENT_TOKEN_TTL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTokenTtl)?;

        let payments = PaymentsConfig {
            location_id: env::var("PAYMENTS_LOCATION_ID").ok(),
            weekly_plan_id: env::var("PAYMENTS_WEEKLY_PLAN_ID").ok(),
            currency: env::var("PAYMENTS_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            enrollment: EnrollmentConfig {
                token_secret_hex,
                token_ttl_secs,
            },
            payments,
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Output shape for structured logs. Compact for humans at a terminal,
/// JSON for log shippers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat {
                value: other.to_string(),
            }),
        }
    }
}

/// Bearer-token issuance settings for the phased submission flow.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentConfig {
    /// Hex-encoded 32-byte HMAC secret. A fresh secret is generated at
    /// startup when unset, which invalidates tokens across restarts.
    pub token_secret_hex: Option<String>,
    pub token_ttl_secs: u64,
}

/// Identifiers the payment processor requires per request.
#[derive(Debug, Clone, Default)]
pub struct PaymentsConfig {
    pub location_id: Option<String>,
    pub weekly_plan_id: Option<String>,
    pub currency: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidTokenTtl,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidTokenTtl => {
                write!(f, "ENROLLMENT_TOKEN_TTL_SECS must be a valid u64")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidTokenTtl
            | ConfigError::InvalidLogFormat { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
