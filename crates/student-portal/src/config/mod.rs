use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::requests::Locale;

const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

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
    pub uploads: UploadConfig,
    pub backend: BackendConfig,
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

        let max_upload_size_bytes = match env::var("APP_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let allowed_mime_types = match env::var("APP_ALLOWED_MIME_TYPES") {
            Ok(raw) => parse_mime_list(&raw)?,
            Err(_) => DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|value| value.to_string())
                .collect(),
        };

        let timeout_secs = env::var("APP_BACKEND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<u64>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let bucket = env::var("APP_STORAGE_BUCKET").unwrap_or_else(|_| "request-files".to_string());

        let request_number_attempts = env::var("APP_REQUEST_NUMBER_ATTEMPTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u8>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidAttempts)?;

        let locale = Locale::from_str(
            &env::var("APP_LOCALE").unwrap_or_else(|_| "en".to_string()),
        );

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            uploads: UploadConfig {
                max_upload_size_bytes,
                allowed_mime_types,
            },
            backend: BackendConfig {
                timeout: Duration::from_secs(timeout_secs),
                bucket,
                request_number_attempts,
                locale,
            },
        })
    }
}

fn parse_mime_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut values = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let parsed: mime::Mime = entry
            .parse()
            .map_err(|_| ConfigError::InvalidMimeType(entry.to_string()))?;
        values.push(parsed.essence_str().to_ascii_lowercase());
    }

    if values.is_empty() {
        return Err(ConfigError::InvalidMimeType(raw.to_string()));
    }
    Ok(values)
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

/// Attachment policy shared by every upload path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub max_upload_size_bytes: u64,
    /// Lower-cased MIME essences (`type/subtype`, no parameters).
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|value| value.to_string())
                .collect(),
        }
    }
}

/// Settings for calls into the hosted backend (database and object storage).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub timeout: Duration,
    pub bucket: String,
    pub request_number_attempts: u8,
    pub locale: Locale,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            bucket: "request-files".to_string(),
            request_number_attempts: 5,
            locale: Locale::English,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidUploadLimit,
    InvalidMimeType(String),
    InvalidTimeout,
    InvalidAttempts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidUploadLimit => {
                write!(f, "APP_MAX_UPLOAD_BYTES must be a positive integer")
            }
            ConfigError::InvalidMimeType(value) => {
                write!(f, "APP_ALLOWED_MIME_TYPES contains an invalid entry '{value}'")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "APP_BACKEND_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidAttempts => {
                write!(f, "APP_REQUEST_NUMBER_ATTEMPTS must be between 1 and 255")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
