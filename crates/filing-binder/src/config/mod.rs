use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
    pub compilation: CompilationSettings,
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
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            compilation: CompilationSettings::from_env()?,
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

/// Output shape of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

const DEFAULT_BINDER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MIN_CLASSIFICATION_CONFIDENCE: f32 = 0.75;
const DEFAULT_MIN_OCR_CONFIDENCE: f32 = 0.60;

/// Knobs for the compilation engine and the optional binder capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationSettings {
    pub binder_enabled: bool,
    pub binder_timeout: Duration,
    pub min_classification_confidence: f32,
    pub min_ocr_confidence: f32,
    pub catalog_dir: Option<PathBuf>,
}

impl Default for CompilationSettings {
    fn default() -> Self {
        Self {
            binder_enabled: false,
            binder_timeout: Duration::from_secs(DEFAULT_BINDER_TIMEOUT_SECS),
            min_classification_confidence: DEFAULT_MIN_CLASSIFICATION_CONFIDENCE,
            min_ocr_confidence: DEFAULT_MIN_OCR_CONFIDENCE,
            catalog_dir: None,
        }
    }
}

impl CompilationSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let binder_enabled = match env::var("COMPILER_BINDER_ENABLED") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                name: "COMPILER_BINDER_ENABLED",
                value: raw,
            })?,
            Err(_) => defaults.binder_enabled,
        };

        let binder_timeout = match env::var("COMPILER_BINDER_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::InvalidNumber {
                        name: "COMPILER_BINDER_TIMEOUT_SECS",
                        value: raw,
                    })?;
                Duration::from_secs(secs)
            }
            Err(_) => defaults.binder_timeout,
        };

        let min_classification_confidence = confidence_var(
            "COMPILER_MIN_CLASSIFICATION_CONFIDENCE",
            defaults.min_classification_confidence,
        )?;
        let min_ocr_confidence =
            confidence_var("COMPILER_MIN_OCR_CONFIDENCE", defaults.min_ocr_confidence)?;

        let catalog_dir = env::var("COMPILER_CATALOG_DIR")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            binder_enabled,
            binder_timeout,
            min_classification_confidence,
            min_ocr_confidence,
            catalog_dir,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn confidence_var(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|value| (0.0..=1.0).contains(value))
            .ok_or(ConfigError::InvalidNumber { name, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidFlag { name: &'static str, value: String },
    InvalidNumber { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json' (found '{value}')")
            }
            ConfigError::InvalidFlag { name, value } => {
                write!(f, "{name} must be a boolean flag (found '{value}')")
            }
            ConfigError::InvalidNumber { name, value } => {
                write!(f, "{name} is out of range or not a number (found '{value}')")
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "COMPILER_BINDER_ENABLED",
            "COMPILER_BINDER_TIMEOUT_SECS",
            "COMPILER_MIN_CLASSIFICATION_CONFIDENCE",
            "COMPILER_MIN_OCR_CONFIDENCE",
            "COMPILER_CATALOG_DIR",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(config.compilation, CompilationSettings::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_binder_settings() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COMPILER_BINDER_ENABLED", "yes");
        env::set_var("COMPILER_BINDER_TIMEOUT_SECS", "5");
        env::set_var("COMPILER_MIN_CLASSIFICATION_CONFIDENCE", "0.9");
        env::set_var("COMPILER_CATALOG_DIR", "/etc/filing-binder/catalogs");
        let config = AppConfig::load().expect("config loads");
        assert!(config.compilation.binder_enabled);
        assert_eq!(config.compilation.binder_timeout, Duration::from_secs(5));
        assert!((config.compilation.min_classification_confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(
            config.compilation.catalog_dir,
            Some(PathBuf::from("/etc/filing-binder/catalogs"))
        );
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COMPILER_MIN_OCR_CONFIDENCE", "1.5");
        let error = AppConfig::load().expect_err("confidence above 1.0 is rejected");
        assert!(matches!(
            error,
            ConfigError::InvalidNumber {
                name: "COMPILER_MIN_OCR_CONFIDENCE",
                ..
            }
        ));
        reset_env();
    }

    #[test]
    fn rejects_zero_timeout_and_bad_flag() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("COMPILER_BINDER_TIMEOUT_SECS", "0");
        assert!(AppConfig::load().is_err());
        reset_env();
        env::set_var("COMPILER_BINDER_ENABLED", "maybe");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidFlag { .. })
        ));
        reset_env();
    }
}
