use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::audit::comparison::ReportInterval;
use crate::placeholder::MissingFieldPolicy;

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

/// Top-level configuration for the audit engine and its service wrapper.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub audit: AuditConfig,
    pub performance: PerformanceConfig,
    pub reporting: ReportingConfig,
    pub placeholders: PlaceholderConfig,
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

        let audit = AuditConfig {
            workers: parse_var("SEO_AUDIT_WORKERS", 4usize)?.max(1),
            include_developer_fixes: parse_flag("SEO_AUDIT_INCLUDE_DEV_FIXES", true)?,
            scheduler_interval_secs: parse_var("SEO_AUDIT_SCHEDULER_INTERVAL_SECS", 60u64)?,
        };

        let performance = PerformanceConfig {
            enabled: parse_flag("SEO_AUDIT_PAGESPEED_ENABLED", true)?,
            api_key: env::var("SEO_AUDIT_PAGESPEED_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            dry_run: parse_flag("SEO_AUDIT_PAGESPEED_DRY_RUN", false)?,
            per_unit_type: parse_flag("SEO_AUDIT_PAGESPEED_PER_TYPE", false)?,
            max_in_flight: parse_var("SEO_AUDIT_PAGESPEED_MAX_IN_FLIGHT", 2usize)?.max(1),
            min_spacing: Duration::from_millis(parse_var(
                "SEO_AUDIT_PAGESPEED_MIN_SPACING_MS",
                1000u64,
            )?),
            max_attempts: parse_var("SEO_AUDIT_PAGESPEED_MAX_ATTEMPTS", 3u32)?.max(1),
            request_timeout: Duration::from_secs(parse_var(
                "SEO_AUDIT_PAGESPEED_TIMEOUT_SECS",
                30u64,
            )?),
        };

        let interval_raw =
            env::var("SEO_AUDIT_REPORT_INTERVAL").unwrap_or_else(|_| "7d".to_string());
        let interval = ReportInterval::parse(&interval_raw)
            .map_err(|_| ConfigError::InvalidInterval(interval_raw.clone()))?;
        let recipients = env::var("SEO_AUDIT_REPORT_RECIPIENTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let reporting = ReportingConfig {
            interval,
            top_n: parse_var("SEO_AUDIT_REPORT_TOP_N", 20usize)?,
            recipients,
        };

        let missing_policy = match env::var("SEO_AUDIT_MISSING_PLACEHOLDER") {
            Ok(raw) => MissingFieldPolicy::from_str(&raw)
                .map_err(|_| ConfigError::InvalidPlaceholderPolicy(raw))?,
            Err(_) => MissingFieldPolicy::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            audit,
            performance,
            reporting,
            placeholders: PlaceholderConfig { missing_policy },
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { key, value: raw }),
        },
        Err(_) => Ok(default),
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

/// Pipeline and scheduler knobs.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub workers: usize,
    pub include_developer_fixes: bool,
    /// Zero disables the background ticker in the service binary.
    pub scheduler_interval_secs: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            include_developer_fixes: true,
            scheduler_interval_secs: 60,
        }
    }
}

/// PageSpeed Insights adapter settings.
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub dry_run: bool,
    pub per_unit_type: bool,
    pub max_in_flight: usize,
    pub min_spacing: Duration,
    pub max_attempts: u32,
    pub request_timeout: Duration,
}

impl PerformanceConfig {
    /// The performance checker only participates when it can produce results.
    pub fn is_active(&self) -> bool {
        self.enabled && (self.dry_run || self.api_key.is_some())
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            dry_run: false,
            per_unit_type: false,
            max_in_flight: 2,
            min_spacing: Duration::from_secs(1),
            max_attempts: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub interval: ReportInterval,
    pub top_n: usize,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaceholderConfig {
    pub missing_policy: MissingFieldPolicy,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    InvalidFlag {
        key: &'static str,
        value: String,
    },
    InvalidInterval(String),
    InvalidPlaceholderPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (found '{value}')")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be true or false (found '{value}')")
            }
            ConfigError::InvalidInterval(value) => write!(
                f,
                "SEO_AUDIT_REPORT_INTERVAL must look like 7d, 2w or 1m (found '{value}')"
            ),
            ConfigError::InvalidPlaceholderPolicy(value) => write!(
                f,
                "SEO_AUDIT_MISSING_PLACEHOLDER must be 'empty' or 'literal' (found '{value}')"
            ),
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
