//! Client configuration for the LMS API.
//!
//! The base URL comes from app configuration (environment variables here).
//! The only transformation applied to it is the secure-scheme upgrade for
//! production builds on platforms that refuse cleartext traffic.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use thiserror::Error;

/// Fallback API URL when neither `LMS_API_URL` nor `API_URL` is set.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Request timeout applied in production builds.
pub const PRODUCTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Build environment the client runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(ConfigError::InvalidValue {
                name: "environment",
                value: other.to_string(),
            }),
        }
    }
}

/// Target platform of the app embedding this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Android,
    Ios,
    Desktop,
}

impl Platform {
    /// Android release builds block cleartext HTTP.
    pub fn requires_secure_transport(self) -> bool {
        matches!(self, Platform::Android)
    }
}

impl FromStr for Platform {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "desktop" => Ok(Platform::Desktop),
            other => Err(ConfigError::InvalidValue {
                name: "platform",
                value: other.to_string(),
            }),
        }
    }
}

/// How much detail the client writes to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Method, URL, redacted headers and error bodies.
    Verbose,
    /// Method and URL only, plus the status on failures.
    Terse,
}

impl Verbosity {
    pub fn default_for(environment: Environment) -> Self {
        match environment {
            Environment::Production => Verbosity::Terse,
            Environment::Development => Verbosity::Verbose,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" => Ok(Verbosity::Verbose),
            "terse" => Ok(Verbosity::Terse),
            other => Err(ConfigError::InvalidValue {
                name: "verbosity",
                value: other.to_string(),
            }),
        }
    }
}

/// Upgrade `http:` to `https:` when a production build targets a platform
/// that requires secure transport. Trailing slashes are trimmed either way.
pub fn normalize_base_url(url: &str, environment: Environment, platform: Platform) -> String {
    let url = url.trim().trim_end_matches('/');
    if environment == Environment::Production && platform.requires_secure_transport() {
        if let Some(rest) = url.strip_prefix("http:") {
            return format!("https:{}", rest);
        }
    }
    url.to_string()
}

/// Settings for [`crate::ApiClient`]. Fixed once the client is built.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    environment: Environment,
    platform: Platform,
    timeout: Option<Duration>,
    verbosity: Verbosity,
    default_headers: HeaderMap,
}

impl ClientConfig {
    /// Create a configuration with the environment's default timeout and verbosity.
    pub fn new(base_url: &str, environment: Environment, platform: Platform) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let timeout = match environment {
            Environment::Production => Some(PRODUCTION_TIMEOUT),
            Environment::Development => None,
        };

        Self {
            base_url: normalize_base_url(base_url, environment, platform),
            environment,
            platform,
            timeout,
            verbosity: Verbosity::default_for(environment),
            default_headers,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// API URL: `LMS_API_URL` > `API_URL` > [`DEFAULT_API_URL`].
    /// `LMS_ENV`, `LMS_PLATFORM` and `LMS_VERBOSITY` are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("LMS_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let environment = match std::env::var("LMS_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::Development,
        };
        let platform = match std::env::var("LMS_PLATFORM") {
            Ok(v) => v.parse()?,
            Err(_) => Platform::Desktop,
        };

        let mut config = Self::new(&base_url, environment, platform);
        if let Ok(v) = std::env::var("LMS_VERBOSITY") {
            config.verbosity = v.parse()?;
        }
        Ok(config)
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header sent with every intercepted request.
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Resolve a request path against the base URL. Absolute URLs pass through.
    pub fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_android_upgrades_to_https() {
        let url = normalize_base_url("http://api.lms.test/", Environment::Production, Platform::Android);
        assert_eq!(url, "https://api.lms.test");
    }

    #[test]
    fn development_keeps_cleartext() {
        let url = normalize_base_url("http://10.0.2.2:5000", Environment::Development, Platform::Android);
        assert_eq!(url, "http://10.0.2.2:5000");
    }

    #[test]
    fn production_ios_keeps_scheme() {
        let url = normalize_base_url("http://api.lms.test", Environment::Production, Platform::Ios);
        assert_eq!(url, "http://api.lms.test");
    }

    #[test]
    fn https_is_left_alone() {
        let url = normalize_base_url("https://api.lms.test", Environment::Production, Platform::Android);
        assert_eq!(url, "https://api.lms.test");
    }

    #[test]
    fn timeout_follows_environment() {
        let prod = ClientConfig::new("https://api.lms.test", Environment::Production, Platform::Ios);
        assert_eq!(prod.timeout(), Some(PRODUCTION_TIMEOUT));
        assert_eq!(prod.verbosity(), Verbosity::Terse);

        let dev = ClientConfig::new("http://localhost:5000", Environment::Development, Platform::Desktop);
        assert_eq!(dev.timeout(), None);
        assert_eq!(dev.verbosity(), Verbosity::Verbose);
    }

    #[test]
    fn json_content_type_is_a_default_header() {
        let config = ClientConfig::new("http://localhost:5000", Environment::Development, Platform::Desktop);
        assert_eq!(
            config.default_headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn resolve_joins_relative_paths() {
        let config = ClientConfig::new("http://localhost:5000/", Environment::Development, Platform::Desktop);
        assert_eq!(config.resolve("/courses"), "http://localhost:5000/courses");
        assert_eq!(config.resolve("courses/1"), "http://localhost:5000/courses/1");
        assert_eq!(config.resolve("https://cdn.lms.test/a.png"), "https://cdn.lms.test/a.png");
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::new("https://api.lms.test", Environment::Production, Platform::Android)
            .with_timeout(Some(Duration::from_secs(5)))
            .with_verbosity(Verbosity::Verbose)
            .with_default_header(
                HeaderName::from_static("x-client-type"),
                HeaderValue::from_static("mobile"),
            );
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.verbosity(), Verbosity::Verbose);
        assert_eq!(config.default_headers().get("x-client-type").unwrap(), "mobile");
        assert_eq!(config.default_headers().len(), 2);
    }

    #[test]
    fn parse_enums() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("android".parse::<Platform>().unwrap(), Platform::Android);
        assert_eq!("terse".parse::<Verbosity>().unwrap(), Verbosity::Terse);
        assert!("staging".parse::<Environment>().is_err());
    }
}
