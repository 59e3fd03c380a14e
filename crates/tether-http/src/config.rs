//! HTTP client configuration

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HttpError, Result};

/// Forward proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy scheme (`http` or `https`)
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,

    /// Proxy host name or address
    #[serde(default = "default_proxy_address")]
    pub address: String,

    /// Proxy port
    #[serde(default = "default_proxy_port")]
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            protocol: default_proxy_protocol(),
            address: default_proxy_address(),
            port: default_proxy_port(),
        }
    }
}

impl ProxyConfig {
    pub fn new(protocol: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            port,
        }
    }

    /// Proxy endpoint as a URL.
    pub fn url(&self) -> Result<Url> {
        let raw = format!("{}://{}:{}", self.protocol, self.address, self.port);
        Url::parse(&raw).map_err(|e| HttpError::InvalidProxy(format!("{raw}: {e}")))
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.protocol.to_ascii_lowercase().as_str(), "http" | "https") {
            return Err(HttpError::InvalidProxy(format!(
                "unsupported proxy protocol '{}'",
                self.protocol
            )));
        }
        if self.address.trim().is_empty() {
            return Err(HttpError::InvalidProxy("proxy address is empty".to_string()));
        }
        if self.port == 0 {
            return Err(HttpError::InvalidProxy("proxy port must be non-zero".to_string()));
        }
        self.url().map(|_| ())
    }
}

/// HTTP client configuration
///
/// Immutable once handed to [`crate::HttpClient`]; every request derives a
/// fresh transport from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Target URL for every request issued by the client
    pub url: String,

    /// Extra request headers (keys are case-sensitive)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Bound applied to connect, connection acquisition and socket read
    #[serde(default = "default_max_connect_timeout")]
    pub max_connect_timeout: Duration,

    /// Additional attempts after the first on retryable failures
    #[serde(default)]
    pub max_retry_times: u32,

    /// Initial retry delay (exponential backoff)
    #[serde(default)]
    pub retry_delay: Duration,

    /// Retry non-idempotent requests that may already have been sent
    #[serde(default = "default_retry_sent_requests")]
    pub retry_sent_requests: bool,

    /// Route requests through `proxy`
    #[serde(default)]
    pub use_proxy: bool,

    /// Proxy endpoint, consulted only when `use_proxy` is set
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Emit request/response trace lines
    #[serde(default = "default_enable_printing")]
    pub enable_printing: bool,

    /// Peer host names accepted during the TLS handshake (empty = any)
    #[serde(default)]
    pub allowed_hostnames: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: BTreeMap::new(),
            max_connect_timeout: default_max_connect_timeout(),
            max_retry_times: 0,
            retry_delay: Duration::ZERO,
            retry_sent_requests: default_retry_sent_requests(),
            use_proxy: false,
            proxy: ProxyConfig::default(),
            enable_printing: default_enable_printing(),
            allowed_hostnames: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Create a config targeting `url` with defaults for everything else
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the connect and per-read bound; zero disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.max_connect_timeout = timeout;
        self
    }

    /// Set retry count
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.max_retry_times = count;
        self
    }

    /// Add a single header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Route through the given proxy
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.use_proxy = true;
        self.proxy = proxy;
        self
    }

    /// Toggle trace output
    pub fn with_printing(mut self, enabled: bool) -> Self {
        self.enable_printing = enabled;
        self
    }

    /// Restrict TLS peers to these host names
    pub fn with_allowed_hostnames<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hostnames = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Parsed target URL.
    pub fn target_url(&self) -> Result<Url> {
        let url = Url::parse(self.url.trim())
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", self.url)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(HttpError::InvalidUrl(format!(
                "unsupported scheme '{other}' in {}",
                self.url
            ))),
        }
    }

    /// Check the invariants a client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(HttpError::InvalidConfig("url is required".to_string()));
        }
        self.target_url()
            .map_err(|e| HttpError::InvalidConfig(e.to_string()))?;
        if self.use_proxy {
            self.proxy
                .validate()
                .map_err(|e| HttpError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }
}

// Default value functions for serde
fn default_max_connect_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_retry_sent_requests() -> bool {
    true
}

fn default_enable_printing() -> bool {
    true
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

fn default_proxy_address() -> String {
    "0.0.0.0".to_string()
}

fn default_proxy_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.max_connect_timeout, Duration::from_millis(30_000));
        assert_eq!(config.max_retry_times, 0);
        assert!(!config.use_proxy);
        assert!(config.enable_printing);
        assert!(config.allowed_hostnames.is_empty());
        assert_eq!(config.proxy, ProxyConfig::new("http", "0.0.0.0", 8080));
    }

    #[test]
    fn test_builder_pattern() {
        let config = HttpConfig::new("https://api.example.com/v1")
            .with_timeout(Duration::from_secs(3))
            .with_retry_count(2)
            .with_header("X-Trace", "abc")
            .with_printing(false)
            .with_allowed_hostnames(["api.example.com"]);

        assert_eq!(config.max_connect_timeout, Duration::from_secs(3));
        assert_eq!(config.max_retry_times, 2);
        assert_eq!(config.headers.get("X-Trace").map(String::as_str), Some("abc"));
        assert!(!config.enable_printing);
        assert_eq!(config.allowed_hostnames, vec!["api.example.com".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let config = HttpConfig::default();
        assert!(matches!(config.validate(), Err(HttpError::InvalidConfig(_))));
    }

    #[test]
    fn test_unsupported_scheme_rejected() {
        let config = HttpConfig::new("ftp://files.example.com/a");
        assert!(config.validate().is_err());
        assert!(matches!(config.target_url(), Err(HttpError::InvalidUrl(_))));
    }

    #[test]
    fn test_proxy_checked_only_when_enabled() {
        let mut config = HttpConfig::new("http://example.com");
        config.proxy = ProxyConfig::new("socks5", "", 0);
        assert!(config.validate().is_ok());

        config.use_proxy = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_proxy_url() {
        let proxy = ProxyConfig::new("http", "10.0.0.1", 3128);
        assert_eq!(proxy.url().unwrap().as_str(), "http://10.0.0.1:3128/");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: HttpConfig =
            serde_json::from_str(r#"{"url":"http://localhost:8081/mock"}"#).unwrap();
        assert_eq!(config.url, "http://localhost:8081/mock");
        assert_eq!(config.max_connect_timeout, Duration::from_millis(30_000));
        assert!(config.retry_sent_requests);
        assert!(config.enable_printing);
        assert_eq!(config.proxy.port, 8080);
    }
}
