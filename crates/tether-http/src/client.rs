//! HTTP client implementation

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::Serialize;
use tracing::{debug, error};

use crate::{
    config::{HttpConfig, ProxyConfig},
    error::{HttpError, Result},
    executor,
    outcome::{self, FailureKind, ResponsePair, STATUS_UNKNOWN},
    request::RequestSpec,
    trust::TrustProvider,
};

/// Mockable HTTP client trait
pub trait HttpClientTrait: Send + Sync {
    /// Execute a GET request
    fn get(&self) -> ResponsePair;

    /// POST a JSON document
    fn post_json(&self, json: &str) -> ResponsePair;

    /// POST plain text
    fn post_text(&self, text: &str) -> ResponsePair;

    /// POST URL-encoded form fields
    fn post_form(&self, fields: &[(String, String)]) -> ResponsePair;

    /// Upload a file as multipart form data
    fn post_file(&self, path: &Path) -> ResponsePair;

    /// Whether the last recorded status is 2xx
    fn is_successful(&self) -> bool;
}

/// Production HTTP client
///
/// Calls block the current thread until the round trip completes or the
/// configured timeout elapses. Each call builds its own transport, so a
/// client may be shared across threads; the last-status field is a
/// best-effort diagnostic only.
#[derive(Debug)]
pub struct HttpClient {
    config: HttpConfig,
    trust: Arc<TrustProvider>,
    last_status: AtomicI32,
}

impl HttpClient {
    /// Create a new HTTP client using the process default trust provider
    pub fn new(config: HttpConfig) -> Result<Self> {
        Self::with_trust(config, TrustProvider::shared())
    }

    /// Create a new HTTP client with an injected trust provider
    pub fn with_trust(config: HttpConfig, trust: Arc<TrustProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            trust,
            last_status: AtomicI32::new(STATUS_UNKNOWN),
        })
    }

    /// Serialize `value` and POST it as JSON
    pub fn post_json_value<T: Serialize + ?Sized>(&self, value: &T) -> ResponsePair {
        match serde_json::to_string(value) {
            Ok(json) => self.post_json(&json),
            Err(e) => {
                let err = HttpError::Serialization(e);
                error!("Cannot serialize request body for {}: {err}", self.config.url);
                self.finish(ResponsePair::sentinel(FailureKind::classify(&err)))
            }
        }
    }

    /// HTTP 2xx check
    pub fn is_status_successful(status: i32) -> bool {
        outcome::is_status_successful(status)
    }

    /// Last status recorded by any call on this client
    pub fn last_status(&self) -> i32 {
        self.last_status.load(Ordering::Relaxed)
    }

    /// Get configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.config.headers
    }

    pub fn max_connect_timeout(&self) -> Duration {
        self.config.max_connect_timeout
    }

    pub fn max_retry_times(&self) -> u32 {
        self.config.max_retry_times
    }

    pub fn use_proxy(&self) -> bool {
        self.config.use_proxy
    }

    pub fn proxy(&self) -> &ProxyConfig {
        &self.config.proxy
    }

    pub fn enable_printing(&self) -> bool {
        self.config.enable_printing
    }

    pub fn trust(&self) -> &Arc<TrustProvider> {
        &self.trust
    }

    fn send(&self, spec: RequestSpec) -> ResponsePair {
        debug!("HTTP {}: {}", spec.method(), self.config.url);
        let trust = self.trust.get();
        self.finish(executor::execute(&self.config, &trust, &spec))
    }

    fn finish(&self, pair: ResponsePair) -> ResponsePair {
        self.last_status.store(pair.status, Ordering::Relaxed);
        pair
    }
}

impl HttpClientTrait for HttpClient {
    fn get(&self) -> ResponsePair {
        self.send(RequestSpec::get())
    }

    fn post_json(&self, json: &str) -> ResponsePair {
        self.send(RequestSpec::post_json(json))
    }

    fn post_text(&self, text: &str) -> ResponsePair {
        self.send(RequestSpec::post_text(text))
    }

    fn post_form(&self, fields: &[(String, String)]) -> ResponsePair {
        self.send(RequestSpec::post_form(fields))
    }

    fn post_file(&self, path: &Path) -> ResponsePair {
        match RequestSpec::post_file(path) {
            Ok(spec) => self.send(spec),
            Err(e) => {
                error!("Cannot read upload {}: {e}", path.display());
                self.finish(ResponsePair::sentinel(FailureKind::classify(&e)))
            }
        }
    }

    fn is_successful(&self) -> bool {
        outcome::is_status_successful(self.last_status())
    }
}

/// Create a shared HTTP client (Arc-wrapped for cloning)
pub fn shared_client(config: HttpConfig) -> Result<Arc<dyn HttpClientTrait>> {
    Ok(Arc::new(HttpClient::new(config)?))
}
