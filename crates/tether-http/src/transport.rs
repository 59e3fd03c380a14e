//! Per-call transport assembly
//!
//! A [`Transport`] bundles the route, timeout, TLS and retry decisions for
//! one request call. It is built fresh from the immutable
//! [`HttpConfig`] every time and dropped when the call returns.
//!
//! The transport owns a current-thread runtime and drives the async reqwest
//! client on it, so callers still block for the whole round trip.

use std::time::Duration;

use reqwest::{Client, Method, Request, Response};
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};
use tracing::debug;

use crate::{
    config::HttpConfig,
    error::{HttpError, Result},
    middleware::{RetryConfig, RetryMiddleware},
    route::{plan_route, Route},
    tls,
    trust::TrustContext,
};

/// Executable transport for one request call
#[derive(Debug)]
pub struct Transport {
    client: Client,
    runtime: Runtime,
    route: Route,
    timeout: Option<Duration>,
    retry: RetryMiddleware,
}

impl Transport {
    /// Assemble a transport from `config` and the shared trust material.
    pub fn build(config: &HttpConfig, trust: &TrustContext) -> Result<Self> {
        let target = config.target_url()?;
        let route = plan_route(&target, config)?;
        let tls = tls::client_config(trust, &config.allowed_hostnames)?;
        let timeout = effective_timeout(config.max_connect_timeout);

        let mut builder = Client::builder()
            .pool_max_idle_per_host(0)
            .use_preconfigured_tls(tls);

        // One bound for connect and for every socket read; zero means unbounded.
        if let Some(timeout) = timeout {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }

        let client = route
            .apply(builder)?
            .build()
            .map_err(|e| HttpError::BuildError(e.to_string()))?;

        let runtime = RuntimeBuilder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HttpError::BuildError(e.to_string()))?;

        debug!("Transport ready: route={:?}, timeout={:?}", route, timeout);

        Ok(Self {
            client,
            runtime,
            route,
            timeout,
            retry: RetryMiddleware::new(RetryConfig::from_http_config(config)),
        })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Connect and per-read bound, `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn retry(&self) -> &RetryMiddleware {
        &self.retry
    }

    /// Send a request, rebuilding it for each attempt the retry policy allows.
    pub fn send<F>(&self, method: &Method, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<Request>,
    {
        let mut attempt = 0u32;
        self.retry.execute(method, || {
            attempt += 1;
            debug!("{method} attempt {attempt}");
            let request = build(&self.client)?;
            self.runtime
                .block_on(async { self.client.execute(request).await })
                .map_err(HttpError::RequestFailed)
        })
    }

    /// Read the full response body as text.
    pub fn read_text(&self, response: Response) -> Result<String> {
        self.runtime
            .block_on(response.text())
            .map_err(HttpError::RequestFailed)
    }
}

fn effective_timeout(configured: Duration) -> Option<Duration> {
    if configured.is_zero() {
        None
    } else {
        Some(configured)
    }
}
