//! Blocking outbound HTTP client for tether
//!
//! Issues GET/POST requests against a single configured URL and reports
//! every outcome as a `(status, body)` [`ResponsePair`]; request calls never
//! return an error.
//!
//! ## Features
//!
//! - **Body variants**: JSON, plain text, URL-encoded form, multipart file
//! - **Transport per call**: one bound for connect and each socket read,
//!   bounded retry, optional forward proxy (CONNECT tunnel for HTTPS targets)
//! - **TLS trust policy**: accept-all, platform store or PEM bundle, loaded
//!   once per [`TrustProvider`], plus an optional host name allow-list
//! - **Sentinel statuses**: `0` unknown, `-1` connection refused,
//!   `-999` timeout
//!
//! The default trust policy accepts any server certificate. See
//! [`trust`] before relying on TLS for authentication.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod outcome;
pub mod request;
pub mod route;
pub mod tls;
pub mod transport;
pub mod trust;

pub use client::{shared_client, HttpClient, HttpClientTrait};
pub use config::{HttpConfig, ProxyConfig};
pub use error::{HttpError, Result};
pub use middleware::{RetryConfig, RetryMiddleware};
pub use outcome::{
    FailureKind, ResponsePair, STATUS_CONNECTION_REFUSED, STATUS_CONNECTION_TIMEOUT,
    STATUS_UNKNOWN,
};
pub use request::{RequestBody, RequestSpec};
pub use route::{plan_route, Route};
pub use trust::{TrustContext, TrustLoader, TrustProvider, TrustSource};

/// Re-export commonly used types
pub use reqwest::{header, Method, StatusCode};
