//! One-shot request execution
//!
//! [`execute`] never fails: every error path ends in a [`ResponsePair`]
//! carrying either the peer's status or a sentinel code. The response
//! trace is emitted from a drop guard so it runs on every exit path.

use tracing::{error, info};

use crate::{
    config::HttpConfig,
    error::{HttpError, Result},
    outcome::{FailureKind, ResponsePair, STATUS_UNKNOWN},
    request::RequestSpec,
    route::plan_route,
    transport::Transport,
    trust::TrustContext,
};

const SYMBOL_UNROUTED: &str = " ?> ";

/// Run `spec` against `config`'s target and capture the outcome.
pub fn execute(config: &HttpConfig, trust: &TrustContext, spec: &RequestSpec) -> ResponsePair {
    let mut trace = ResponseTrace::new(config.enable_printing, trace_symbol(config));
    trace.request(config, spec);

    let pair = match run(config, trust, spec) {
        Ok(pair) => pair,
        Err(e) => {
            error!("[{}] {} {}: {e}", error_label(&e), spec.method(), config.url);
            ResponsePair::sentinel(FailureKind::classify(&e))
        }
    };

    trace.record(&pair);
    pair
}

fn run(config: &HttpConfig, trust: &TrustContext, spec: &RequestSpec) -> Result<ResponsePair> {
    let transport = Transport::build(config, trust)?;
    let response = transport.send(spec.method(), |client| spec.build(client, config))?;
    let status = i32::from(response.status().as_u16());

    match transport.read_text(response) {
        Ok(body) => Ok(ResponsePair::new(status, Some(body))),
        Err(err) => {
            error!("[{}] reading body of {}: {err}", error_label(&err), config.url);
            match FailureKind::classify(&err) {
                FailureKind::Unknown => Ok(ResponsePair::new(status, None)),
                kind => Ok(ResponsePair::sentinel(kind)),
            }
        }
    }
}

fn trace_symbol(config: &HttpConfig) -> &'static str {
    config
        .target_url()
        .and_then(|target| plan_route(&target, config))
        .map(|route| route.symbol())
        .unwrap_or(SYMBOL_UNROUTED)
}

fn error_label(err: &HttpError) -> &'static str {
    match err.root() {
        HttpError::RequestFailed(e) if e.is_timeout() => "timeout",
        HttpError::RequestFailed(e) if e.is_connect() => "connect",
        HttpError::RequestFailed(_) => "request",
        HttpError::InvalidUrl(_) => "url",
        HttpError::InvalidProxy(_) => "proxy",
        HttpError::InvalidHeader { .. } => "header",
        HttpError::InvalidConfig(_) => "config",
        HttpError::Tls(_) | HttpError::TrustStore(_) => "tls",
        HttpError::Io(_) => "io",
        HttpError::Serialization(_) => "serialization",
        HttpError::BuildError(_) => "build",
        HttpError::RetryLimitExceeded { .. } => "retry",
    }
}

/// Emits the request line up front and the response line on drop
struct ResponseTrace {
    enabled: bool,
    symbol: &'static str,
    status: i32,
    body: Option<String>,
}

impl ResponseTrace {
    fn new(enabled: bool, symbol: &'static str) -> Self {
        Self {
            enabled,
            symbol,
            status: STATUS_UNKNOWN,
            body: None,
        }
    }

    fn request(&self, config: &HttpConfig, spec: &RequestSpec) {
        if !self.enabled {
            return;
        }
        let line = format!("{} {} HTTP/1.1", spec.method(), config.url);
        match spec.body().describe() {
            Some(body) => info!("\nHTTP REQ {}{line}\nHTTP REQ {}{body}", self.symbol, self.symbol),
            None => info!("\nHTTP REQ {}{line}", self.symbol),
        }
    }

    fn record(&mut self, pair: &ResponsePair) {
        self.status = pair.status;
        if self.enabled {
            self.body = pair.body.clone();
        }
    }
}

impl Drop for ResponseTrace {
    fn drop(&mut self) {
        if self.enabled {
            info!(
                "\nHTTP RESP{}({})\nHTTP RESP{}{}",
                self.symbol,
                self.status,
                self.symbol,
                self.body.as_deref().unwrap_or("None")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    #[test]
    fn test_invalid_url_is_unknown() {
        let config = HttpConfig::new("::not-a-url::").with_printing(false);
        let pair = execute(&config, &TrustContext::accept_all(), &RequestSpec::get());

        assert_eq!(pair.status, STATUS_UNKNOWN);
        assert!(pair.body.is_none());
    }

    #[test]
    fn test_invalid_header_is_unknown() {
        let config = HttpConfig::new("http://127.0.0.1:9/")
            .with_header("Bad Header", "x")
            .with_printing(true);
        let pair = execute(
            &config,
            &TrustContext::accept_all(),
            &RequestSpec::post_text("hello"),
        );

        assert_eq!(pair.status, STATUS_UNKNOWN);
        assert!(pair.body.is_none());
    }

    #[test]
    fn test_trace_symbol() {
        let direct = HttpConfig::new("http://example.com");
        assert_eq!(trace_symbol(&direct), " -> ");

        let proxied = HttpConfig::new("http://example.com")
            .with_proxy(ProxyConfig::new("http", "127.0.0.1", 3128));
        assert_eq!(trace_symbol(&proxied), " +> ");

        assert_eq!(trace_symbol(&HttpConfig::new("nope")), SYMBOL_UNROUTED);
    }

    #[test]
    fn test_error_label_unwraps_retry() {
        let err = HttpError::RetryLimitExceeded {
            attempts: 2,
            last: Box::new(HttpError::InvalidProxy("x".into())),
        };
        assert_eq!(error_label(&err), "proxy");
    }
}
