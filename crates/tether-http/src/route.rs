//! Route planning
//!
//! Deciding how a request reaches its target is a pure function of the
//! target scheme and the proxy settings; it never looks at earlier
//! failures.

use reqwest::ClientBuilder;
use url::Url;

use crate::{
    config::HttpConfig,
    error::{HttpError, Result},
};

const SYMBOL_DIRECT: &str = " -> ";
const SYMBOL_WITH_PROXY: &str = " +> ";

/// How a request physically reaches its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Connect straight to the target
    Direct,
    /// Go through a forward proxy
    Proxied {
        proxy: Url,
        /// CONNECT tunnel through the proxy
        tunnelled: bool,
        /// TLS layered on top of the tunnel
        layered: bool,
    },
}

impl Route {
    pub fn is_tunnelled(&self) -> bool {
        matches!(self, Route::Proxied { tunnelled: true, .. })
    }

    /// Trace marker for this route.
    pub fn symbol(&self) -> &'static str {
        match self {
            Route::Direct => SYMBOL_DIRECT,
            Route::Proxied { .. } => SYMBOL_WITH_PROXY,
        }
    }

    /// Install the route on a client builder.
    ///
    /// The transport tunnels HTTPS targets with CONNECT and forwards plain
    /// HTTP requests in absolute form, which is exactly the route shape
    /// [`plan_route`] produces. Environment proxies are never consulted.
    pub fn apply(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        match self {
            Route::Direct => Ok(builder.no_proxy()),
            Route::Proxied { proxy, .. } => {
                let proxy = reqwest::Proxy::all(proxy.as_str())
                    .map_err(|e| HttpError::InvalidProxy(e.to_string()))?;
                Ok(builder.proxy(proxy))
            }
        }
    }
}

/// Pick the route for `target` under `config`.
pub fn plan_route(target: &Url, config: &HttpConfig) -> Result<Route> {
    if !config.use_proxy {
        return Ok(Route::Direct);
    }

    let secure = target.scheme().eq_ignore_ascii_case("https");
    Ok(Route::Proxied {
        proxy: config.proxy.url()?,
        tunnelled: secure,
        layered: secure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn test_direct_without_proxy() {
        let config = HttpConfig::new("https://example.com");
        let route = plan_route(&url("https://example.com"), &config).unwrap();
        assert_eq!(route, Route::Direct);
        assert_eq!(route.symbol(), " -> ");
        assert!(!route.is_tunnelled());
    }

    #[test]
    fn test_https_target_is_tunnelled() {
        let config = HttpConfig::new("https://example.com")
            .with_proxy(ProxyConfig::new("http", "10.1.1.1", 3128));
        let route = plan_route(&url("https://example.com/a"), &config).unwrap();

        assert_eq!(
            route,
            Route::Proxied {
                proxy: url("http://10.1.1.1:3128"),
                tunnelled: true,
                layered: true,
            }
        );
        assert_eq!(route.symbol(), " +> ");
    }

    #[test]
    fn test_http_target_is_plain_proxied() {
        let config = HttpConfig::new("http://example.com")
            .with_proxy(ProxyConfig::new("http", "10.1.1.1", 3128));
        let route = plan_route(&url("http://example.com/a"), &config).unwrap();

        assert!(matches!(
            route,
            Route::Proxied {
                tunnelled: false,
                layered: false,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_proxy_is_error() {
        let config = HttpConfig::new("http://example.com")
            .with_proxy(ProxyConfig::new("http", "bad host", 1));
        assert!(plan_route(&url("http://example.com"), &config).is_err());
    }

    #[test]
    fn test_apply_routes() {
        let builder = reqwest::Client::builder();
        assert!(Route::Direct.apply(builder).is_ok());

        let route = Route::Proxied {
            proxy: url("http://127.0.0.1:3128"),
            tunnelled: true,
            layered: true,
        };
        assert!(route.apply(reqwest::Client::builder()).is_ok());
    }
}
