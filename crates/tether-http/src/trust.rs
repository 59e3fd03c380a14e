//! Certificate trust material for outbound TLS
//!
//! Trust stores are expensive to parse, so a [`TrustProvider`] resolves its
//! [`TrustContext`] at most once and hands out the same `Arc` afterwards.
//! Clients receive the provider explicitly; [`TrustProvider::shared`] is
//! only the default used by [`crate::HttpClient::new`].
//!
//! **Warning:** the default source is [`TrustSource::AcceptAll`], which
//! accepts any server certificate. Load failures for the other sources
//! also fall back to accept-all. Use [`TrustSource::Platform`] or
//! [`TrustSource::Bundled`] when the peer must actually be authenticated.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::{Lazy, OnceCell};
use rustls::RootCertStore;
use tracing::{debug, error, warn};

use crate::error::{HttpError, Result};

/// File name of the bundled trust store used by option `2`
pub const BUNDLED_TRUST_STORE: &str = "tether_truststore.pem";

/// Where trust anchors come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustSource {
    /// Nothing is loaded; every certificate chain is accepted
    #[default]
    AcceptAll,
    /// Operating system trust store
    Platform,
    /// PEM bundle on disk
    Bundled(PathBuf),
}

impl TrustSource {
    /// Map the numeric trust option: 0 accept-all, 1 platform, 2 bundled.
    /// Unknown options select accept-all.
    pub fn from_option(option: i32) -> Self {
        match option {
            1 => TrustSource::Platform,
            2 => TrustSource::Bundled(PathBuf::from(BUNDLED_TRUST_STORE)),
            _ => TrustSource::AcceptAll,
        }
    }
}

/// Resolved trust material
#[derive(Debug, Clone)]
pub struct TrustContext {
    anchors: Option<Arc<RootCertStore>>,
}

impl TrustContext {
    /// Context that accepts every certificate chain.
    pub fn accept_all() -> Self {
        Self { anchors: None }
    }

    /// Context that verifies chains against `roots`.
    pub fn from_roots(roots: RootCertStore) -> Self {
        Self {
            anchors: Some(Arc::new(roots)),
        }
    }

    /// Trust anchors, or `None` when chains are not verified.
    pub fn anchors(&self) -> Option<Arc<RootCertStore>> {
        self.anchors.clone()
    }

    pub fn is_accept_all(&self) -> bool {
        self.anchors.is_none()
    }
}

/// Loads a root store for a trust source
pub trait TrustLoader: Send + Sync {
    fn load(&self, source: &TrustSource) -> Result<RootCertStore>;
}

/// Loader backed by the OS store and PEM files
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrustLoader;

impl TrustLoader for SystemTrustLoader {
    fn load(&self, source: &TrustSource) -> Result<RootCertStore> {
        match source {
            TrustSource::AcceptAll => Ok(RootCertStore::empty()),
            TrustSource::Platform => load_platform_roots(),
            TrustSource::Bundled(path) => load_pem_roots(path),
        }
    }
}

fn load_platform_roots() -> Result<RootCertStore> {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        warn!("Skipping unreadable platform certificate: {err}");
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    debug!("Loaded {added} platform trust anchors ({ignored} ignored)");
    Ok(roots)
}

fn load_pem_roots(path: &Path) -> Result<RootCertStore> {
    let file = File::open(path)
        .map_err(|e| HttpError::TrustStore(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| HttpError::TrustStore(format!("{}: {e}", path.display())))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    debug!("Loaded {added} trust anchors from {} ({ignored} ignored)", path.display());
    Ok(roots)
}

/// Load-once holder for a [`TrustContext`]
pub struct TrustProvider {
    source: TrustSource,
    loader: Arc<dyn TrustLoader>,
    context: OnceCell<Arc<TrustContext>>,
}

static SHARED: Lazy<Arc<TrustProvider>> =
    Lazy::new(|| Arc::new(TrustProvider::new(TrustSource::default())));

impl TrustProvider {
    /// Provider using the system loader
    pub fn new(source: TrustSource) -> Self {
        Self::with_loader(source, Arc::new(SystemTrustLoader))
    }

    /// Provider with a custom loader
    pub fn with_loader(source: TrustSource, loader: Arc<dyn TrustLoader>) -> Self {
        Self {
            source,
            loader,
            context: OnceCell::new(),
        }
    }

    /// Process-wide default provider (accept-all).
    pub fn shared() -> Arc<TrustProvider> {
        SHARED.clone()
    }

    pub fn source(&self) -> &TrustSource {
        &self.source
    }

    /// Resolve the trust context, loading it on first use.
    ///
    /// Concurrent first callers block until the single load finishes.
    pub fn get(&self) -> Arc<TrustContext> {
        self.context
            .get_or_init(|| Arc::new(self.resolve()))
            .clone()
    }

    fn resolve(&self) -> TrustContext {
        if self.source == TrustSource::AcceptAll {
            warn!("TLS certificate validation is disabled; every server certificate is accepted");
            return TrustContext::accept_all();
        }

        match self.loader.load(&self.source) {
            Ok(roots) if !roots.is_empty() => TrustContext::from_roots(roots),
            Ok(_) => {
                warn!(
                    "Trust source {:?} yielded no certificates; accepting every server certificate",
                    self.source
                );
                TrustContext::accept_all()
            }
            Err(e) => {
                error!(
                    "Failed to load trust source {:?}: {e}; accepting every server certificate",
                    self.source
                );
                TrustContext::accept_all()
            }
        }
    }
}

impl std::fmt::Debug for TrustProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustProvider")
            .field("source", &self.source)
            .field("loaded", &self.context.get().is_some())
            .finish()
    }
}
