//! Request outcomes and failure classification
//!
//! Every request call ends in a [`ResponsePair`]. Failures that never
//! produced an HTTP response are folded into one of three sentinel status
//! codes by [`FailureKind::classify`].

use std::{error::Error as StdError, io};

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

/// Status has not been determined
pub const STATUS_UNKNOWN: i32 = 0;

/// The peer actively refused the TCP connection
pub const STATUS_CONNECTION_REFUSED: i32 = -1;

/// Connect or read exceeded the configured bound
pub const STATUS_CONNECTION_TIMEOUT: i32 = -999;

/// `(status, body)` result of one request call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePair {
    /// Real HTTP status (100-599) or one of the sentinel codes
    pub status: i32,
    /// Response payload; `None` unless a response was received
    pub body: Option<String>,
}

impl ResponsePair {
    pub fn new(status: i32, body: Option<String>) -> Self {
        Self { status, body }
    }

    /// Pair for a failure that never reached the peer.
    pub fn sentinel(kind: FailureKind) -> Self {
        Self {
            status: kind.status_code(),
            body: None,
        }
    }

    /// Whether the status lies in the 2xx range.
    pub fn is_successful(&self) -> bool {
        is_status_successful(self.status)
    }

    /// Whether the status is one of the non-HTTP sentinel codes.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self.status,
            STATUS_UNKNOWN | STATUS_CONNECTION_REFUSED | STATUS_CONNECTION_TIMEOUT
        )
    }
}

/// HTTP 2xx check.
pub fn is_status_successful(status: i32) -> bool {
    (200..=299).contains(&status)
}

/// Class of failure a request call may end in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The peer answered with this status through an error path
    Status(u16),
    /// TCP connection refused
    ConnectionRefused,
    /// Connect or socket read timed out
    Timeout,
    /// Anything else: malformed URL, TLS handshake failure, unexpected I/O
    Unknown,
}

impl FailureKind {
    /// Status code reported for this failure class.
    pub fn status_code(&self) -> i32 {
        match self {
            FailureKind::Status(code) => i32::from(*code),
            FailureKind::ConnectionRefused => STATUS_CONNECTION_REFUSED,
            FailureKind::Timeout => STATUS_CONNECTION_TIMEOUT,
            FailureKind::Unknown => STATUS_UNKNOWN,
        }
    }

    /// Map an error onto its failure class.
    ///
    /// The table is explicit on purpose: every [`HttpError`] variant is
    /// listed, so adding one forces a decision here.
    pub fn classify(error: &HttpError) -> FailureKind {
        match error {
            HttpError::RequestFailed(err) => classify_transport(err),
            HttpError::RetryLimitExceeded { last, .. } => FailureKind::classify(last),
            HttpError::Io(err) => classify_io(err.kind()),
            HttpError::InvalidUrl(_)
            | HttpError::InvalidProxy(_)
            | HttpError::InvalidHeader { .. }
            | HttpError::InvalidConfig(_)
            | HttpError::Tls(_)
            | HttpError::TrustStore(_)
            | HttpError::Serialization(_)
            | HttpError::BuildError(_) => FailureKind::Unknown,
        }
    }
}

fn classify_transport(err: &reqwest::Error) -> FailureKind {
    if let Some(status) = err.status() {
        return FailureKind::Status(status.as_u16());
    }

    if err.is_timeout() {
        return FailureKind::Timeout;
    }

    io_kinds(err)
        .map(classify_io)
        .find(|kind| *kind != FailureKind::Unknown)
        .unwrap_or(FailureKind::Unknown)
}

fn classify_io(kind: io::ErrorKind) -> FailureKind {
    match kind {
        io::ErrorKind::ConnectionRefused => FailureKind::ConnectionRefused,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,
        _ => FailureKind::Unknown,
    }
}

/// Walk an error and all of its sources.
pub(crate) fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// Kinds of every `io::Error` in the source chain of a transport error.
pub(crate) fn io_kinds(err: &reqwest::Error) -> impl Iterator<Item = io::ErrorKind> + '_ {
    chain(err).filter_map(|e| e.downcast_ref::<io::Error>().map(io::Error::kind))
}

/// Whether the failure came out of the TLS layer.
pub(crate) fn is_tls_failure(err: &reqwest::Error) -> bool {
    chain(err).any(|e| {
        e.downcast_ref::<rustls::Error>().is_some()
            || e.downcast_ref::<io::Error>()
                .and_then(|io| io.get_ref())
                .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some())
    })
}
