//! Failure classification for RPC and signing errors.
//!
//! Every failure coming back from a chain endpoint is mapped onto a closed
//! taxonomy here and nowhere else. A structured code attached by the transport
//! layer always wins; message heuristics are only consulted when it is absent.

use std::fmt;

use crate::chain::RpcFailure;

/// Substrings identifying a transient network or proxy failure.
const CONNECTION_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "etimedout",
    "econnreset",
    "connection reset",
    "econnrefused",
    "connection refused",
    "connection closed",
    "socket hang up",
    "error sending request",
    "network error",
    "proxy",
    "tunnel",
    "socks",
];

/// Normalized failure codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient transport/proxy failure; retried after a proxy rotation.
    Network,
    InsufficientFunds,
    NonceExpired,
    ReplacementUnderpriced,
    UnpredictableGasLimit,
    /// Included on chain with a failed status.
    Reverted,
    /// Anything else, keyed by the first colon-delimited segment of the message.
    Other(String),
}

/// Coarse grouping used to decide the recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Connection,
    ChainSemantic,
    Unknown,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::Network => ErrorClass::Connection,
            ErrorKind::Other(_) => ErrorClass::Unknown,
            _ => ErrorClass::ChainSemantic,
        }
    }

    pub fn is_connection(&self) -> bool {
        self.class() == ErrorClass::Connection
    }

    /// Rejections a node gives when the same nonce is already in its pool.
    pub fn means_in_flight(&self) -> bool {
        matches!(self, ErrorKind::NonceExpired | ErrorKind::ReplacementUnderpriced)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "NETWORK_ERROR"),
            ErrorKind::InsufficientFunds => write!(f, "INSUFFICIENT_FUNDS"),
            ErrorKind::NonceExpired => write!(f, "NONCE_EXPIRED"),
            ErrorKind::ReplacementUnderpriced => write!(f, "REPLACEMENT_UNDERPRICED"),
            ErrorKind::UnpredictableGasLimit => write!(f, "UNPREDICTABLE_GAS_LIMIT"),
            ErrorKind::Reverted => write!(f, "CALL_EXCEPTION"),
            ErrorKind::Other(segment) => write!(f, "{}", segment),
        }
    }
}

/// Maps a failure onto the taxonomy.
pub fn classify(failure: &RpcFailure) -> ErrorKind {
    if let Some(code) = &failure.code {
        return code.clone();
    }
    classify_message(&failure.message)
}

/// Message-only classification.
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("insufficient funds") {
        ErrorKind::InsufficientFunds
    } else if lower.contains("nonce too low")
        || lower.contains("nonce has already been used")
        || lower.contains("already known")
        || lower.contains("nonce expired")
    {
        ErrorKind::NonceExpired
    } else if lower.contains("replacement transaction underpriced")
        || lower.contains("replacement fee too low")
    {
        ErrorKind::ReplacementUnderpriced
    } else if lower.contains("cannot estimate gas")
        || lower.contains("gas required exceeds")
        || lower.contains("execution reverted")
    {
        ErrorKind::UnpredictableGasLimit
    } else if is_connection_message(&lower) {
        ErrorKind::Network
    } else {
        let segment = message.split(':').next().unwrap_or_default().trim();
        if segment.is_empty() {
            ErrorKind::Other("UNKNOWN_ERROR".to_string())
        } else {
            ErrorKind::Other(segment.to_string())
        }
    }
}

fn is_connection_message(lower: &str) -> bool {
    CONNECTION_SIGNATURES.iter().any(|sig| lower.contains(sig))
}
