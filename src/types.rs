//! Core type definitions shared by the chain client and the operation scripts.
//!
//! This module contains the network/direction identifiers, the transaction
//! result envelope and the outcome types reported by operations.

use alloy::primitives::{TxHash, U256};
use core::fmt;
use std::str::FromStr;

use crate::{classify::ErrorKind, error::WalletError};

/// One of the two networks a wallet session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    /// The primary testnet.
    Home,
    /// Its configured counterpart.
    Companion,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Home, Network::Companion];

    pub fn counterpart(self) -> Network {
        match self {
            Network::Home => Network::Companion,
            Network::Companion => Network::Home,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Home => write!(f, "home"),
            Network::Companion => write!(f, "companion"),
        }
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Network::Home),
            "companion" => Ok(Network::Companion),
            other => Err(WalletError::InvalidConfig(format!(
                "unknown network '{}', expected 'home' or 'companion'",
                other
            ))),
        }
    }
}

/// Bridge direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    HomeToCompanion,
    CompanionToHome,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::HomeToCompanion, Direction::CompanionToHome];

    pub fn source(self) -> Network {
        match self {
            Direction::HomeToCompanion => Network::Home,
            Direction::CompanionToHome => Network::Companion,
        }
    }

    pub fn destination(self) -> Network {
        self.source().counterpart()
    }

    /// Whether the destination is credited some time after the funding
    /// transaction lands, so completion has to be observed by polling.
    pub fn settles_asynchronously(self) -> bool {
        matches!(self, Direction::HomeToCompanion)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.destination())
    }
}

/// The parts of an inclusion receipt the operations care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// `false` when the transaction was included but reverted.
    pub status: bool,
}

/// Outcome of a single `send_transaction` call.
#[derive(Debug, Clone)]
pub enum TxResult {
    Success {
        tx_hash: TxHash,
        receipt: ReceiptSummary,
    },
    Failure {
        kind: ErrorKind,
        message: String,
        /// The unmodified error text as reported by the transport or node.
        raw_error: String,
    },
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success { .. })
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            TxResult::Success { tx_hash, .. } => Some(*tx_hash),
            TxResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<&ErrorKind> {
        match self {
            TxResult::Success { .. } => None,
            TxResult::Failure { kind, .. } => Some(kind),
        }
    }
}

/// A balance read that never fails: on error the value is zero and `error`
/// carries the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReading {
    pub wei: U256,
    /// Decimal ETH representation of `wei`.
    pub formatted: String,
    pub error: Option<String>,
}

impl BalanceReading {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of one operation (a transfer or a single bridge direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Completed {
        tx_hash: TxHash,
        /// `false` when settlement on the destination could not be observed in time.
        settled: bool,
    },
    Skipped(String),
    Failed(String),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Completed { .. })
    }
}

/// Tally of a batch of operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub success_count: usize,
    pub total_operations: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &OperationOutcome) {
        self.total_operations += 1;
        if outcome.is_success() {
            self.success_count += 1;
        }
    }

    /// A batch succeeds when at least one of its operations did.
    pub fn succeeded(&self) -> bool {
        self.success_count > 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.success_count, self.total_operations)
    }
}
