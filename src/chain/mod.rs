//! Chain access: the RPC seam, gas pricing and the per-network client.
//!
//! ```text
//! operations / bridge
//!     → ChainClient (nonce cache, gas policy, retries, proxy rotation)
//!     → dyn ChainRpc (one endpoint, one proxy, signing)
//!     → AlloyRpc over a proxied reqwest transport
//! ```

pub mod client;
pub mod gas;
pub mod rpc;

use std::sync::Arc;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    classify::ErrorKind, config::NetworkConfig, error::Result, proxy::ProxyEndpoint,
    types::ReceiptSummary,
};

pub use client::ChainClient;
pub use gas::GasQuote;
pub use rpc::{AlloyConnector, AlloyRpc};

/// A failed RPC or signing call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RpcFailure {
    /// Set when the layer that failed already knows what kind of failure it is.
    pub code: Option<ErrorKind>,
    pub message: String,
}

impl RpcFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_code(ErrorKind::Network, message)
    }
}

pub type RpcResult<T> = std::result::Result<T, RpcFailure>;

/// One network endpoint, reached through one transport configuration.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn transaction_count(&self, address: Address) -> RpcResult<u64>;

    /// Current network gas price in wei.
    async fn gas_price(&self) -> RpcResult<u128>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> RpcResult<u64>;

    async fn balance(&self, address: Address) -> RpcResult<U256>;

    /// Signs `tx` with the loaded key and broadcasts it.
    async fn send_transaction(&self, tx: TransactionRequest) -> RpcResult<TxHash>;

    /// Blocks until the transaction is included.
    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<ReceiptSummary>;

    /// Non-blocking receipt lookup.
    async fn receipt(&self, hash: TxHash) -> RpcResult<Option<ReceiptSummary>>;
}

/// Builds [`ChainRpc`] handles; called again on every proxy change.
pub trait RpcConnector: Send + Sync {
    fn connect(
        &self,
        network: &NetworkConfig,
        proxy: Option<&ProxyEndpoint>,
        signer: Option<&EthereumWallet>,
    ) -> Result<Arc<dyn ChainRpc>>;
}
