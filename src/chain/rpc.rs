//! alloy-backed [`ChainRpc`] over a proxied HTTP transport.

use std::{sync::Arc, time::Duration};

use alloy::{
    network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    providers::{PendingTransactionBuilder, Provider, RootProvider},
    rpc::client::RpcClient,
    transports::http::Http,
};
use alloy_json_rpc::RpcError;
use alloy_rpc_types::TransactionRequest;
use alloy_transport::TransportError;
use async_trait::async_trait;
use tracing::debug;

use crate::{
    chain::{ChainRpc, RpcConnector, RpcFailure, RpcResult},
    config::NetworkConfig,
    error::{Result, WalletError},
    proxy::{build_http_client, ProxyEndpoint, ProxyMode},
    types::ReceiptSummary,
};

/// How long `wait_for_receipt` watches a broadcast before giving up.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

pub struct AlloyRpc {
    provider: RootProvider<Ethereum>,
    signer: Option<EthereumWallet>,
    receipt_timeout: Duration,
}

impl AlloyRpc {
    pub fn new(
        provider: RootProvider<Ethereum>,
        signer: Option<EthereumWallet>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            signer,
            receipt_timeout,
        }
    }

    /// Maps a transport-level failure. Node error responses keep their
    /// message so classification sees the node's wording.
    pub fn from_transport(err: TransportError) -> RpcFailure {
        match &err {
            RpcError::Transport(kind) => RpcFailure::network(kind.to_string()),
            RpcError::ErrorResp(payload) => {
                RpcFailure::new(format!("{} (code {})", payload.message, payload.code))
            }
            _ => RpcFailure::new(err.to_string()),
        }
    }
}

fn summarize<R: ReceiptResponse>(receipt: &R) -> ReceiptSummary {
    ReceiptSummary {
        tx_hash: receipt.transaction_hash(),
        block_number: receipt.block_number(),
        gas_used: receipt.gas_used(),
        status: receipt.status(),
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    async fn transaction_count(&self, address: Address) -> RpcResult<u64> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(Self::from_transport)
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        self.provider
            .get_gas_price()
            .await
            .map_err(Self::from_transport)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> RpcResult<u64> {
        self.provider
            .estimate_gas(tx.clone())
            .await
            .map_err(Self::from_transport)
    }

    async fn balance(&self, address: Address) -> RpcResult<U256> {
        self.provider
            .get_balance(address)
            .await
            .map_err(Self::from_transport)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> RpcResult<TxHash> {
        let wallet = self
            .signer
            .as_ref()
            .ok_or_else(|| RpcFailure::new("no signing key loaded for this client"))?;
        let envelope = tx
            .build(wallet)
            .await
            .map_err(|e| RpcFailure::new(format!("failed to sign transaction: {}", e)))?;
        let pending = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(Self::from_transport)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<ReceiptSummary> {
        let receipt = PendingTransactionBuilder::new(self.provider.clone(), hash)
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| RpcFailure::new(format!("receipt wait for {} failed: {}", hash, e)))?;
        Ok(summarize(&receipt))
    }

    async fn receipt(&self, hash: TxHash) -> RpcResult<Option<ReceiptSummary>> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(Self::from_transport)?;
        Ok(receipt.as_ref().map(summarize))
    }
}

/// Connects [`AlloyRpc`] handles through a fresh HTTP client per proxy.
#[derive(Debug, Clone)]
pub struct AlloyConnector {
    mode: ProxyMode,
    timeout: Duration,
    receipt_timeout: Duration,
}

impl AlloyConnector {
    pub fn new(mode: ProxyMode, timeout: Duration) -> Self {
        Self {
            mode,
            timeout,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        }
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }
}

impl RpcConnector for AlloyConnector {
    fn connect(
        &self,
        network: &NetworkConfig,
        proxy: Option<&ProxyEndpoint>,
        signer: Option<&EthereumWallet>,
    ) -> Result<Arc<dyn ChainRpc>> {
        let url = network.rpc_url.parse::<reqwest::Url>().map_err(|e| {
            WalletError::InvalidConfig(format!("{} rpc url '{}': {}", network.name, network.rpc_url, e))
        })?;
        let client = build_http_client(proxy, self.mode, self.timeout)?;
        let transport = Http::with_client(client, url);
        let provider = RootProvider::<Ethereum>::new(RpcClient::new(transport, false));
        debug!(
            network = %network.name,
            proxy = ?proxy.map(ToString::to_string),
            "Built RPC transport"
        );
        Ok(Arc::new(AlloyRpc::new(
            provider,
            signer.cloned(),
            self.receipt_timeout,
        )))
    }
}
