//! Per-network chain client.
//!
//! # Responsibilities
//! - Keep the local nonce cache for one account on one network
//! - Price transactions (multiplier, retry escalation, min/max clamps)
//! - Estimate gas with a safety buffer
//! - Sign, broadcast and await transactions, reporting a [`TxResult`]
//! - Rotate the proxy and rebuild the transport on connection failures
//!
//! Lookups (gas price, gas estimate, balance) never fail outward: they fall
//! back to the configured minimum price, the default gas limit, or a zero
//! balance. Only `send_transaction` reports a failure.

use std::sync::Arc;

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, TxHash, U256},
    rpc::types::TransactionRequest,
};
use tracing::{debug, error, info, warn};

use crate::{
    chain::{
        gas::{buffered_gas_limit, gwei_to_wei, wei_to_gwei, GasQuote},
        ChainRpc, RpcConnector, RpcResult,
    },
    classify::{classify, ErrorKind},
    config::{GasSettings, NetworkConfig},
    error::Result,
    proxy::{ProxyEndpoint, ProxyPool},
    types::{BalanceReading, Network, ReceiptSummary, TxResult},
    utils::format_eth,
};

/// Retries allowed after a connection-class failure, each preceded by a proxy rotation.
pub const MAX_PROXY_RETRIES: u32 = 3;

pub struct ChainClient {
    network: Network,
    config: NetworkConfig,
    gas: GasSettings,
    address: Address,
    signer: Option<EthereumWallet>,
    pool: Arc<ProxyPool>,
    connector: Arc<dyn RpcConnector>,
    rpc: Arc<dyn ChainRpc>,
    cached_nonce: Option<u64>,
}

impl ChainClient {
    /// Connects to the network through the pool's current proxy.
    pub fn new(
        network: Network,
        config: NetworkConfig,
        gas: GasSettings,
        address: Address,
        signer: Option<EthereumWallet>,
        pool: Arc<ProxyPool>,
        connector: Arc<dyn RpcConnector>,
    ) -> Result<Self> {
        let proxy = pool.current();
        let rpc = connector.connect(&config, proxy.as_ref(), signer.as_ref())?;
        debug!(
            network = %network,
            name = %config.name,
            proxy = ?proxy.as_ref().map(ToString::to_string),
            "Chain client connected"
        );
        Ok(Self {
            network,
            config,
            gas,
            address,
            signer,
            pool,
            connector,
            rpc,
            cached_nonce: None,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn cached_nonce(&self) -> Option<u64> {
        self.cached_nonce
    }

    /// Cached nonce, or the account's transaction count when nothing is cached.
    pub async fn get_nonce(&mut self) -> RpcResult<u64> {
        if let Some(nonce) = self.cached_nonce {
            return Ok(nonce);
        }
        let nonce = self.rpc.transaction_count(self.address).await?;
        debug!(network = %self.network, nonce, "Fetched nonce from chain");
        self.cached_nonce = Some(nonce);
        Ok(nonce)
    }

    pub fn increment_nonce(&mut self) {
        if let Some(nonce) = self.cached_nonce.as_mut() {
            *nonce += 1;
        }
    }

    pub fn reset_nonce(&mut self) {
        self.cached_nonce = None;
    }

    fn min_gas_price(&self) -> u128 {
        gwei_to_wei(self.config.min_gwei)
    }

    fn max_gas_price(&self) -> u128 {
        gwei_to_wei(self.config.max_gwei)
    }

    /// Whether a failure should be answered with a proxy rotation and another try.
    fn should_rotate(&self, kind: &ErrorKind, retries: u32, limit: u32) -> bool {
        kind.is_connection() && self.pool.is_active() && retries < limit
    }

    /// Gas price in wei for the given retry round. Never fails.
    pub async fn get_gas_price(&mut self, retry_count: u32) -> u128 {
        let mut retries = 0;
        loop {
            match self.rpc.gas_price().await {
                Ok(network_price) => {
                    let quote = GasQuote::compute(
                        network_price,
                        self.gas.multiplier,
                        self.gas.retry_increase,
                        retry_count,
                        self.min_gas_price(),
                        self.max_gas_price(),
                    );
                    if quote.was_clamped() {
                        info!(
                            network = %self.network,
                            adjusted_gwei = wei_to_gwei(quote.adjusted_price),
                            clamped_gwei = wei_to_gwei(quote.clamped_price),
                            "Gas price clamped to configured bounds"
                        );
                    }
                    debug!(
                        network = %self.network,
                        network_gwei = wei_to_gwei(quote.network_price),
                        multiplier = quote.multiplier,
                        gwei = wei_to_gwei(quote.clamped_price),
                        "Gas price"
                    );
                    return quote.clamped_price;
                }
                Err(e) => {
                    let kind = classify(&e);
                    if self.should_rotate(&kind, retries, MAX_PROXY_RETRIES) {
                        retries += 1;
                        warn!(
                            network = %self.network,
                            attempt = retries,
                            error = %e,
                            "Gas price lookup failed, rotating proxy"
                        );
                        self.change_proxy();
                        continue;
                    }
                    warn!(
                        network = %self.network,
                        error = %e,
                        fallback_gwei = self.config.min_gwei,
                        "Gas price lookup failed, using minimum"
                    );
                    return self.min_gas_price();
                }
            }
        }
    }

    /// Buffered gas limit for `tx`. Never fails.
    pub async fn estimate_gas(&mut self, tx: &TransactionRequest) -> u64 {
        let mut retries = 0;
        loop {
            match self.rpc.estimate_gas(tx).await {
                Ok(estimate) => return buffered_gas_limit(estimate),
                Err(e) => {
                    let kind = classify(&e);
                    if self.should_rotate(&kind, retries, MAX_PROXY_RETRIES) {
                        retries += 1;
                        warn!(
                            network = %self.network,
                            attempt = retries,
                            error = %e,
                            "Gas estimation failed, rotating proxy"
                        );
                        self.change_proxy();
                        continue;
                    }
                    warn!(
                        network = %self.network,
                        error = %e,
                        default_gas_limit = self.gas.default_gas_limit,
                        "Gas estimation failed, using default limit"
                    );
                    return self.gas.default_gas_limit;
                }
            }
        }
    }

    /// Balance of the account. On failure returns zero with the error attached.
    pub async fn get_balance(&mut self) -> BalanceReading {
        let mut rotated = false;
        loop {
            match self.rpc.balance(self.address).await {
                Ok(wei) => {
                    return BalanceReading {
                        wei,
                        formatted: format_eth(wei),
                        error: None,
                    }
                }
                Err(e) => {
                    if !rotated && self.should_rotate(&classify(&e), 0, 1) {
                        rotated = true;
                        warn!(network = %self.network, error = %e, "Balance lookup failed, rotating proxy");
                        self.change_proxy();
                        continue;
                    }
                    warn!(network = %self.network, error = %e, "Balance lookup failed, reporting zero");
                    return BalanceReading {
                        wei: U256::ZERO,
                        formatted: format_eth(U256::ZERO),
                        error: Some(e.message),
                    };
                }
            }
        }
    }

    /// Moves to the pool's next proxy and rebuilds the transport and signer binding.
    pub fn change_proxy(&mut self) -> Option<ProxyEndpoint> {
        let next = self.pool.select_next()?;
        match self
            .connector
            .connect(&self.config, Some(&next), self.signer.as_ref())
        {
            Ok(rpc) => {
                self.rpc = rpc;
                info!(network = %self.network, proxy = %next, "Switched proxy");
                Some(next)
            }
            Err(e) => {
                warn!(network = %self.network, proxy = %next, error = %e, "Failed to rebuild transport for proxy");
                None
            }
        }
    }

    /// Fills, signs, submits and awaits `tx`.
    ///
    /// The nonce is reserved (and the cache incremented) once per call, right
    /// before the first broadcast. Retries after a connection failure re-send
    /// the same nonce with a re-priced transaction.
    pub async fn send_transaction(&mut self, tx: TransactionRequest, label: &str) -> TxResult {
        let mut reserved_nonce = None;
        let mut last_hash = None;
        let mut retries = 0;

        loop {
            if retries > 0 {
                if let Some(result) = self.check_landed(last_hash, label).await {
                    return result;
                }
            }

            match self
                .attempt_send(&tx, label, retries, &mut reserved_nonce, &mut last_hash)
                .await
            {
                Ok(result) => return result,
                Err(failure) => {
                    let kind = classify(&failure);
                    if let Some(hash) = last_hash.filter(|_| kind.means_in_flight()) {
                        warn!(
                            network = %self.network,
                            label,
                            tx_hash = %hash,
                            kind = %kind,
                            "Re-send rejected while earlier broadcast is pending, awaiting it"
                        );
                        return self.await_pending(hash, label).await;
                    }
                    if self.should_rotate(&kind, retries, MAX_PROXY_RETRIES) {
                        retries += 1;
                        warn!(
                            network = %self.network,
                            label,
                            attempt = retries,
                            error = %failure,
                            "Transaction failed on a connection error, rotating proxy and retrying"
                        );
                        self.change_proxy();
                        continue;
                    }

                    error!(
                        network = %self.network,
                        label,
                        kind = %kind,
                        error = %failure,
                        "Transaction failed"
                    );
                    return TxResult::Failure {
                        kind,
                        message: first_line(&failure.message),
                        raw_error: failure.message,
                    };
                }
            }
        }
    }

    /// Looks up a previously broadcast hash before re-sending.
    async fn check_landed(&self, hash: Option<TxHash>, label: &str) -> Option<TxResult> {
        let hash = hash?;
        match self.rpc.receipt(hash).await {
            Ok(Some(receipt)) if receipt.status => {
                info!(
                    network = %self.network,
                    label,
                    tx_hash = %hash,
                    "Previous broadcast already landed"
                );
                Some(TxResult::Success {
                    tx_hash: hash,
                    receipt,
                })
            }
            _ => None,
        }
    }

    async fn attempt_send(
        &mut self,
        tx: &TransactionRequest,
        label: &str,
        retry_count: u32,
        reserved_nonce: &mut Option<u64>,
        last_hash: &mut Option<TxHash>,
    ) -> RpcResult<TxResult> {
        let nonce = match *reserved_nonce {
            Some(nonce) => nonce,
            None => self.get_nonce().await?,
        };

        let mut request = tx
            .clone()
            .with_from(self.address)
            .with_nonce(nonce)
            .with_chain_id(self.config.chain_id);
        if request.gas.is_none() {
            let limit = self.estimate_gas(&request).await;
            request.set_gas_limit(limit);
        }
        if request.gas_price.is_none() && request.max_fee_per_gas.is_none() {
            let price = self.get_gas_price(retry_count).await;
            request.set_gas_price(price);
        }

        if reserved_nonce.is_none() {
            self.increment_nonce();
            *reserved_nonce = Some(nonce);
        }

        info!(
            network = %self.network,
            label,
            nonce,
            to = ?request.to,
            value = %format_eth(request.value.unwrap_or_default()),
            gas_limit = ?request.gas,
            gas_price_gwei = request.gas_price.map(wei_to_gwei),
            "Sending transaction"
        );

        let hash = self.rpc.send_transaction(request).await?;
        *last_hash = Some(hash);
        debug!(network = %self.network, label, tx_hash = %hash, "Broadcast, awaiting receipt");

        let start = tokio::time::Instant::now();
        let receipt = self.rpc.wait_for_receipt(hash).await?;
        Ok(self.receipt_result(hash, receipt, label, start))
    }

    /// Waits on a broadcast whose re-send the node refused as a duplicate.
    async fn await_pending(&self, hash: TxHash, label: &str) -> TxResult {
        let start = tokio::time::Instant::now();
        match self.rpc.wait_for_receipt(hash).await {
            Ok(receipt) => self.receipt_result(hash, receipt, label, start),
            Err(failure) => {
                let kind = classify(&failure);
                error!(
                    network = %self.network,
                    label,
                    tx_hash = %hash,
                    kind = %kind,
                    error = %failure,
                    "Pending transaction never confirmed"
                );
                TxResult::Failure {
                    kind,
                    message: first_line(&failure.message),
                    raw_error: failure.message,
                }
            }
        }
    }

    fn receipt_result(
        &self,
        hash: TxHash,
        receipt: ReceiptSummary,
        label: &str,
        start: tokio::time::Instant,
    ) -> TxResult {
        if !receipt.status {
            warn!(network = %self.network, label, tx_hash = %hash, "Transaction reverted");
            let message = format!("transaction {} reverted", hash);
            return TxResult::Failure {
                kind: ErrorKind::Reverted,
                message: message.clone(),
                raw_error: message,
            };
        }

        info!(
            network = %self.network,
            label,
            tx_hash = %hash,
            block = ?receipt.block_number,
            elapsed = ?start.elapsed(),
            link = %self.config.tx_link(hash),
            "Transaction landed"
        );
        TxResult::Success {
            tx_hash: hash,
            receipt,
        }
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("network", &self.network)
            .field("name", &self.config.name)
            .field("chain_id", &self.config.chain_id)
            .field("address", &self.address)
            .field("cached_nonce", &self.cached_nonce)
            .finish()
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().to_string()
}
