//! Shared doubles for the integration tests.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, B256, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use bridge_smith::{
    bridge::quote::{QuoteError, QuoteRequest, QuoteResponse, QuoteService},
    chain::{ChainRpc, RpcConnector, RpcFailure, RpcResult},
    config::{NetworkConfig, Settings, StructSource},
    error::Result,
    proxy::{ProxyEndpoint, ProxyMode, ProxyPool, RotationPolicy},
    types::ReceiptSummary,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

pub const GWEI: u128 = 1_000_000_000;

pub fn eth(amount: f64) -> U256 {
    U256::from((amount * 1e18) as u128)
}

/// Scripted chain endpoint. Every connect hands out the same instance, so
/// the script survives proxy rotations.
pub struct MockRpc {
    pub nonce: Mutex<u64>,
    pub gas_prices: Mutex<VecDeque<RpcResult<u128>>>,
    pub default_gas_price: Mutex<u128>,
    pub estimate: Mutex<RpcResult<u64>>,
    /// Scripted estimates consumed before falling back to `estimate`.
    pub estimates: Mutex<VecDeque<RpcResult<u64>>>,
    /// Successive balance reads; the last value repeats.
    pub balances: Mutex<VecDeque<RpcResult<U256>>>,
    pub default_balance: Mutex<U256>,
    /// Outcomes of the next `send_transaction` calls, in order; `None` broadcasts.
    pub send_failures: Mutex<VecDeque<Option<RpcFailure>>>,
    /// Inclusion status for each receipt, in order; `true` once exhausted.
    pub receipt_statuses: Mutex<VecDeque<bool>>,
    /// Failures returned by the next `wait_for_receipt` calls, in order.
    pub receipt_failures: Mutex<VecDeque<RpcFailure>>,
    /// Hashes a non-blocking `receipt` lookup reports as included.
    pub landed: Mutex<Vec<TxHash>>,
    /// Every request handed to `send_transaction`, failed ones included.
    pub sent: Mutex<Vec<TransactionRequest>>,
    pub send_attempts: AtomicUsize,
    pub gas_price_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub receipt_waits: AtomicUsize,
    pub balance_calls: AtomicUsize,
    pub count_calls: AtomicUsize,
}

impl MockRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nonce: Mutex::new(0),
            gas_prices: Mutex::new(VecDeque::new()),
            default_gas_price: Mutex::new(10 * GWEI),
            estimate: Mutex::new(Ok(21_000)),
            estimates: Mutex::new(VecDeque::new()),
            balances: Mutex::new(VecDeque::new()),
            default_balance: Mutex::new(eth(1.0)),
            send_failures: Mutex::new(VecDeque::new()),
            receipt_statuses: Mutex::new(VecDeque::new()),
            receipt_failures: Mutex::new(VecDeque::new()),
            landed: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            send_attempts: AtomicUsize::new(0),
            gas_price_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
            receipt_waits: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_nonce(&self, nonce: u64) {
        *self.nonce.lock() = nonce;
    }

    pub fn set_balance(&self, wei: U256) {
        *self.default_balance.lock() = wei;
    }

    pub fn push_balance(&self, reading: RpcResult<U256>) {
        self.balances.lock().push_back(reading);
    }

    pub fn push_gas_price(&self, price: RpcResult<u128>) {
        self.gas_prices.lock().push_back(price);
    }

    pub fn push_send_failure(&self, message: &str) {
        self.send_failures
            .lock()
            .push_back(Some(RpcFailure::new(message)));
    }

    pub fn push_send_success(&self) {
        self.send_failures.lock().push_back(None);
    }

    pub fn push_estimate(&self, estimate: RpcResult<u64>) {
        self.estimates.lock().push_back(estimate);
    }

    pub fn push_receipt_failure(&self, message: &str) {
        self.receipt_failures.lock().push_back(RpcFailure::new(message));
    }

    pub fn push_receipt_status(&self, status: bool) {
        self.receipt_statuses.lock().push_back(status);
    }

    pub fn sent_nonces(&self) -> Vec<Option<u64>> {
        self.sent.lock().iter().map(|tx| tx.nonce).collect()
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.sent.lock().clone()
    }
}

pub fn hash_for(index: usize) -> TxHash {
    B256::with_last_byte(index as u8 + 1)
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn transaction_count(&self, _address: Address) -> RpcResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.nonce.lock())
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        match self.gas_prices.lock().pop_front() {
            Some(scripted) => scripted,
            None => Ok(*self.default_gas_price.lock()),
        }
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> RpcResult<u64> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        match self.estimates.lock().pop_front() {
            Some(scripted) => scripted,
            None => self.estimate.lock().clone(),
        }
    }

    async fn balance(&self, _address: Address) -> RpcResult<U256> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let mut balances = self.balances.lock();
        match balances.pop_front() {
            Some(reading) => {
                if let Ok(wei) = &reading {
                    *self.default_balance.lock() = *wei;
                }
                reading
            }
            None => Ok(*self.default_balance.lock()),
        }
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> RpcResult<TxHash> {
        let index = self.send_attempts.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().push(tx);
        if let Some(Some(failure)) = self.send_failures.lock().pop_front() {
            return Err(failure);
        }
        Ok(hash_for(index))
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> RpcResult<ReceiptSummary> {
        self.receipt_waits.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.receipt_failures.lock().pop_front() {
            return Err(failure);
        }
        let status = self.receipt_statuses.lock().pop_front().unwrap_or(true);
        Ok(ReceiptSummary {
            tx_hash: hash,
            block_number: Some(1),
            gas_used: 21_000,
            status,
        })
    }

    async fn receipt(&self, hash: TxHash) -> RpcResult<Option<ReceiptSummary>> {
        if !self.landed.lock().contains(&hash) {
            return Ok(None);
        }
        Ok(Some(ReceiptSummary {
            tx_hash: hash,
            block_number: Some(1),
            gas_used: 21_000,
            status: true,
        }))
    }
}

/// Hands out a fixed [`MockRpc`] per network and counts connects.
pub struct MockConnector {
    pub home: Arc<MockRpc>,
    pub companion: Arc<MockRpc>,
    pub home_chain_id: u64,
    pub connects: AtomicUsize,
    pub proxies: Mutex<Vec<Option<String>>>,
}

impl MockConnector {
    pub fn new(home: Arc<MockRpc>, companion: Arc<MockRpc>) -> Arc<Self> {
        Arc::new(Self {
            home,
            companion,
            home_chain_id: HOME_CHAIN_ID,
            connects: AtomicUsize::new(0),
            proxies: Mutex::new(Vec::new()),
        })
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RpcConnector for MockConnector {
    fn connect(
        &self,
        network: &NetworkConfig,
        proxy: Option<&ProxyEndpoint>,
        _signer: Option<&EthereumWallet>,
    ) -> Result<Arc<dyn ChainRpc>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.proxies.lock().push(proxy.map(|p| p.to_string()));
        let rpc: Arc<dyn ChainRpc> = if network.chain_id == self.home_chain_id {
            self.home.clone()
        } else {
            self.companion.clone()
        };
        Ok(rpc)
    }
}

/// Replays scripted quote results, then keeps returning the last one.
pub struct MockQuotes {
    pub script: Mutex<VecDeque<std::result::Result<Value, QuoteError>>>,
    pub requests: Mutex<Vec<QuoteRequest>>,
}

impl MockQuotes {
    pub fn new(script: Vec<std::result::Result<Value, QuoteError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl QuoteService for MockQuotes {
    async fn quote(&self, request: &QuoteRequest) -> std::result::Result<QuoteResponse, QuoteError> {
        self.requests.lock().push(request.clone());
        let next = {
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        match next {
            Some(Ok(body)) => {
                serde_json::from_value(body).map_err(|e| QuoteError::Decode(e.to_string()))
            }
            Some(Err(e)) => Err(e),
            None => Err(QuoteError::Request("no scripted response".into())),
        }
    }
}

pub const HOME_CHAIN_ID: u64 = 11155111;
pub const COMPANION_CHAIN_ID: u64 = 1301;

/// Settings with both networks configured and `overrides` merged on top.
pub fn settings(overrides: Value) -> Settings {
    let mut root = json!({
        "home": {
            "name": "home-testnet",
            "rpc_url": "http://127.0.0.1:1",
            "chain_id": HOME_CHAIN_ID,
            "explorer_url": "https://explorer.home",
            "min_gwei": 0.001,
            "max_gwei": 50
        },
        "companion": {
            "name": "companion-testnet",
            "rpc_url": "http://127.0.0.1:2",
            "chain_id": COMPANION_CHAIN_ID,
            "explorer_url": "https://explorer.companion",
            "min_gwei": 0.001,
            "max_gwei": 50
        }
    });
    merge(&mut root, overrides);
    Settings::resolve(&StructSource::new(root)).unwrap()
}

fn merge(target: &mut Value, overrides: Value) {
    match (target, overrides) {
        (Value::Object(target), Value::Object(overrides)) => {
            for (key, value) in overrides {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, value) => *target = value,
    }
}

pub fn proxy_pool(count: usize) -> Arc<ProxyPool> {
    let endpoints = (0..count)
        .map(|i| ProxyEndpoint::parse(&format!("user{}:secret@10.1.0.{}:3128", i, i)).unwrap())
        .collect();
    Arc::new(ProxyPool::new(
        endpoints,
        true,
        ProxyMode::Http,
        RotationPolicy::RoundRobin,
    ))
}

/// Quote body with a single route entry.
pub fn quote_body(route_id: &str, to: Address) -> Value {
    json!({
        "results": [{
            "id": route_id,
            "result": {
                "initiatingTransaction": {
                    "to": to.to_string(),
                    "data": "0xabcdef01",
                    "value": "0",
                    "chainId": HOME_CHAIN_ID
                }
            }
        }]
    })
}

/// Starts an HTTP/1.1 backend on an ephemeral port. `f` receives each request
/// body and returns `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let body = read_request_body(&mut socket).await;
                let (status, response) = f(body).await;
                let status_text = match status {
                    200 => "200 OK",
                    400 => "400 Bad Request",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    502 => "502 Bad Gateway",
                    _ => "200 OK",
                };
                let raw = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    response.len(),
                    response
                );
                let _ = socket.write_all(raw.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                return String::from_utf8_lossy(&buf[split + 4..split + 4 + length]).into_owned();
            }
        }
    }
    String::new()
}
