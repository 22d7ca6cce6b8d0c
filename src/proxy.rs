//! Outbound proxy pool with failure-driven rotation.
//!
//! The pool is created once per process and shared as `Arc<ProxyPool>` with
//! every network-facing component. Readers take the current endpoint to build
//! their transport; [`ProxyPool::select_next`] is the only mutation.

use std::{
    fmt,
    path::Path,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use rand::Rng;
use tracing::{info, warn};

use crate::error::{Result, WalletError};

/// How the proxy is spoken to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// HTTP CONNECT proxy, credentials sent as `Proxy-Authorization`.
    Http,
    /// SOCKS5 tunnel, DNS resolved on the proxy side.
    Socks5,
}

impl FromStr for ProxyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" | "https" => Ok(ProxyMode::Http),
            "socks5" | "socks" | "socks5h" => Ok(ProxyMode::Socks5),
            other => Err(format!("unknown proxy mode '{}'", other)),
        }
    }
}

/// How the next endpoint is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Stay on the first endpoint; rotation requests are ignored.
    Sticky,
    RoundRobin,
    Random,
}

impl FromStr for RotationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "sticky" | "none" | "disabled" => Ok(RotationPolicy::Sticky),
            "round_robin" | "roundrobin" => Ok(RotationPolicy::RoundRobin),
            "random" => Ok(RotationPolicy::Random),
            other => Err(format!("unknown rotation policy '{}'", other)),
        }
    }
}

/// One proxy from the list file.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
}

impl ProxyEndpoint {
    /// Parses `host:port` or `user:pass@host:port`, with an optional scheme prefix.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);

        let (credentials, address) = match without_scheme.rsplit_once('@') {
            Some((auth, address)) => {
                let (user, pass) = auth.split_once(':').ok_or_else(|| {
                    WalletError::Proxy(format!("credentials must be user:pass in '{}'", trimmed))
                })?;
                (Some((user.to_string(), pass.to_string())), address)
            }
            None => (None, without_scheme),
        };

        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| WalletError::Proxy(format!("missing port in '{}'", address)))?;
        if host.is_empty() {
            return Err(WalletError::Proxy(format!("missing host in '{}'", address)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| WalletError::Proxy(format!("invalid port in '{}': {}", address, e)))?;

        Ok(Self {
            host: host.to_string(),
            port,
            credentials,
        })
    }

    /// Proxy URL for the given mode. Includes credentials for SOCKS5 only;
    /// HTTP credentials are attached as a header instead.
    pub fn url(&self, mode: ProxyMode) -> String {
        match (mode, &self.credentials) {
            (ProxyMode::Http, _) => format!("http://{}:{}", self.host, self.port),
            (ProxyMode::Socks5, Some((user, pass))) => {
                format!("socks5h://{}:{}@{}:{}", user, pass, self.host, self.port)
            }
            (ProxyMode::Socks5, None) => format!("socks5h://{}:{}", self.host, self.port),
        }
    }
}

// Never print credentials.
impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

/// Parses a proxy list, one endpoint per line. Blank lines and `#` comments are
/// skipped; malformed lines are logged and dropped.
pub fn parse_proxy_list(contents: &str) -> Vec<ProxyEndpoint> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match ProxyEndpoint::parse(line) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed proxy entry");
                None
            }
        })
        .collect()
}

/// Process-wide proxy pool.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    current: Mutex<usize>,
    enabled: bool,
    mode: ProxyMode,
    policy: RotationPolicy,
    rotations: AtomicU64,
}

impl ProxyPool {
    pub fn new(
        endpoints: Vec<ProxyEndpoint>,
        enabled: bool,
        mode: ProxyMode,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            endpoints,
            current: Mutex::new(0),
            enabled,
            mode,
            policy,
            rotations: AtomicU64::new(0),
        }
    }

    /// A pool that never proxies.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), false, ProxyMode::Http, RotationPolicy::Sticky)
    }

    /// Loads the pool from a list file. A missing file yields an empty pool.
    pub fn load(path: &Path, enabled: bool, mode: ProxyMode, policy: RotationPolicy) -> Result<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }
        let endpoints = match std::fs::read_to_string(path) {
            Ok(contents) => parse_proxy_list(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Proxy list not found, continuing without proxies");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            count = endpoints.len(),
            mode = ?mode,
            policy = ?policy,
            "Proxy pool loaded"
        );
        Ok(Self::new(endpoints, enabled, mode, policy))
    }

    /// True when requests go through a proxy at all.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.endpoints.is_empty()
    }

    pub fn mode(&self) -> ProxyMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// The endpoint new transports should use.
    pub fn current(&self) -> Option<ProxyEndpoint> {
        if !self.is_active() {
            return None;
        }
        let idx = *self.current.lock();
        self.endpoints.get(idx).cloned()
    }

    /// Advances to the next endpoint according to the rotation policy.
    /// Returns `None` when the pool is inactive or rotation is disabled.
    pub fn select_next(&self) -> Option<ProxyEndpoint> {
        if !self.is_active() || self.policy == RotationPolicy::Sticky {
            return None;
        }
        let len = self.endpoints.len();
        let mut current = self.current.lock();
        let next = match self.policy {
            RotationPolicy::RoundRobin => (*current + 1) % len,
            RotationPolicy::Random if len > 1 => {
                // Pick among the others so a rotation always changes endpoint.
                let offset = rand::rng().random_range(1..len);
                (*current + offset) % len
            }
            _ => *current,
        };
        *current = next;
        self.rotations.fetch_add(1, Ordering::Relaxed);
        self.endpoints.get(next).cloned()
    }

    /// Number of successful `select_next` calls so far.
    pub fn rotation_count(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }
}

/// Builds an HTTP client routed through `proxy` (or direct when `None`).
pub fn build_http_client(
    proxy: Option<&ProxyEndpoint>,
    mode: ProxyMode,
    timeout: Duration,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(30));

    if let Some(endpoint) = proxy {
        let mut proxy = reqwest::Proxy::all(endpoint.url(mode))
            .map_err(|e| WalletError::Proxy(format!("invalid proxy {}: {}", endpoint, e)))?;
        if let (ProxyMode::Http, Some((user, pass))) = (mode, &endpoint.credentials) {
            proxy = proxy.basic_auth(user, pass);
        }
        builder = builder.proxy(proxy);
    } else {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| WalletError::Proxy(format!("failed to build HTTP client: {}", e)))
}
