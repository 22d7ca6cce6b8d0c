//! Configuration access and the resolved settings tree.
//!
//! Values come from a [`ConfigSource`]. Two sources exist: [`EnvSource`] reads
//! the process environment (after loading `.env`), [`StructSource`] reads a
//! plain JSON document. [`Settings::resolve`] walks the source exactly once;
//! everything downstream only sees the typed [`Settings`].
//!
//! Keys are dotted (`bridge.min_amount`). The environment source maps them to
//! upper snake case (`BRIDGE_MIN_AMOUNT`).

use std::{path::PathBuf, str::FromStr, time::Duration};

use serde_json::Value;

use crate::{
    error::{Result, WalletError},
    proxy::{ProxyMode, RotationPolicy},
    types::{Direction, Network},
};

/// Read access to raw configuration values.
pub trait ConfigSource {
    /// Returns the raw string value for a dotted key, if present.
    fn value(&self, key: &str) -> Option<String>;
}

/// Environment-backed source. Loads `.env` on construction.
#[derive(Debug, Default)]
pub struct EnvSource;

impl EnvSource {
    pub fn new() -> Self {
        dotenv::dotenv().ok();
        Self
    }

    fn env_key(key: &str) -> String {
        key.replace('.', "_").to_uppercase()
    }
}

impl ConfigSource for EnvSource {
    fn value(&self, key: &str) -> Option<String> {
        dotenv::var(Self::env_key(key))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// Source backed by a plain JSON structure, e.g. `{"bridge": {"min_amount": 0.0001}}`.
#[derive(Debug, Clone)]
pub struct StructSource {
    root: Value,
}

impl StructSource {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let root = serde_json::from_str(raw)
            .map_err(|e| WalletError::InvalidConfig(format!("malformed JSON config: {}", e)))?;
        Ok(Self::new(root))
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

impl ConfigSource for StructSource {
    fn value(&self, key: &str) -> Option<String> {
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        match node {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }
}

/// Static parameters of one network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_url: String,
    /// Lower gas price bound in gwei; also the fallback price.
    pub min_gwei: f64,
    pub max_gwei: f64,
}

impl NetworkConfig {
    pub fn tx_link(&self, hash: impl std::fmt::Display) -> String {
        format!("{}/tx/{}", self.explorer_url.trim_end_matches('/'), hash)
    }
}

#[derive(Debug, Clone)]
pub struct GasSettings {
    pub multiplier: f64,
    /// Base of the exponential escalation applied per retry.
    pub retry_increase: f64,
    pub default_gas_limit: u64,
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            multiplier: 1.1,
            retry_increase: 1.2,
            default_gas_limit: 300_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub enabled: bool,
    pub file: PathBuf,
    pub mode: ProxyMode,
    pub rotation: RotationPolicy,
    /// Rotate once at the start of every wallet, in addition to failure-driven rotation.
    pub rotate_per_wallet: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            file: PathBuf::from("proxies.txt"),
            mode: ProxyMode::Http,
            rotation: RotationPolicy::RoundRobin,
            rotate_per_wallet: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
    pub decimals: u32,
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub enabled: bool,
    pub api_url: String,
    pub host: String,
    pub graffiti: String,
    pub amount: AmountRange,
    pub repeat_times: u32,
    pub home_to_companion: bool,
    pub companion_to_home: bool,
    pub home_to_companion_route: String,
    pub companion_to_home_route: String,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
    pub cooldown: Duration,
}

impl BridgeSettings {
    pub fn is_enabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::HomeToCompanion => self.home_to_companion,
            Direction::CompanionToHome => self.companion_to_home,
        }
    }

    pub fn enabled_directions(&self) -> Vec<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|d| self.is_enabled(*d))
            .collect()
    }

    /// Route id the quoting service uses for this direction.
    pub fn route_id(&self, direction: Direction) -> &str {
        match direction {
            Direction::HomeToCompanion => &self.home_to_companion_route,
            Direction::CompanionToHome => &self.companion_to_home_route,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: "https://api.superbridge.app/api/v2/bridge/routes".to_string(),
            host: "superbridge.app".to_string(),
            graffiti: "superbridge".to_string(),
            amount: AmountRange {
                min: 0.0001,
                max: 0.0004,
                decimals: 7,
            },
            repeat_times: 1,
            home_to_companion: true,
            companion_to_home: true,
            home_to_companion_route: "Across".to_string(),
            companion_to_home_route: "OptimismDeposit".to_string(),
            poll_interval: Duration::from_secs(30),
            poll_attempts: 20,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub enabled: bool,
    pub network: Network,
    pub amount: AmountRange,
    pub repeat_times: u32,
    pub to_random_address: bool,
    pub cooldown: Duration,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            network: Network::Home,
            amount: AmountRange {
                min: 0.00001,
                max: 0.0001,
                decimals: 7,
            },
            repeat_times: 1,
            to_random_address: false,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub wallets_file: PathBuf,
    pub repeat: bool,
    pub interval: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            wallets_file: PathBuf::from("private_keys.txt"),
            repeat: true,
            interval: Duration::from_secs(8 * 60 * 60),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub home: NetworkConfig,
    pub companion: NetworkConfig,
    pub gas: GasSettings,
    pub rpc_timeout: Duration,
    pub proxy: ProxySettings,
    pub bridge: BridgeSettings,
    pub transfer: TransferSettings,
    pub cycle: CycleSettings,
}

impl Settings {
    /// Reads every value from `source` once and validates ranges.
    pub fn resolve(source: &dyn ConfigSource) -> Result<Self> {
        let gas_defaults = GasSettings::default();
        let proxy_defaults = ProxySettings::default();
        let bridge_defaults = BridgeSettings::default();
        let transfer_defaults = TransferSettings::default();
        let cycle_defaults = CycleSettings::default();

        let gas = GasSettings {
            multiplier: get_or(source, "gas.multiplier", gas_defaults.multiplier)?,
            retry_increase: get_or(source, "gas.retry_increase", gas_defaults.retry_increase)?,
            default_gas_limit: get_or(
                source,
                "gas.default_gas_limit",
                gas_defaults.default_gas_limit,
            )?,
        };

        let proxy = ProxySettings {
            enabled: get_or(source, "proxy.enabled", proxy_defaults.enabled)?,
            file: source
                .value("proxy.file")
                .map(PathBuf::from)
                .unwrap_or(proxy_defaults.file),
            mode: get_or(source, "proxy.mode", proxy_defaults.mode)?,
            rotation: get_or(source, "proxy.rotation", proxy_defaults.rotation)?,
            rotate_per_wallet: get_or(
                source,
                "proxy.rotate_per_wallet",
                proxy_defaults.rotate_per_wallet,
            )?,
        };

        let bridge = BridgeSettings {
            enabled: get_or(source, "bridge.enabled", bridge_defaults.enabled)?,
            api_url: source
                .value("bridge.api_url")
                .unwrap_or(bridge_defaults.api_url),
            host: source.value("bridge.host").unwrap_or(bridge_defaults.host),
            graffiti: source
                .value("bridge.graffiti")
                .unwrap_or(bridge_defaults.graffiti),
            amount: amount_range(source, "bridge", &bridge_defaults.amount)?,
            repeat_times: get_or(source, "bridge.repeat_times", bridge_defaults.repeat_times)?,
            home_to_companion: get_or(
                source,
                "bridge.home_to_companion",
                bridge_defaults.home_to_companion,
            )?,
            companion_to_home: get_or(
                source,
                "bridge.companion_to_home",
                bridge_defaults.companion_to_home,
            )?,
            home_to_companion_route: source
                .value("bridge.home_to_companion_route")
                .unwrap_or(bridge_defaults.home_to_companion_route),
            companion_to_home_route: source
                .value("bridge.companion_to_home_route")
                .unwrap_or(bridge_defaults.companion_to_home_route),
            poll_interval: Duration::from_secs(get_or(
                source,
                "bridge.poll_interval_secs",
                bridge_defaults.poll_interval.as_secs(),
            )?),
            poll_attempts: get_or(source, "bridge.poll_attempts", bridge_defaults.poll_attempts)?,
            cooldown: Duration::from_secs(get_or(
                source,
                "bridge.cooldown_secs",
                bridge_defaults.cooldown.as_secs(),
            )?),
        };

        let transfer = TransferSettings {
            enabled: get_or(source, "transfer.enabled", transfer_defaults.enabled)?,
            network: get_or(source, "transfer.network", transfer_defaults.network)?,
            amount: amount_range(source, "transfer", &transfer_defaults.amount)?,
            repeat_times: get_or(
                source,
                "transfer.repeat_times",
                transfer_defaults.repeat_times,
            )?,
            to_random_address: get_or(
                source,
                "transfer.to_random_address",
                transfer_defaults.to_random_address,
            )?,
            cooldown: Duration::from_secs(get_or(
                source,
                "transfer.cooldown_secs",
                transfer_defaults.cooldown.as_secs(),
            )?),
        };

        let interval = match source.value("cycle.interval") {
            Some(raw) => humantime::parse_duration(&raw).map_err(|e| {
                WalletError::InvalidConfig(format!("cycle.interval '{}': {}", raw, e))
            })?,
            None => cycle_defaults.interval,
        };
        let cycle = CycleSettings {
            wallets_file: source
                .value("wallets.file")
                .map(PathBuf::from)
                .unwrap_or(cycle_defaults.wallets_file),
            repeat: get_or(source, "cycle.repeat", cycle_defaults.repeat)?,
            interval,
        };

        let settings = Self {
            home: network_config(source, "home")?,
            companion: network_config(source, "companion")?,
            gas,
            rpc_timeout: Duration::from_secs(get_or(source, "rpc.timeout_secs", 30u64)?),
            proxy,
            bridge,
            transfer,
            cycle,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn network(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Home => &self.home,
            Network::Companion => &self.companion,
        }
    }

    fn validate(&self) -> Result<()> {
        for net in [&self.home, &self.companion] {
            if net.min_gwei < 0.0 || net.min_gwei > net.max_gwei {
                return Err(WalletError::InvalidConfig(format!(
                    "{}: gas bounds [{}, {}] gwei are not a valid range",
                    net.name, net.min_gwei, net.max_gwei
                )));
            }
        }
        for (name, range) in [("bridge", &self.bridge.amount), ("transfer", &self.transfer.amount)]
        {
            if range.min <= 0.0 || range.min > range.max {
                return Err(WalletError::InvalidConfig(format!(
                    "{}: amount range [{}, {}] is not a valid range",
                    name, range.min, range.max
                )));
            }
            if range.decimals > 18 {
                return Err(WalletError::InvalidConfig(format!(
                    "{}.decimals must be at most 18",
                    name
                )));
            }
        }
        if self.gas.multiplier <= 0.0 || self.gas.retry_increase < 1.0 {
            return Err(WalletError::InvalidConfig(
                "gas.multiplier must be positive and gas.retry_increase at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn network_config(source: &dyn ConfigSource, prefix: &str) -> Result<NetworkConfig> {
    Ok(NetworkConfig {
        name: source
            .value(&format!("{prefix}.name"))
            .unwrap_or_else(|| prefix.to_string()),
        rpc_url: required(source, &format!("{prefix}.rpc_url"))?,
        chain_id: required(source, &format!("{prefix}.chain_id"))?,
        explorer_url: source
            .value(&format!("{prefix}.explorer_url"))
            .unwrap_or_default(),
        min_gwei: get_or(source, &format!("{prefix}.min_gwei"), 0.001)?,
        max_gwei: get_or(source, &format!("{prefix}.max_gwei"), 50.0)?,
    })
}

fn amount_range(
    source: &dyn ConfigSource,
    prefix: &str,
    defaults: &AmountRange,
) -> Result<AmountRange> {
    Ok(AmountRange {
        min: get_or(source, &format!("{prefix}.min_amount"), defaults.min)?,
        max: get_or(source, &format!("{prefix}.max_amount"), defaults.max)?,
        decimals: get_or(source, &format!("{prefix}.decimals"), defaults.decimals)?,
    })
}

fn required<T>(source: &dyn ConfigSource, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = source
        .value(key)
        .ok_or_else(|| WalletError::ConfigNotFound(key.to_string()))?;
    parse_value(key, &raw)
}

fn get_or<T>(source: &dyn ConfigSource, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source.value(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| WalletError::InvalidConfig(format!("{} = '{}': {}", key, raw, e)))
}
