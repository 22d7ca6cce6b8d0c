//! Tracing subscriber setup.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Result, WalletError};

pub const DEFAULT_FILTER: &str = "bridge_smith=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub json: bool,
    /// Directory for daily rolling log files. Console only when `None`.
    pub dir: Option<PathBuf>,
}

impl LoggingOptions {
    /// Reads `LOG_JSON` and `LOG_DIR`.
    pub fn from_env() -> Self {
        let json = dotenv::var("LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let dir = dotenv::var("LOG_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            json,
            dir,
        }
    }
}

/// Installs the global subscriber.
///
/// Keep the returned guard alive for the life of the process, or buffered
/// file output is lost.
pub fn init_logging(options: &LoggingOptions) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let (file_layer, guard) = match &options.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "bridge-smith.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let json_layer = options.json.then(|| fmt::layer().json().with_target(true));
    let plain_layer = (!options.json).then(|| fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| WalletError::InvalidConfig(format!("failed to install logger: {}", e)))?;

    Ok(guard)
}
