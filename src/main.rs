use std::{path::Path, sync::Arc};

use tracing::{info, warn};

use bridge_smith::{
    bridge::quote::HttpQuoteService,
    chain::AlloyConnector,
    config::{ConfigSource, EnvSource, Settings, StructSource},
    logging::{init_logging, LoggingOptions},
    proxy::ProxyPool,
    wallet::{keys::load_keys, ExecutionManager},
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let env = EnvSource::new();
    let _log_guard = init_logging(&LoggingOptions::from_env())?;

    // CONFIG_FILE switches to a JSON settings document.
    let source: Box<dyn ConfigSource> = match dotenv::var("CONFIG_FILE") {
        Ok(path) => {
            info!(path = %path, "Reading configuration file");
            Box::new(StructSource::from_file(Path::new(&path))?)
        }
        Err(_) => Box::new(env),
    };
    let settings = Settings::resolve(source.as_ref())?;
    info!(
        home = %settings.home.name,
        home_chain_id = settings.home.chain_id,
        companion = %settings.companion.name,
        companion_chain_id = settings.companion.chain_id,
        "Configuration loaded"
    );

    let pool = Arc::new(ProxyPool::load(
        &settings.proxy.file,
        settings.proxy.enabled,
        settings.proxy.mode,
        settings.proxy.rotation,
    )?);
    if pool.is_active() {
        info!(proxies = pool.len(), mode = ?pool.mode(), "Proxy rotation enabled");
    }

    let keys = load_keys(&settings.cycle.wallets_file)?;

    let connector = Arc::new(AlloyConnector::new(settings.proxy.mode, settings.rpc_timeout));
    let quotes = Arc::new(HttpQuoteService::new(
        settings.bridge.api_url.clone(),
        pool.clone(),
        settings.rpc_timeout,
    ));
    let manager = ExecutionManager::new(settings, pool, connector, quotes);

    tokio::select! {
        _ = manager.run(&keys) => info!("All cycles finished"),
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, shutting down"),
    }

    Ok(())
}
