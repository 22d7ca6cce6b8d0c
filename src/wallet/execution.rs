use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use tokio::sync::RwLock;
use tracing::{error, info, info_span, warn, Instrument};

use crate::{
    bridge::{quote::QuoteService, BridgeOrchestrator},
    chain::RpcConnector,
    config::Settings,
    error::Result,
    operations::TransferOperation,
    proxy::ProxyPool,
    types::BatchSummary,
};

use super::{
    progress::{ProgressManager, ProgressStats},
    WalletSession,
};

/// Drives the operation cycle over every wallet, one wallet at a time.
pub struct ExecutionManager {
    settings: Settings,
    pool: Arc<ProxyPool>,
    connector: Arc<dyn RpcConnector>,
    transfer: TransferOperation,
    bridge: BridgeOrchestrator,
    progress: ProgressManager,
}

impl ExecutionManager {
    pub fn new(
        settings: Settings,
        pool: Arc<ProxyPool>,
        connector: Arc<dyn RpcConnector>,
        quotes: Arc<dyn QuoteService>,
    ) -> Self {
        let transfer = TransferOperation::new(settings.transfer.clone());
        let bridge = BridgeOrchestrator::new(settings.bridge.clone(), quotes);
        let progress = ProgressManager::new(Arc::new(RwLock::new(ProgressStats::new(0))));
        Self {
            settings,
            pool,
            connector,
            transfer,
            bridge,
            progress,
        }
    }

    /// Runs the enabled operations for one wallet.
    ///
    /// # Returns
    /// * `Result<BatchSummary>` - Combined tally, or an error if the session could not be built
    pub async fn run_wallet(&self, signer: PrivateKeySigner) -> Result<BatchSummary> {
        let mut session =
            WalletSession::new(signer, &self.settings, self.pool.clone(), self.connector.clone())?;

        let transfers = self.transfer.run_batch(&mut session).await;
        if self.settings.transfer.enabled && self.settings.bridge.enabled {
            tokio::time::sleep(self.settings.transfer.cooldown).await;
        }
        let bridges = self.bridge.run_batch(&mut session).await;

        Ok(BatchSummary {
            success_count: transfers.success_count + bridges.success_count,
            total_operations: transfers.total_operations + bridges.total_operations,
        })
    }

    /// One pass over `keys`. A failing wallet never stops the pass.
    pub async fn run_cycle(&self, keys: &[PrivateKeySigner]) -> ProgressStats {
        self.progress.reset(keys.len()).await;

        for (index, signer) in keys.iter().enumerate() {
            let address = signer.address();
            if index > 0 && self.settings.proxy.rotate_per_wallet {
                if let Some(proxy) = self.pool.select_next() {
                    info!(proxy = %proxy, "Rotated proxy for next wallet");
                }
            }

            let span = info_span!("wallet", index = index + 1, total = keys.len(), address = %address);
            match self.run_wallet(signer.clone()).instrument(span).await {
                Ok(summary) => self.progress.record_wallet(summary).await,
                Err(e) => {
                    error!(address = %address, error = %e, "Wallet processing failed");
                    self.progress.record_failure().await;
                }
            }
        }

        self.progress.print_statistics().await;
        self.progress.snapshot().await
    }

    /// Repeats [`Self::run_cycle`] every `cycle.interval` while `cycle.repeat` is set.
    pub async fn run(&self, keys: &[PrivateKeySigner]) {
        let mut cycle = 1u64;
        loop {
            info!(cycle, wallets = keys.len(), "Starting cycle");
            let stats = self.run_cycle(keys).await;
            if stats.total_operations > 0 && stats.successful_operations == 0 {
                warn!(cycle, "No operation succeeded in this cycle");
            }

            if !self.settings.cycle.repeat {
                break;
            }
            let next_at = chrono::Duration::from_std(self.settings.cycle.interval)
                .map(|d| (chrono::Local::now() + d).format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            info!(
                cycle,
                next_in = %humantime::format_duration(self.settings.cycle.interval),
                next_at,
                "Cycle finished, sleeping"
            );
            tokio::time::sleep(self.settings.cycle.interval).await;
            cycle += 1;
        }
    }
}
