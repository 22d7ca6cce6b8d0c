use std::{sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};
use tracing::{info, info_span, warn};

use crate::types::BatchSummary;

/// Running statistics for one pass over the wallet list.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub total_wallets: usize,
    pub processed_wallets: usize,
    /// Wallets whose session could not be built.
    pub failed_wallets: usize,
    pub total_operations: usize,
    pub successful_operations: usize,
    pub started_at: Instant,
}

impl ProgressStats {
    pub fn new(total_wallets: usize) -> Self {
        Self {
            total_wallets,
            processed_wallets: 0,
            failed_wallets: 0,
            total_operations: 0,
            successful_operations: 0,
            started_at: Instant::now(),
        }
    }

    /// Percentage of operations that succeeded, 0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        self.successful_operations as f64 / self.total_operations as f64 * 100.0
    }

    pub fn wallets_per_minute(&self) -> f64 {
        let minutes = self.started_at.elapsed().as_secs_f64() / 60.0;
        if minutes <= f64::EPSILON {
            return 0.0;
        }
        self.processed_wallets as f64 / minutes
    }

    pub fn estimated_time_remaining(&self) -> Option<Duration> {
        if self.processed_wallets == 0 {
            return None;
        }
        let per_wallet = self.started_at.elapsed() / self.processed_wallets as u32;
        let remaining = self.total_wallets.saturating_sub(self.processed_wallets);
        Some(per_wallet * remaining as u32)
    }
}

/// Manages progress tracking and reporting
pub struct ProgressManager {
    progress: Arc<RwLock<ProgressStats>>,
}

impl ProgressManager {
    pub fn new(progress: Arc<RwLock<ProgressStats>>) -> Self {
        Self { progress }
    }

    /// Starts a new pass over `total_wallets` wallets.
    pub async fn reset(&self, total_wallets: usize) {
        *self.progress.write().await = ProgressStats::new(total_wallets);
    }

    pub async fn snapshot(&self) -> ProgressStats {
        self.progress.read().await.clone()
    }

    /// Records a finished wallet and prints current status
    pub async fn record_wallet(&self, summary: BatchSummary) {
        let mut progress = self.progress.write().await;
        progress.processed_wallets += 1;
        progress.total_operations += summary.total_operations;
        progress.successful_operations += summary.success_count;

        let time_remaining = progress
            .estimated_time_remaining()
            .map(|d| format!("{:.1} minutes", d.as_secs_f64() / 60.0))
            .unwrap_or_else(|| "calculating...".to_string());

        info!(
            processed = progress.processed_wallets,
            total = progress.total_wallets,
            wallet_result = %summary,
            success_rate = format!("{:.1}%", progress.success_rate()),
            wallets_per_minute = format!("{:.2}", progress.wallets_per_minute()),
            time_remaining,
            "Progress update"
        );
    }

    /// Records a wallet that never got a session.
    pub async fn record_failure(&self) {
        let mut progress = self.progress.write().await;
        progress.processed_wallets += 1;
        progress.failed_wallets += 1;
    }

    /// Prints cycle statistics
    pub async fn print_statistics(&self) {
        let progress = self.progress.read().await;
        let stats_span = info_span!("cycle_statistics");
        let _guard = stats_span.enter();

        info!(
            duration = ?progress.started_at.elapsed(),
            wallets = progress.processed_wallets,
            operations = progress.total_operations,
            succeeded = progress.successful_operations,
            success_rate = format!("{:.1}%", progress.success_rate()),
            "Cycle completed"
        );

        if progress.failed_wallets > 0 {
            warn!(
                failed_wallets = progress.failed_wallets,
                "Some wallets could not be processed"
            );
        }
    }
}
