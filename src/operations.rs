//! Native ETH transfer operation.

use alloy::{network::TransactionBuilder, rpc::types::TransactionRequest};
use tracing::{error, info, warn};

use crate::{
    config::TransferSettings,
    types::{BatchSummary, OperationOutcome, TxResult},
    utils::{random_address, random_amount},
    wallet::WalletSession,
};

/// Sends a random amount of ETH on the configured network.
pub struct TransferOperation {
    settings: TransferSettings,
}

impl TransferOperation {
    pub fn new(settings: TransferSettings) -> Self {
        Self { settings }
    }

    /// Performs one transfer from the session's wallet.
    ///
    /// The recipient is the wallet itself unless `to_random_address` is set.
    pub async fn transfer(&self, session: &mut WalletSession) -> OperationOutcome {
        let network = self.settings.network;
        let (amount_text, amount) = match random_amount(&mut rand::rng(), &self.settings.amount) {
            Ok(drawn) => drawn,
            Err(e) => return OperationOutcome::Failed(e.to_string()),
        };
        let recipient = if self.settings.to_random_address {
            random_address()
        } else {
            session.address()
        };

        let client = session.client_mut(network);
        let balance = client.get_balance().await;
        if balance.wei < amount {
            warn!(
                network = %network,
                balance = %balance.formatted,
                amount = %amount_text,
                "Insufficient balance for transfer"
            );
            return OperationOutcome::Failed(format!(
                "insufficient balance on {}: have {} ETH, need {} ETH",
                network, balance.formatted, amount_text
            ));
        }

        info!(
            network = %network,
            to = %recipient,
            amount = %amount_text,
            "Transferring ETH"
        );
        let tx = TransactionRequest::default()
            .with_to(recipient)
            .with_value(amount);

        match client.send_transaction(tx, "transfer").await {
            TxResult::Success { tx_hash, .. } => OperationOutcome::Completed {
                tx_hash,
                settled: true,
            },
            TxResult::Failure { kind, message, .. } => {
                error!(network = %network, kind = %kind, error = %message, "Transfer failed");
                OperationOutcome::Failed(format!("{}: {}", kind, message))
            }
        }
    }

    /// Runs `repeat_times` transfers with the cooldown between them.
    pub async fn run_batch(&self, session: &mut WalletSession) -> BatchSummary {
        let mut summary = BatchSummary::default();
        if !self.settings.enabled {
            return summary;
        }

        let repeat = self.settings.repeat_times;
        for run in 1..=repeat {
            let outcome = self.transfer(session).await;
            summary.record(&outcome);
            if run < repeat {
                tokio::time::sleep(self.settings.cooldown).await;
            }
        }

        info!(address = %session.address(), result = %summary, "Transfers finished");
        summary
    }
}
