//! Bridge orchestration between the home and companion networks.
//!
//! Per direction: preflight, amount draw, balance check, routing (quote with
//! one retry, then the static fallback route), submission and, for
//! home → companion, destination balance polling until the funds arrive or
//! the poll window runs out.

pub mod quote;
pub mod routes;

use std::{sync::Arc, time::Duration};

use alloy::{
    network::TransactionBuilder,
    primitives::U256,
    rpc::types::TransactionRequest,
};
use tracing::{error, info, warn};

use crate::{
    config::BridgeSettings,
    types::{BatchSummary, Direction, OperationOutcome, TxResult},
    utils::{format_eth, random_amount},
    wallet::WalletSession,
};

use self::{
    quote::{extract_route, QuoteRequest, QuoteService, NATIVE_DECIMALS, NATIVE_TOKEN},
    routes::{fallback_route, BridgeRoute},
};

/// Quote attempts before falling back to the static route.
const QUOTE_ATTEMPTS: u32 = 2;

/// Total time spent polling, saturating instead of overflowing.
fn poll_window(interval: Duration, attempts: u32) -> Duration {
    interval.saturating_mul(attempts)
}

pub struct BridgeOrchestrator {
    settings: BridgeSettings,
    quotes: Arc<dyn QuoteService>,
}

impl BridgeOrchestrator {
    pub fn new(settings: BridgeSettings, quotes: Arc<dyn QuoteService>) -> Self {
        Self { settings, quotes }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Runs one bridge in `direction` for the session's wallet.
    pub async fn bridge(&self, session: &mut WalletSession, direction: Direction) -> OperationOutcome {
        if !self.settings.is_enabled(direction) {
            info!(direction = %direction, "Bridge direction disabled, skipping");
            return OperationOutcome::Skipped(format!("{} disabled", direction));
        }

        let (amount_text, amount) = match random_amount(&mut rand::rng(), &self.settings.amount) {
            Ok(drawn) => drawn,
            Err(e) => return OperationOutcome::Failed(e.to_string()),
        };

        let source = direction.source();
        let destination = direction.destination();
        let source_balance = session.client_mut(source).get_balance().await;
        let destination_balance = session.client_mut(destination).get_balance().await;

        info!(
            direction = %direction,
            address = %session.address(),
            amount = %amount_text,
            source_balance = %source_balance.formatted,
            destination_balance = %destination_balance.formatted,
            "Starting bridge"
        );

        if source_balance.wei < amount {
            warn!(
                direction = %direction,
                balance = %source_balance.formatted,
                amount = %amount_text,
                "Insufficient balance for bridge"
            );
            return OperationOutcome::Failed(format!(
                "insufficient balance on {}: have {} ETH, need {} ETH",
                source, source_balance.formatted, amount_text
            ));
        }

        let route = self.resolve_route(session, direction, amount).await;

        let tx = TransactionRequest::default()
            .with_to(route.destination)
            .with_value(amount)
            .with_input(route.call_data.clone());
        let label = format!("bridge {}", direction);

        let tx_hash = match session.client_mut(source).send_transaction(tx, &label).await {
            TxResult::Success { tx_hash, .. } => tx_hash,
            TxResult::Failure { kind, message, .. } => {
                error!(direction = %direction, kind = %kind, error = %message, "Bridge submission failed");
                return OperationOutcome::Failed(format!("{}: {}", kind, message));
            }
        };

        if !direction.settles_asynchronously() {
            info!(direction = %direction, tx_hash = %tx_hash, "Bridge submitted");
            return OperationOutcome::Completed {
                tx_hash,
                settled: true,
            };
        }

        // A failed preflight read reports zero, which is no baseline at all.
        let baseline = (!destination_balance.is_error()).then_some(destination_balance.wei);
        let settled = self.await_settlement(session, direction, baseline).await;
        OperationOutcome::Completed { tx_hash, settled }
    }

    /// Quote route for `direction`, or the static fallback.
    async fn resolve_route(
        &self,
        session: &mut WalletSession,
        direction: Direction,
        amount: U256,
    ) -> BridgeRoute {
        let route_id = self.settings.route_id(direction);
        let source = session.client_mut(direction.source());
        let from_chain_id = source.chain_id();
        let from_gas_price = source.get_gas_price(0).await;
        let target = session.client_mut(direction.destination());
        let to_chain_id = target.chain_id();
        let to_gas_price = target.get_gas_price(0).await;

        let request = QuoteRequest {
            host: self.settings.host.clone(),
            amount: amount.to_string(),
            from_chain_id: from_chain_id.to_string(),
            to_chain_id: to_chain_id.to_string(),
            from_token_address: NATIVE_TOKEN,
            to_token_address: NATIVE_TOKEN,
            from_token_decimals: NATIVE_DECIMALS,
            to_token_decimals: NATIVE_DECIMALS,
            from_gas_price: from_gas_price.to_string(),
            to_gas_price: to_gas_price.to_string(),
            graffiti: self.settings.graffiti.clone(),
            recipient: session.address(),
            sender: session.address(),
            force_via_l1: false,
        };

        for attempt in 1..=QUOTE_ATTEMPTS {
            let result = self
                .quotes
                .quote(&request)
                .await
                .and_then(|response| extract_route(&response, route_id));
            match result {
                Ok(route) => {
                    info!(
                        direction = %direction,
                        route = route_id,
                        to = %route.destination,
                        declared_value = %route.declared_value,
                        declared_chain_id = ?route.declared_chain_id,
                        "Using quoted route"
                    );
                    return route;
                }
                Err(e) => warn!(
                    direction = %direction,
                    route = route_id,
                    attempt,
                    error = %e,
                    "Bridge quote failed"
                ),
            }
        }

        let route = fallback_route(direction, amount);
        warn!(
            direction = %direction,
            to = %route.destination,
            "Falling back to static bridge route"
        );
        route
    }

    /// Polls the destination balance until it exceeds `baseline`.
    ///
    /// Without a baseline, the first good reading becomes one. Returns whether
    /// arrival was observed. Exhausting the window is not a failure; the
    /// funding transaction was already accepted.
    async fn await_settlement(
        &self,
        session: &mut WalletSession,
        direction: Direction,
        mut baseline: Option<U256>,
    ) -> bool {
        let destination = session.client_mut(direction.destination());
        let attempts = self.settings.poll_attempts;

        for attempt in 1..=attempts {
            tokio::time::sleep(self.settings.poll_interval).await;
            let reading = destination.get_balance().await;
            if reading.is_error() {
                info!(direction = %direction, attempt, attempts, "Destination balance unavailable");
                continue;
            }
            let Some(before) = baseline else {
                info!(
                    direction = %direction,
                    attempt,
                    balance = %reading.formatted,
                    "Using first destination reading as settlement baseline"
                );
                baseline = Some(reading.wei);
                continue;
            };
            if reading.wei > before {
                info!(
                    direction = %direction,
                    attempt,
                    balance = %reading.formatted,
                    received = %format_eth(reading.wei - before),
                    "Bridge settled on destination"
                );
                return true;
            }
            info!(
                direction = %direction,
                attempt,
                attempts,
                balance = %reading.formatted,
                "Waiting for bridged funds"
            );
        }

        warn!(
            direction = %direction,
            waited = ?poll_window(self.settings.poll_interval, attempts),
            "Settlement not observed before timeout, treating bridge as submitted"
        );
        false
    }

    /// Runs `repeat_times` × every enabled direction with a cooldown between operations.
    pub async fn run_batch(&self, session: &mut WalletSession) -> BatchSummary {
        let mut summary = BatchSummary::default();
        if !self.settings.enabled {
            info!("Bridging disabled");
            return summary;
        }

        session.reset_nonces();
        let directions = self.settings.enabled_directions();
        let total = self.settings.repeat_times as usize * directions.len();

        let mut index = 0;
        for round in 1..=self.settings.repeat_times {
            for direction in &directions {
                index += 1;
                info!(round, operation = index, total, direction = %direction, "Bridge operation");
                let outcome = self.bridge(session, *direction).await;
                summary.record(&outcome);

                if index < total {
                    tokio::time::sleep(self.settings.cooldown).await;
                }
            }
        }

        info!(
            address = %session.address(),
            result = %summary,
            succeeded = summary.succeeded(),
            "Bridge batch finished"
        );
        summary
    }
}
