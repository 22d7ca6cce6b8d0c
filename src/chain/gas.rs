//! Gas price computation.

/// Wei per gwei.
pub const GWEI: f64 = 1_000_000_000.0;

/// Safety buffer applied to node gas estimates, as a ratio.
pub const GAS_ESTIMATE_BUFFER: (u64, u64) = (12, 10);

/// One pricing decision. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasQuote {
    pub network_price: u128,
    pub multiplier: f64,
    pub adjusted_price: u128,
    pub clamped_price: u128,
}

impl GasQuote {
    /// `network_price × base_multiplier × retry_increase^retry_count`, clamped to `[min_wei, max_wei]`.
    pub fn compute(
        network_price: u128,
        base_multiplier: f64,
        retry_increase: f64,
        retry_count: u32,
        min_wei: u128,
        max_wei: u128,
    ) -> Self {
        let multiplier = base_multiplier * retry_increase.powi(retry_count as i32);
        let adjusted_price = (network_price as f64 * multiplier) as u128;
        let clamped_price = adjusted_price.clamp(min_wei, max_wei.max(min_wei));
        Self {
            network_price,
            multiplier,
            adjusted_price,
            clamped_price,
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.adjusted_price != self.clamped_price
    }
}

pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * GWEI).round().max(0.0) as u128
}

pub fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / GWEI
}

/// Applies [`GAS_ESTIMATE_BUFFER`], rounding down.
pub fn buffered_gas_limit(estimate: u64) -> u64 {
    let (num, den) = GAS_ESTIMATE_BUFFER;
    estimate.saturating_mul(num) / den
}
