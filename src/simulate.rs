//! What-if profitability scenarios
//!
//! Pure arithmetic over four scalars, recomputed per request. A price
//! increase dampens volume through a fixed elasticity factor; a cost
//! reduction scales the (volume-adjusted) cost base.

use serde::Serialize;

/// Each 1% of price increase loses 0.2% of volume.
pub const ELASTICITY_FACTOR: f64 = 0.2;

#[derive(Debug, Clone, Copy)]
pub struct ScenarioInput {
    pub current_revenue: f64,
    pub current_margin_pct: f64,
    pub price_increase_pct: f64,
    pub cost_reduction_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScenarioResult {
    pub current_profit: f64,
    pub projected_profit: f64,
    pub delta: f64,
}

/// Project profit under a price increase and a cost reduction.
///
/// Inputs are defensively clamped (revenue to >= 0, percentages to
/// [0, 100]); the UI pre-clamps but this function does not rely on it.
pub fn simulate(input: &ScenarioInput) -> ScenarioResult {
    let revenue = input.current_revenue.max(0.0);
    let margin = clamp_pct(input.current_margin_pct);
    let price_increase = clamp_pct(input.price_increase_pct);
    let cost_reduction = clamp_pct(input.cost_reduction_pct);

    let current_cost = revenue * (1.0 - margin / 100.0);
    let current_profit = revenue - current_cost;

    let volume_adjustment = 1.0 - (price_increase / 100.0 * ELASTICITY_FACTOR);
    let new_revenue = revenue * (1.0 + price_increase / 100.0) * volume_adjustment;
    let new_cost = current_cost * (1.0 - cost_reduction / 100.0) * volume_adjustment;
    let projected_profit = new_revenue - new_cost;

    ScenarioResult {
        current_profit,
        projected_profit,
        delta: projected_profit - current_profit,
    }
}

fn clamp_pct(pct: f64) -> f64 {
    pct.clamp(0.0, 100.0)
}
