//! Command-line interface definitions and argument parsing

use clap::Parser;

use crate::marketing::Industry;
use crate::trend::DEFAULT_HORIZON_DAYS;

/// Sales analytics pipeline: trend, segmentation, anomalies and growth plan
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Industry profile for the marketing plan
    #[arg(long, value_enum, default_value = "professional-services")]
    pub industry: Industry,

    /// Marketing budget, CLP
    #[arg(short, long, default_value_t = 250_000.0)]
    pub budget: f64,

    /// Projection horizon in days
    #[arg(long, default_value_t = DEFAULT_HORIZON_DAYS)]
    pub horizon: u32,

    /// Current profit margin, percent
    #[arg(long, default_value_t = 30.0)]
    pub margin: f64,

    /// Simulated price increase, percent
    #[arg(long, default_value_t = 0.0)]
    pub price_increase: f64,

    /// Simulated cost reduction, percent
    #[arg(long, default_value_t = 0.0)]
    pub cost_reduction: f64,

    /// Write the structured report as JSON to this path
    #[arg(short, long)]
    pub report: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Reject inputs the sliders in a UI would never produce.
    pub fn validate(&self) -> crate::Result<()> {
        if self.budget <= 0.0 {
            anyhow::bail!("budget must be positive, got {}", self.budget);
        }
        if self.horizon == 0 {
            anyhow::bail!("projection horizon must be at least 1 day");
        }
        for (name, pct) in [
            ("margin", self.margin),
            ("price-increase", self.price_increase),
            ("cost-reduction", self.cost_reduction),
        ] {
            if !(0.0..=100.0).contains(&pct) {
                anyhow::bail!("{name} must be between 0 and 100, got {pct}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            input: "test.csv".to_string(),
            industry: Industry::RetailCommerce,
            budget: 250_000.0,
            horizon: 30,
            margin: 30.0,
            price_increase: 0.0,
            cost_reduction: 0.0,
            report: None,
            verbose: false,
        }
    }

    #[test]
    fn default_like_args_validate() {
        assert!(args().validate().is_ok());
    }

    #[test]
    fn bad_budget_and_horizon_are_rejected() {
        let mut a = args();
        a.budget = 0.0;
        assert!(a.validate().is_err());

        let mut a = args();
        a.horizon = 0;
        assert!(a.validate().is_err());
    }

    #[test]
    fn out_of_range_percentages_are_rejected() {
        let mut a = args();
        a.price_increase = 120.0;
        assert!(a.validate().is_err());

        let mut a = args();
        a.margin = -5.0;
        assert!(a.validate().is_err());
    }
}
