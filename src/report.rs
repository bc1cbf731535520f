//! Structured report payload for the external renderer
//!
//! The pipeline emits only these values; pagination, layout and typography
//! belong to whoever consumes them.

use serde::Serialize;

use crate::anomaly::AnomalousRow;
use crate::data::SalesTable;
use crate::marketing::{CampaignProjection, Industry, MarketingPlan};
use crate::segment::Segmentation;
use crate::trend::TrendResult;

/// Coefficient-of-variation cutoffs for the stability label.
const STABLE_CV: f64 = 0.25;
const VARIABLE_CV: f64 = 0.75;

#[derive(Debug, Clone, Serialize)]
pub struct KpiEntry {
    pub name: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_revenue: f64,
    pub trend_label: &'static str,
    pub stability_label: &'static str,
    pub industry: &'static str,
    pub kpis: Vec<KpiEntry>,
    pub recommendation: String,
}

/// Assemble the report payload from the pipeline outputs.
pub fn build_report(
    table: &SalesTable,
    trend: &TrendResult,
    segmentation: Option<&Segmentation>,
    anomalies: &[AnomalousRow],
    industry: Industry,
    plan: &MarketingPlan,
    campaign: &CampaignProjection,
) -> ReportSummary {
    let total_revenue = table.total_revenue();
    let customer_count = segmentation.map(Segmentation::customer_count).unwrap_or(0);

    let kpis = vec![
        KpiEntry {
            name: "total_revenue",
            value: total_revenue,
        },
        KpiEntry {
            name: "transaction_count",
            value: table.len() as f64,
        },
        KpiEntry {
            name: "avg_ticket",
            value: table.avg_ticket(),
        },
        KpiEntry {
            name: "customer_count",
            value: customer_count as f64,
        },
        KpiEntry {
            name: "trend_slope",
            value: trend.slope,
        },
        KpiEntry {
            name: "projected_revenue",
            value: trend.projected_revenue(),
        },
        KpiEntry {
            name: "anomaly_count",
            value: anomalies.len() as f64,
        },
    ];

    ReportSummary {
        total_revenue,
        trend_label: trend.direction.label(),
        stability_label: stability_label(&table.amounts()),
        industry: industry.label(),
        kpis,
        recommendation: recommendation_text(trend, plan, campaign),
    }
}

/// Stability from the coefficient of variation of the amounts.
fn stability_label(amounts: &[f64]) -> &'static str {
    let n = amounts.len();
    if n < 2 {
        return "stable";
    }
    let mean = amounts.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return "volatile";
    }
    let variance = amounts.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n as f64;
    let cv = (variance.sqrt() / mean).abs();
    if cv < STABLE_CV {
        "stable"
    } else if cv < VARIABLE_CV {
        "variable"
    } else {
        "volatile"
    }
}

fn recommendation_text(
    trend: &TrendResult,
    plan: &MarketingPlan,
    campaign: &CampaignProjection,
) -> String {
    let trend_advice = match trend.direction {
        crate::trend::TrendDirection::Upward => {
            "Sales are trending upward; reinvest in the channels that already convert."
        }
        crate::trend::TrendDirection::Downward => {
            "Sales are trending downward; prioritize reactivation before acquisition."
        }
    };
    format!(
        "{trend_advice} Recommended mix: {channels}. Key message: \"{message}\" \
         Expected from budget: {leads} leads, ~{sales} sales.",
        channels = plan.channels.join(", "),
        message = plan.message,
        leads = campaign.leads,
        sales = campaign.sales,
    )
}
