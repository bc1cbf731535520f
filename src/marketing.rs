//! Per-industry marketing plans and campaign projections
//!
//! Static lookup table keyed by industry; budget-mix percentages always sum
//! to 100. Channel names and messages are kept in the market's language.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum Industry {
    TransportLogistics,
    RetailCommerce,
    AgroFood,
    /// Generic services profile, also the fallback for unknown labels.
    ProfessionalServices,
}

impl Industry {
    /// Resolve a free-text label; anything unrecognized falls back to the
    /// generic services profile (default-case policy, not an error).
    pub fn from_label(label: &str) -> Industry {
        let lower = label.to_lowercase();
        if lower.contains("transport") || lower.contains("logist") {
            Industry::TransportLogistics
        } else if lower.contains("retail") || lower.contains("comercio") {
            Industry::RetailCommerce
        } else if lower.contains("agro") || lower.contains("aliment") || lower.contains("food") {
            Industry::AgroFood
        } else {
            Industry::ProfessionalServices
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Industry::TransportLogistics => "Transporte / Logística",
            Industry::RetailCommerce => "Retail / Comercio",
            Industry::AgroFood => "Agro / Alimentos",
            Industry::ProfessionalServices => "Servicios Profesionales",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketingPlan {
    pub channels: &'static [&'static str],
    pub message: &'static str,
    /// Estimated cost per lead, CLP.
    pub cost_per_lead: f64,
    /// Leads that convert to a sale.
    pub conversion_rate: f64,
    /// Budget split across `channels`, percentages summing to 100.
    pub budget_mix_pct: &'static [u32],
}

static TRANSPORT_PLAN: MarketingPlan = MarketingPlan {
    channels: &["Google Ads (B2B)", "Email Directo", "LinkedIn"],
    message: "Seguridad y Puntualidad Certificada.",
    cost_per_lead: 15_000.0,
    conversion_rate: 0.10,
    budget_mix_pct: &[50, 30, 20],
};

static RETAIL_PLAN: MarketingPlan = MarketingPlan {
    channels: &["Instagram Ads", "TikTok", "Google Shopping"],
    message: "Ofertas Flash 24h.",
    cost_per_lead: 3_000.0,
    conversion_rate: 0.05,
    budget_mix_pct: &[40, 35, 25],
};

static AGRO_PLAN: MarketingPlan = MarketingPlan {
    channels: &["Facebook Local", "WhatsApp", "Radio"],
    message: "Directo del Productor.",
    cost_per_lead: 5_000.0,
    conversion_rate: 0.20,
    budget_mix_pct: &[45, 35, 20],
};

static SERVICES_PLAN: MarketingPlan = MarketingPlan {
    channels: &["Google SEO", "Referidos", "Blog"],
    message: "Experiencia Garantizada.",
    cost_per_lead: 8_000.0,
    conversion_rate: 0.15,
    budget_mix_pct: &[50, 30, 20],
};

pub fn plan_for(industry: Industry) -> &'static MarketingPlan {
    match industry {
        Industry::TransportLogistics => &TRANSPORT_PLAN,
        Industry::RetailCommerce => &RETAIL_PLAN,
        Industry::AgroFood => &AGRO_PLAN,
        Industry::ProfessionalServices => &SERVICES_PLAN,
    }
}

pub fn all_industries() -> [Industry; 4] {
    [
        Industry::TransportLogistics,
        Industry::RetailCommerce,
        Industry::AgroFood,
        Industry::ProfessionalServices,
    ]
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CampaignProjection {
    pub leads: u64,
    pub sales: u64,
    pub revenue_estimate: f64,
}

/// Estimate campaign outcomes under a budget. `avg_ticket` comes from the
/// caller's sales table.
pub fn project_campaign(
    plan: &MarketingPlan,
    budget: f64,
    avg_ticket: f64,
) -> CampaignProjection {
    let budget = budget.max(0.0);
    let leads = (budget / plan.cost_per_lead).floor() as u64;
    let sales = (leads as f64 * plan.conversion_rate).floor() as u64;
    CampaignProjection {
        leads,
        sales,
        revenue_estimate: sales as f64 * avg_ticket.max(0.0),
    }
}
