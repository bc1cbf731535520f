//! GrowthLens: sales analytics pipeline for small-business dashboards
//!
//! Entrypoint that runs one full pipeline pass: load and resolve the table,
//! fit the trend, segment customers, flag anomalies, then run the what-if
//! simulator and marketing projection and hand a structured report to
//! whatever renders it.

use anyhow::Result;
use clap::Parser;
use growthlens::indicators::{CachedIndicators, OfflineSource};
use growthlens::marketing::{plan_for, project_campaign};
use growthlens::report::build_report;
use growthlens::simulate::{simulate, ScenarioInput};
use growthlens::{anomaly, load_sales_table, project_trend, segment_customers, Args, Segmentation};
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    args.validate()?;

    if args.verbose {
        println!("GrowthLens - Sales Analytics Pipeline");
        println!("=====================================\n");
    }

    let start_time = Instant::now();

    // Step 1: load and resolve the table. The only fatal failures live here.
    if args.verbose {
        println!("Step 1: Loading {}", args.input);
    }
    let table = load_sales_table(&args.input)?;
    println!(
        "✓ Loaded {} transactions, total revenue ${:.0}",
        table.len(),
        table.total_revenue()
    );

    // Step 2: trend fit and projection
    let trend_start = Instant::now();
    let trend = project_trend(&table, args.horizon);
    println!(
        "✓ Trend: {} (slope {:.4}), {} projected days",
        trend.direction.label(),
        trend.slope,
        trend.projected().count()
    );
    if args.verbose {
        println!(
            "  Projected {}-day revenue: ${:.0}",
            args.horizon,
            trend.projected_revenue()
        );
        println!("  Fitting time: {:.2}s", trend_start.elapsed().as_secs_f64());
    }

    // Step 3: customer segmentation
    let segmentation = segment_customers(&table)?;
    match &segmentation {
        None => println!("- No customer column found, segmentation skipped"),
        Some(Segmentation::AggregateOnly(aggs)) => {
            println!(
                "- Only {} customers, aggregates computed without tiers",
                aggs.len()
            );
        }
        Some(Segmentation::Segmented(segmented)) => {
            println!("✓ Segmented {} customers", segmented.len());
            if args.verbose {
                let urgent = growthlens::segment::urgent_recovery(segmented);
                let upsell = growthlens::segment::upsell_candidates(segmented);
                println!("  Urgent recovery (VIP at risk): {}", urgent.len());
                for customer in &urgent {
                    println!(
                        "    {}: ${:.0} total, {} days since last purchase",
                        customer.aggregate.customer_id,
                        customer.aggregate.total_amount,
                        customer.aggregate.recency_days
                    );
                }
                println!("  Upsell candidates: {}", upsell.len());
            }
        }
    }

    // Step 4: anomalies
    let anomalies = anomaly::detect_anomalies(&table);
    println!("✓ Anomalies flagged: {}", anomalies.len());
    if args.verbose {
        for row in &anomalies {
            println!(
                "    {} ${:.0} (score {:.3})",
                row.date, row.amount, row.score
            );
        }
    }

    // Step 5: what-if scenario from the CLI sliders
    let scenario = simulate(&ScenarioInput {
        current_revenue: table.total_revenue(),
        current_margin_pct: args.margin,
        price_increase_pct: args.price_increase,
        cost_reduction_pct: args.cost_reduction,
    });
    println!(
        "✓ Scenario: profit ${:.0} -> ${:.0} (delta {:+.0})",
        scenario.current_profit, scenario.projected_profit, scenario.delta
    );

    // Step 6: marketing plan and campaign projection
    let plan = plan_for(args.industry);
    let campaign = project_campaign(plan, args.budget, table.avg_ticket());
    println!(
        "✓ Marketing ({}): {} leads, ~{} sales, est. revenue ${:.0}",
        args.industry.label(),
        campaign.leads,
        campaign.sales,
        campaign.revenue_estimate
    );
    if args.verbose {
        println!("  Channels: {}", plan.channels.join(", "));
        println!("  Message: {}", plan.message);
    }

    // Economic indicators are cosmetic context; offline runs get zeros.
    let indicators = CachedIndicators::new(OfflineSource);
    if args.verbose {
        let values = indicators.get();
        let mut names: Vec<_> = values.keys().collect();
        names.sort();
        for name in names {
            println!("  Indicator {}: {:.2}", name, values[name]);
        }
    }

    // Step 7: structured report for the renderer
    let report = build_report(
        &table,
        &trend,
        segmentation.as_ref(),
        &anomalies,
        args.industry,
        plan,
        &campaign,
    );
    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("✓ Report written to {path}");
    }
    println!("\nRecommendation: {}", report.recommendation);
    println!(
        "Stability: {} | Trend: {}",
        report.stability_label, report.trend_label
    );

    println!(
        "\nPipeline complete in {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
