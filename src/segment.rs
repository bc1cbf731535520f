//! RFM customer aggregation and K-Means value segmentation

use std::collections::HashMap;

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::data::SalesTable;

/// Fixed seed so re-running the pipeline on the same input reproduces the
/// same clusters.
pub const KMEANS_SEED: u64 = 42;
/// Number of value tiers, and therefore clusters.
pub const N_TIERS: usize = 3;
const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;
/// Independent initializations to reduce seed sensitivity.
const N_RUNS: usize = 10;

/// Business value tier, assigned by ranking cluster means, never by raw
/// cluster index, which K-Means hands out in arbitrary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueTier {
    Vip,
    Regular,
    Low,
}

/// Churn risk relative to the dataset's own mean recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChurnState {
    Active,
    AtRisk,
    Lost,
}

/// Per-customer RFM aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerAggregate {
    pub customer_id: String,
    /// Days between the customer's last purchase and the dataset's last date.
    pub recency_days: i64,
    pub total_amount: f64,
    pub frequency: usize,
    pub avg_ticket: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentedCustomer {
    pub aggregate: CustomerAggregate,
    pub value_tier: ValueTier,
    pub churn_state: ChurnState,
}

/// Segmentation output. Fewer than [`N_TIERS`] distinct customers is a
/// defined degraded mode: the aggregates are returned without tier or churn
/// columns, not an error.
#[derive(Debug, Clone, Serialize)]
pub enum Segmentation {
    AggregateOnly(Vec<CustomerAggregate>),
    Segmented(Vec<SegmentedCustomer>),
}

impl Segmentation {
    pub fn customer_count(&self) -> usize {
        match self {
            Segmentation::AggregateOnly(aggs) => aggs.len(),
            Segmentation::Segmented(segs) => segs.len(),
        }
    }
}

/// Group rows by customer id and compute the RFM aggregate for each.
///
/// Rows without a customer id are skipped. The result is sorted by customer
/// id so the clustering input (and with it the fixed-seed output) is stable.
pub fn aggregate_customers(table: &SalesTable) -> Vec<CustomerAggregate> {
    let last_date = match table.last_date() {
        Some(d) => d,
        None => return Vec::new(),
    };

    struct Acc {
        last_purchase: chrono::NaiveDate,
        total: f64,
        count: usize,
    }

    let mut by_customer: HashMap<&str, Acc> = HashMap::new();
    for row in &table.rows {
        let Some(customer) = row.customer.as_deref() else {
            continue;
        };
        by_customer
            .entry(customer)
            .and_modify(|acc| {
                acc.last_purchase = acc.last_purchase.max(row.date);
                acc.total += row.amount;
                acc.count += 1;
            })
            .or_insert(Acc {
                last_purchase: row.date,
                total: row.amount,
                count: 1,
            });
    }

    let mut aggregates: Vec<CustomerAggregate> = by_customer
        .into_iter()
        .map(|(customer_id, acc)| CustomerAggregate {
            customer_id: customer_id.to_string(),
            recency_days: (last_date - acc.last_purchase).num_days(),
            total_amount: acc.total,
            frequency: acc.count,
            avg_ticket: acc.total / acc.count as f64,
        })
        .collect();
    aggregates.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    aggregates
}

/// Full segmentation pass: aggregate, cluster on `total_amount`, label tiers
/// by ranked cluster means, classify churn against mean recency.
///
/// Returns `None` when the table has no customer column (segmentation is
/// disabled, not failed).
pub fn segment_customers(table: &SalesTable) -> crate::Result<Option<Segmentation>> {
    if table.schema.customer_column.is_none() {
        return Ok(None);
    }

    let aggregates = aggregate_customers(table);
    if aggregates.len() < N_TIERS {
        log::info!(
            "only {} customers, returning un-clustered aggregates",
            aggregates.len()
        );
        return Ok(Some(Segmentation::AggregateOnly(aggregates)));
    }

    let labels = cluster_by_monetary(&aggregates)?;
    let tier_by_cluster = rank_clusters(&aggregates, &labels);

    // Self-calibrating churn threshold: first pass computes the mean
    // recency, second pass classifies against it.
    let mean_recency = aggregates
        .iter()
        .map(|a| a.recency_days as f64)
        .sum::<f64>()
        / aggregates.len() as f64;

    let segmented = aggregates
        .into_iter()
        .zip(labels.iter())
        .map(|(aggregate, &cluster)| {
            let churn_state = classify_churn(aggregate.recency_days as f64, mean_recency);
            SegmentedCustomer {
                value_tier: tier_by_cluster[&cluster],
                churn_state,
                aggregate,
            }
        })
        .collect();

    Ok(Some(Segmentation::Segmented(segmented)))
}

/// K-Means on the single `total_amount` feature, fixed seed, multiple runs.
fn cluster_by_monetary(aggregates: &[CustomerAggregate]) -> crate::Result<Array1<usize>> {
    let n = aggregates.len();
    let totals: Vec<f64> = aggregates.iter().map(|a| a.total_amount).collect();
    let records = Array2::from_shape_vec((n, 1), totals)?;
    let dataset = Dataset::new(records, Array1::<usize>::zeros(n));

    let rng = Pcg64Mcg::seed_from_u64(KMEANS_SEED);
    let model = KMeans::params_with(N_TIERS, rng, L2Dist)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .n_runs(N_RUNS)
        .fit(&dataset)?;

    Ok(model.predict(&dataset))
}

/// Map raw cluster indices to tiers by mean `total_amount`, descending.
/// Empty clusters are skipped; tiers are handed out in Vip, Regular, Low
/// order to whatever clusters actually have members.
fn rank_clusters(
    aggregates: &[CustomerAggregate],
    labels: &Array1<usize>,
) -> HashMap<usize, ValueTier> {
    let mut sums = vec![0.0f64; N_TIERS];
    let mut counts = vec![0usize; N_TIERS];
    for (aggregate, &cluster) in aggregates.iter().zip(labels.iter()) {
        sums[cluster] += aggregate.total_amount;
        counts[cluster] += 1;
    }

    let mut means: Vec<(usize, f64)> = (0..N_TIERS)
        .filter(|&c| counts[c] > 0)
        .map(|c| (c, sums[c] / counts[c] as f64))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1));

    const TIER_ORDER: [ValueTier; 3] = [ValueTier::Vip, ValueTier::Regular, ValueTier::Low];
    means
        .into_iter()
        .zip(TIER_ORDER)
        .map(|((cluster, _), tier)| (cluster, tier))
        .collect()
}

fn classify_churn(recency_days: f64, mean_recency: f64) -> ChurnState {
    if recency_days > 2.0 * mean_recency {
        ChurnState::Lost
    } else if recency_days > mean_recency {
        ChurnState::AtRisk
    } else {
        ChurnState::Active
    }
}

/// VIP customers drifting away: the "call these first" list.
pub fn urgent_recovery(segmented: &[SegmentedCustomer]) -> Vec<&SegmentedCustomer> {
    segmented
        .iter()
        .filter(|s| s.value_tier == ValueTier::Vip && s.churn_state != ChurnState::Active)
        .collect()
}

/// Regular customers buying more often than average: upsell candidates.
pub fn upsell_candidates(segmented: &[SegmentedCustomer]) -> Vec<&SegmentedCustomer> {
    if segmented.is_empty() {
        return Vec::new();
    }
    let mean_frequency = segmented
        .iter()
        .map(|s| s.aggregate.frequency as f64)
        .sum::<f64>()
        / segmented.len() as f64;
    segmented
        .iter()
        .filter(|s| {
            s.value_tier == ValueTier::Regular && s.aggregate.frequency as f64 > mean_frequency
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ResolvedSchema, SalesRow, SalesTable};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn table(rows: Vec<(u32, f64, &str)>) -> SalesTable {
        let mut rows: Vec<SalesRow> = rows
            .into_iter()
            .map(|(d, amount, customer)| SalesRow {
                date: day(d),
                amount,
                customer: Some(customer.to_string()),
            })
            .collect();
        rows.sort_by_key(|r| r.date);
        SalesTable {
            schema: ResolvedSchema {
                date_column: "fecha".into(),
                amount_column: "monto".into(),
                customer_column: Some("cliente".into()),
            },
            rows,
        }
    }

    #[test]
    fn aggregates_recency_frequency_monetary() {
        let t = table(vec![
            (1, 100.0, "acme"),
            (10, 200.0, "acme"),
            (20, 50.0, "beta"),
        ]);
        let aggs = aggregate_customers(&t);
        assert_eq!(aggs.len(), 2);

        let acme = &aggs[0];
        assert_eq!(acme.customer_id, "acme");
        assert_eq!(acme.recency_days, 10); // last dataset date is day 20
        assert_eq!(acme.total_amount, 300.0);
        assert_eq!(acme.frequency, 2);
        assert_eq!(acme.avg_ticket, 150.0);

        let beta = &aggs[1];
        assert_eq!(beta.recency_days, 0);
        assert_eq!(beta.frequency, 1);
        assert_eq!(beta.avg_ticket, beta.total_amount / beta.frequency as f64);
    }

    #[test]
    fn two_customers_skip_clustering() {
        let t = table(vec![(1, 100.0, "acme"), (2, 900.0, "beta")]);
        let segmentation = segment_customers(&t).unwrap().unwrap();
        match segmentation {
            Segmentation::AggregateOnly(aggs) => assert_eq!(aggs.len(), 2),
            Segmentation::Segmented(_) => panic!("expected degraded mode"),
        }
    }

    #[test]
    fn no_customer_column_disables_segmentation() {
        let mut t = table(vec![(1, 100.0, "acme")]);
        t.schema.customer_column = None;
        assert!(segment_customers(&t).unwrap().is_none());
    }

    #[test]
    fn tier_means_are_ranked_descending() {
        // three well-separated value bands
        let t = table(vec![
            (1, 10.0, "c1"),
            (2, 12.0, "c2"),
            (3, 500.0, "c3"),
            (4, 520.0, "c4"),
            (5, 5000.0, "c5"),
        ]);
        let segmented = match segment_customers(&t).unwrap().unwrap() {
            Segmentation::Segmented(s) => s,
            other => panic!("expected clustering to run, got {other:?}"),
        };

        let mean_of = |tier: ValueTier| {
            let members: Vec<f64> = segmented
                .iter()
                .filter(|s| s.value_tier == tier)
                .map(|s| s.aggregate.total_amount)
                .collect();
            assert!(!members.is_empty(), "tier {tier:?} has no members");
            members.iter().sum::<f64>() / members.len() as f64
        };

        let vip = mean_of(ValueTier::Vip);
        let regular = mean_of(ValueTier::Regular);
        let low = mean_of(ValueTier::Low);
        assert!(vip >= regular && regular >= low, "{vip} {regular} {low}");
    }

    #[test]
    fn churn_thresholds_follow_mean_recency() {
        assert_eq!(classify_churn(0.0, 10.0), ChurnState::Active);
        assert_eq!(classify_churn(10.0, 10.0), ChurnState::Active);
        assert_eq!(classify_churn(11.0, 10.0), ChurnState::AtRisk);
        assert_eq!(classify_churn(20.0, 10.0), ChurnState::AtRisk);
        assert_eq!(classify_churn(21.0, 10.0), ChurnState::Lost);
    }

    #[test]
    fn churn_states_respect_invariants_end_to_end() {
        let t = table(vec![
            (1, 100.0, "old"),
            (15, 200.0, "mid"),
            (28, 300.0, "recent1"),
            (29, 310.0, "recent2"),
            (30, 320.0, "recent3"),
        ]);
        let segmented = match segment_customers(&t).unwrap().unwrap() {
            Segmentation::Segmented(s) => s,
            other => panic!("expected clustering to run, got {other:?}"),
        };
        let mean_recency = segmented
            .iter()
            .map(|s| s.aggregate.recency_days as f64)
            .sum::<f64>()
            / segmented.len() as f64;
        for s in &segmented {
            let r = s.aggregate.recency_days as f64;
            match s.churn_state {
                ChurnState::Lost => assert!(r > 2.0 * mean_recency),
                ChurnState::AtRisk => assert!(r > mean_recency && r <= 2.0 * mean_recency),
                ChurnState::Active => assert!(r <= mean_recency),
            }
        }
    }

    #[test]
    fn segmentation_is_deterministic() {
        let t = table(vec![
            (1, 10.0, "c1"),
            (2, 12.0, "c2"),
            (3, 500.0, "c3"),
            (4, 520.0, "c4"),
            (5, 5000.0, "c5"),
            (6, 40.0, "c6"),
            (7, 480.0, "c7"),
        ]);
        let first = segment_customers(&t).unwrap().unwrap();
        let second = segment_customers(&t).unwrap().unwrap();
        let tiers = |seg: &Segmentation| match seg {
            Segmentation::Segmented(s) => s
                .iter()
                .map(|c| (c.aggregate.customer_id.clone(), c.value_tier))
                .collect::<Vec<_>>(),
            _ => panic!("expected clustering to run"),
        };
        assert_eq!(tiers(&first), tiers(&second));
    }

    #[test]
    fn insight_lists_pick_the_right_customers() {
        let segmented = vec![
            SegmentedCustomer {
                aggregate: CustomerAggregate {
                    customer_id: "vip-fading".into(),
                    recency_days: 40,
                    total_amount: 5000.0,
                    frequency: 2,
                    avg_ticket: 2500.0,
                },
                value_tier: ValueTier::Vip,
                churn_state: ChurnState::AtRisk,
            },
            SegmentedCustomer {
                aggregate: CustomerAggregate {
                    customer_id: "vip-healthy".into(),
                    recency_days: 1,
                    total_amount: 6000.0,
                    frequency: 4,
                    avg_ticket: 1500.0,
                },
                value_tier: ValueTier::Vip,
                churn_state: ChurnState::Active,
            },
            SegmentedCustomer {
                aggregate: CustomerAggregate {
                    customer_id: "regular-frequent".into(),
                    recency_days: 3,
                    total_amount: 800.0,
                    frequency: 9,
                    avg_ticket: 88.9,
                },
                value_tier: ValueTier::Regular,
                churn_state: ChurnState::Active,
            },
            SegmentedCustomer {
                aggregate: CustomerAggregate {
                    customer_id: "regular-rare".into(),
                    recency_days: 12,
                    total_amount: 400.0,
                    frequency: 1,
                    avg_ticket: 400.0,
                },
                value_tier: ValueTier::Regular,
                churn_state: ChurnState::AtRisk,
            },
        ];

        let urgent = urgent_recovery(&segmented);
        assert_eq!(urgent.len(), 1);
        assert_eq!(urgent[0].aggregate.customer_id, "vip-fading");

        let upsell = upsell_candidates(&segmented);
        assert_eq!(upsell.len(), 1);
        assert_eq!(upsell[0].aggregate.customer_id, "regular-frequent");
    }
}
