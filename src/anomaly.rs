//! Outlier transaction detection via an isolation forest on amounts
//!
//! Works on the raw per-transaction amount distribution, independently of
//! the customer aggregates. Isolation trees split the value range at random
//! thresholds; points that isolate in few splits (short average path length)
//! score close to 1 and are flagged.

use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::Serialize;

use crate::data::SalesTable;

/// Expected fraction of rows flagged as outliers.
pub const CONTAMINATION: f64 = 0.05;
/// Below this many rows the outlier fraction is unstable noise, so the
/// detector flags nothing.
pub const MIN_ROWS: usize = 10;
/// Fixed seed so flags are reproducible across pipeline passes.
pub const ANOMALY_SEED: u64 = 7;

const N_TREES: usize = 100;
const MAX_SUBSAMPLE: usize = 256;

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// A flagged transaction, in original row order.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalousRow {
    pub index: usize,
    pub date: NaiveDate,
    pub amount: f64,
    /// Isolation score in (0, 1]; higher isolates faster.
    pub score: f64,
}

/// Score every transaction amount and flag the top `ceil(0.05 * n)`.
pub fn detect_anomalies(table: &SalesTable) -> Vec<AnomalousRow> {
    let amounts = table.amounts();
    let n = amounts.len();
    if n < MIN_ROWS {
        log::info!("{n} rows is below the anomaly-detection minimum of {MIN_ROWS}, skipping");
        return Vec::new();
    }

    let scores = isolation_scores(&amounts, ANOMALY_SEED);

    let flag_count = (CONTAMINATION * n as f64).ceil() as usize;
    let mut order: Vec<usize> = (0..n).collect();
    // highest score first, row index breaks ties
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));

    let mut flagged: Vec<usize> = order.into_iter().take(flag_count).collect();
    flagged.sort_unstable();
    flagged
        .into_iter()
        .map(|index| AnomalousRow {
            index,
            date: table.rows[index].date,
            amount: table.rows[index].amount,
            score: scores[index],
        })
        .collect()
}

/// Isolation-forest anomaly score per value: `2^(-E[h(x)] / c(psi))`.
fn isolation_scores(values: &[f64], seed: u64) -> Vec<f64> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let subsample = values.len().min(MAX_SUBSAMPLE);
    let depth_limit = (subsample as f64).log2().ceil() as usize;
    let normalizer = average_path_length(subsample);

    let mut path_sums = vec![0.0f64; values.len()];
    for _ in 0..N_TREES {
        let sample = draw_subsample(values, subsample, &mut rng);
        let tree = IsoNode::build(sample, 0, depth_limit, &mut rng);
        for (i, &v) in values.iter().enumerate() {
            path_sums[i] += tree.path_length(v, 0.0);
        }
    }

    path_sums
        .into_iter()
        .map(|sum| {
            let mean_path = sum / N_TREES as f64;
            2f64.powf(-mean_path / normalizer)
        })
        .collect()
}

enum IsoNode {
    Split {
        threshold: f64,
        below: Box<IsoNode>,
        above: Box<IsoNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsoNode {
    fn build(values: Vec<f64>, depth: usize, limit: usize, rng: &mut Pcg64Mcg) -> IsoNode {
        let (min, max) = match bounds(&values) {
            Some(b) => b,
            None => return IsoNode::Leaf { size: values.len() },
        };
        if depth >= limit || values.len() <= 1 || min == max {
            return IsoNode::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let (below, above): (Vec<f64>, Vec<f64>) =
            values.into_iter().partition(|&v| v < threshold);
        IsoNode::Split {
            threshold,
            below: Box::new(IsoNode::build(below, depth + 1, limit, rng)),
            above: Box::new(IsoNode::build(above, depth + 1, limit, rng)),
        }
    }

    fn path_length(&self, value: f64, depth: f64) -> f64 {
        match self {
            IsoNode::Leaf { size } => depth + average_path_length(*size),
            IsoNode::Split {
                threshold,
                below,
                above,
            } => {
                if value < *threshold {
                    below.path_length(value, depth + 1.0)
                } else {
                    above.path_length(value, depth + 1.0)
                }
            }
        }
    }
}

fn bounds(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    let mut min = first;
    let mut max = first;
    for &v in &values[1..] {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

/// Expected path length of an unsuccessful BST search over `n` points,
/// the standard isolation-forest normalizer.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
}

/// Partial Fisher-Yates draw without replacement.
fn draw_subsample(values: &[f64], count: usize, rng: &mut Pcg64Mcg) -> Vec<f64> {
    if count >= values.len() {
        return values.to_vec();
    }
    let mut pool: Vec<f64> = values.to_vec();
    for i in 0..count {
        let j = rng.gen_range(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ResolvedSchema, SalesRow, SalesTable};

    fn table(amounts: &[f64]) -> SalesTable {
        SalesTable {
            schema: ResolvedSchema {
                date_column: "fecha".into(),
                amount_column: "monto".into(),
                customer_column: None,
            },
            rows: amounts
                .iter()
                .enumerate()
                .map(|(i, &amount)| SalesRow {
                    date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                        + chrono::Duration::days(i as i64),
                    amount,
                    customer: None,
                })
                .collect(),
        }
    }

    #[test]
    fn extreme_value_in_tight_cluster_is_flagged() {
        // 20 tight values around 100, one at 100x the mean
        let mut amounts: Vec<f64> = (0..20).map(|i| 95.0 + (i % 10) as f64).collect();
        amounts.push(10_000.0);
        let t = table(&amounts);

        let flagged = detect_anomalies(&t);
        assert!(!flagged.is_empty());
        assert!(
            flagged.iter().any(|a| a.amount == 10_000.0),
            "the injected outlier must be flagged: {flagged:?}"
        );
        // contamination 0.05 over 21 rows flags ceil(1.05) = 2 rows at most
        assert!(flagged.len() <= 2);
    }

    #[test]
    fn small_tables_are_skipped() {
        let t = table(&[100.0, 110.0, 5000.0]);
        assert!(detect_anomalies(&t).is_empty());
    }

    #[test]
    fn flags_are_deterministic() {
        let amounts: Vec<f64> = (0..50)
            .map(|i| 200.0 + (i * 7 % 23) as f64)
            .chain([9_999.0])
            .collect();
        let t = table(&amounts);
        let first: Vec<usize> = detect_anomalies(&t).iter().map(|a| a.index).collect();
        let second: Vec<usize> = detect_anomalies(&t).iter().map(|a| a.index).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn flag_count_tracks_contamination() {
        let amounts: Vec<f64> = (0..100).map(|i| 100.0 + (i % 5) as f64).collect();
        let t = table(&amounts);
        let flagged = detect_anomalies(&t);
        assert_eq!(flagged.len(), 5); // ceil(0.05 * 100)
    }

    #[test]
    fn output_preserves_row_order() {
        let mut amounts: Vec<f64> = (0..40).map(|i| 300.0 + (i % 7) as f64).collect();
        amounts[5] = 50_000.0;
        amounts[30] = 45_000.0;
        let t = table(&amounts);
        let flagged = detect_anomalies(&t);
        let indices: Vec<usize> = flagged.iter().map(|a| a.index).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn scores_increase_with_distance_from_the_pack() {
        let mut amounts: Vec<f64> = (0..30).map(|_| 100.0).collect();
        amounts.push(101.0);
        amounts.push(100_000.0);
        let scores = isolation_scores(&amounts, ANOMALY_SEED);
        let extreme = scores[31];
        let typical = scores[0];
        assert!(extreme > typical, "{extreme} vs {typical}");
    }
}
