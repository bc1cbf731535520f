//! Linear trend fitting and projection over the date axis

use chrono::{Datelike, Duration, NaiveDate};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::data::SalesTable;

/// Default projection horizon in days.
pub const DEFAULT_HORIZON_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointKind {
    Historical,
    Projected,
}

/// Trend direction from the slope sign. A flat fit classifies as `Downward`
/// (strict `> 0` test).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Upward,
    Downward,
}

impl TrendDirection {
    pub fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            TrendDirection::Upward
        } else {
            TrendDirection::Downward
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Upward => "upward",
            TrendDirection::Downward => "downward",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub amount: f64,
    pub kind: PointKind,
}

/// Fitted trend plus the combined historical + projected series
/// (historical rows first, in date order).
#[derive(Debug, Clone, Serialize)]
pub struct TrendResult {
    pub slope: f64,
    pub intercept: f64,
    pub direction: TrendDirection,
    pub series: Vec<TrendPoint>,
}

impl TrendResult {
    pub fn projected(&self) -> impl Iterator<Item = &TrendPoint> {
        self.series
            .iter()
            .filter(|p| p.kind == PointKind::Projected)
    }

    /// Sum of the projected amounts over the horizon.
    pub fn projected_revenue(&self) -> f64 {
        self.projected().map(|p| p.amount).sum()
    }
}

/// Fit amount against ordinal date and extrapolate `horizon_days` forward.
///
/// Fewer than two rows yields the undefined-trend fallback: slope 0 and no
/// projected rows. A zero-variance date axis (or any failed fit) degrades to
/// slope 0 with the fit flat at the mean amount; it never errors.
pub fn project_trend(table: &SalesTable, horizon_days: u32) -> TrendResult {
    let historical: Vec<TrendPoint> = table
        .rows
        .iter()
        .map(|r| TrendPoint {
            date: r.date,
            amount: r.amount,
            kind: PointKind::Historical,
        })
        .collect();

    if table.len() < 2 {
        let mean = table.avg_ticket();
        return TrendResult {
            slope: 0.0,
            intercept: mean,
            direction: TrendDirection::from_slope(0.0),
            series: historical,
        };
    }

    let ordinals: Vec<f64> = table
        .rows
        .iter()
        .map(|r| f64::from(r.date.num_days_from_ce()))
        .collect();
    let amounts = table.amounts();
    let mean = table.avg_ticket();

    let (slope, intercept) = fit_line(&ordinals, &amounts).unwrap_or_else(|| {
        log::warn!("degenerate trend fit, falling back to flat mean");
        (0.0, mean)
    });

    // last_date is Some: len >= 2 here
    let last_date = table.last_date().unwrap_or_default();
    let last_ordinal = f64::from(last_date.num_days_from_ce());

    let mut series = historical;
    series.reserve(horizon_days as usize);
    for day in 1..=i64::from(horizon_days) {
        series.push(TrendPoint {
            date: last_date + Duration::days(day),
            amount: intercept + slope * (last_ordinal + day as f64),
            kind: PointKind::Projected,
        });
    }

    TrendResult {
        slope,
        intercept,
        direction: TrendDirection::from_slope(slope),
        series,
    }
}

/// Ordinary least squares with a single predictor. Returns `None` when the
/// predictor has no variance or the solver rejects the system.
fn fit_line(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let first = xs.first()?;
    if xs.iter().all(|x| x == first) {
        return None;
    }

    let n = xs.len();
    let records = Array2::from_shape_vec((n, 1), xs.to_vec()).ok()?;
    let targets = Array1::from_vec(ys.to_vec());
    let dataset = Dataset::new(records, targets);

    let model = LinearRegression::new().fit(&dataset).ok()?;
    Some((model.params()[0], model.intercept()))
}
