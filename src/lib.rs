//! GrowthLens: a sales analytics pipeline for small-business dashboards
//!
//! Given a tabular sales export (date, amount, optional customer), this
//! library resolves the column roles, fits a linear sales trend, segments
//! customers by value with K-Means, flags outlier transactions, and feeds a
//! what-if profit simulator and a per-industry marketing plan. The outputs
//! are plain structured values for an external renderer; nothing here draws
//! or serves anything.

pub mod anomaly;
pub mod cli;
pub mod data;
pub mod error;
pub mod indicators;
pub mod marketing;
pub mod report;
pub mod segment;
pub mod simulate;
pub mod trend;

// Re-export the types callers touch on every pipeline pass
pub use cli::Args;
pub use data::{load_sales_table, resolve_schema, ResolvedSchema, SalesRow, SalesTable};
pub use error::AnalyticsError;
pub use segment::{segment_customers, CustomerAggregate, Segmentation, SegmentedCustomer};
pub use trend::{project_trend, TrendDirection, TrendResult};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
