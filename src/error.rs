//! Fatal pipeline errors.
//!
//! Only schema resolution and an empty cleaned table abort the pipeline.
//! Every other bad situation (too few rows for a trend, too few customers to
//! cluster, a singular fit, an unreachable indicator feed) degrades to a
//! defined fallback inside its own stage so the rest of the dashboard still
//! renders.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The upload has no recognizable date and/or amount column. Nothing
    /// downstream can run without them.
    #[error("required columns missing ({missing}); headers were {headers:?}")]
    MissingRequiredColumns { missing: String, headers: Vec<String> },

    /// Every row was dropped during cleaning (unparseable dates, non-finite
    /// amounts).
    #[error("no valid rows remain after cleaning the input table")]
    EmptyTable,
}
