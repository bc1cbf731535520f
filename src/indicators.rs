//! Economic indicator feed with a process-wide TTL cache
//!
//! The feed itself is an external collaborator behind [`IndicatorSource`];
//! implementations own their transport and timeout. The cache holds a single
//! entry, refetches only once per expiry, and substitutes a zero-valued
//! default map on failure so a dead feed never takes the dashboard down.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Indicators the dashboard shows. Unknown extras from a source pass
/// through untouched.
pub const INDICATOR_NAMES: &[&str] = &["uf", "dolar", "ipc"];

/// Cache entries live for an hour before a refetch is attempted.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

pub trait IndicatorSource {
    /// Fetch the current indicator values. Implementations should bound this
    /// with a short timeout; a slow feed is a failed feed.
    fn fetch(&self) -> crate::Result<HashMap<String, f64>>;
}

/// All known indicators at zero, the fallback when the feed is unreachable.
pub fn zero_defaults() -> HashMap<String, f64> {
    INDICATOR_NAMES
        .iter()
        .map(|name| (name.to_string(), 0.0))
        .collect()
}

struct CacheSlot {
    values: HashMap<String, f64>,
    fetched_at: Instant,
}

/// Single-entry TTL cache over an [`IndicatorSource`].
pub struct CachedIndicators<S: IndicatorSource> {
    source: S,
    ttl: Duration,
    slot: Mutex<Option<CacheSlot>>,
}

impl<S: IndicatorSource> CachedIndicators<S> {
    pub fn new(source: S) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    pub fn with_ttl(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Current indicator values: cached if fresh, otherwise one fetch
    /// attempt. Failure caches the zero defaults until the next expiry,
    /// so there is no retry storm and no propagated error.
    pub fn get(&self) -> HashMap<String, f64> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() <= self.ttl {
                return cached.values.clone();
            }
        }

        let values = match self.source.fetch() {
            Ok(values) => values,
            Err(err) => {
                log::warn!("indicator fetch failed, using zero defaults: {err:#}");
                zero_defaults()
            }
        };
        *slot = Some(CacheSlot {
            values: values.clone(),
            fetched_at: Instant::now(),
        });
        values
    }
}

/// Source that never reaches out; the cache resolves it to zero defaults.
/// Useful when running fully offline.
pub struct OfflineSource;

impl IndicatorSource for OfflineSource {
    fn fetch(&self) -> crate::Result<HashMap<String, f64>> {
        Ok(zero_defaults())
    }
}
