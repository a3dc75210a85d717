//! Period accountant with a cached configuration history

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use prizecraft_core::{period_bounds, period_id, PeriodBounds, PeriodConfig, PeriodId, Timestamp};

use crate::{PeriodConfigSource, Result};

/// Default time a loaded history stays valid
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

struct CachedHistory {
    history: Arc<Vec<PeriodConfig>>,
    loaded_at: Instant,
}

/// Maps time to periods using the history from a [`PeriodConfigSource`].
///
/// The history is read on every tick but rarely changes, so a loaded copy
/// is reused until the TTL expires.
pub struct PeriodAccountant {
    source: Arc<dyn PeriodConfigSource>,
    ttl: Duration,
    cache: Mutex<Option<CachedHistory>>,
}

impl PeriodAccountant {
    pub fn new(source: Arc<dyn PeriodConfigSource>) -> Self {
        Self::with_ttl(source, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn PeriodConfigSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Configuration history, from cache if fresh
    pub async fn history(&self) -> Result<Arc<Vec<PeriodConfig>>> {
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(cached.history.clone());
                }
            }
        }

        // Lock released: the source may suspend
        let history = Arc::new(self.source.load().await?);
        debug!(entries = history.len(), "Loaded period configuration");

        *self.cache.lock() = Some(CachedHistory {
            history: history.clone(),
            loaded_at: Instant::now(),
        });
        Ok(history)
    }

    /// Period containing `timestamp`
    pub async fn period_id(&self, timestamp: Timestamp) -> Result<PeriodId> {
        let history = self.history().await?;
        Ok(period_id(timestamp, &history)?)
    }

    /// Time range of `period`
    pub async fn period_bounds(&self, period: PeriodId) -> Result<PeriodBounds> {
        let history = self.history().await?;
        Ok(period_bounds(period, &history)?)
    }

    /// Drop the cached history so the next lookup reloads it
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}
