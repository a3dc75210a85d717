//! Period accounting
//!
//! Maps wall-clock time onto monotonically increasing period identifiers
//! using a versioned configuration history. Each entry says "from
//! `effective_start` on, periods last `duration_secs`, and the first period
//! under this entry is numbered `period_offset`". Changing the duration
//! appends a new entry, so ids and bounds of past periods never move.

use serde::{Deserialize, Serialize};

use crate::{CoreError, PeriodId, Result, Timestamp};

/// One version of the period duration configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodConfig {
    pub effective_start: Timestamp,
    pub duration_secs: u64,
    pub period_offset: PeriodId,
}

/// Half-open time range `[start, end)` covered by a period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBounds {
    pub period: PeriodId,
    pub start: Timestamp,
    pub end: Timestamp,
    pub duration_secs: u64,
}

impl PeriodBounds {
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

fn validate(history: &[PeriodConfig]) -> Result<()> {
    if history.is_empty() {
        return Err(CoreError::ConfigurationMissing);
    }
    if let Some(bad) = history.iter().find(|c| c.duration_secs == 0) {
        return Err(CoreError::InvalidPeriodConfig(format!(
            "zero duration at effective_start {}",
            bad.effective_start
        )));
    }
    Ok(())
}

/// Period containing `timestamp`.
///
/// Uses the latest entry whose `effective_start <= timestamp`.
pub fn period_id(timestamp: Timestamp, history: &[PeriodConfig]) -> Result<PeriodId> {
    validate(history)?;

    let config = history
        .iter()
        .filter(|c| c.effective_start <= timestamp)
        .max_by_key(|c| c.effective_start)
        .ok_or_else(|| CoreError::TimestampBeforeEpoch {
            timestamp,
            earliest: history.iter().map(|c| c.effective_start).min().unwrap_or_default(),
        })?;

    let elapsed = (timestamp - config.effective_start) / config.duration_secs;
    config
        .period_offset
        .checked_add(elapsed)
        .ok_or(CoreError::Overflow)
}

/// Time range of `period`.
///
/// Uses the entry with the greatest `period_offset <= period`.
pub fn period_bounds(period: PeriodId, history: &[PeriodConfig]) -> Result<PeriodBounds> {
    validate(history)?;

    let config = history
        .iter()
        .filter(|c| c.period_offset <= period)
        .max_by_key(|c| c.period_offset)
        .ok_or(CoreError::PeriodBeforeEpoch(period))?;

    let start = (period - config.period_offset)
        .checked_mul(config.duration_secs)
        .and_then(|offset| config.effective_start.checked_add(offset))
        .ok_or(CoreError::Overflow)?;
    let end = start
        .checked_add(config.duration_secs)
        .ok_or(CoreError::Overflow)?;

    Ok(PeriodBounds {
        period,
        start,
        end,
        duration_secs: config.duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: u64 = 604_800;

    fn weekly() -> Vec<PeriodConfig> {
        vec![PeriodConfig { effective_start: 0, duration_secs: WEEK, period_offset: 0 }]
    }

    #[test]
    fn test_period_id_weekly() {
        let history = weekly();
        assert_eq!(period_id(0, &history).unwrap(), 0);
        assert_eq!(period_id(WEEK - 1, &history).unwrap(), 0);
        assert_eq!(period_id(WEEK, &history).unwrap(), 1);
        assert_eq!(period_id(WEEK * 5 / 2, &history).unwrap(), 2);
    }

    #[test]
    fn test_period_bounds_weekly() {
        let bounds = period_bounds(2, &weekly()).unwrap();
        assert_eq!(bounds.start, WEEK * 2);
        assert_eq!(bounds.end, WEEK * 3);
        assert_eq!(bounds.duration_secs, WEEK);
        assert!(bounds.contains(WEEK * 5 / 2));
        assert!(!bounds.contains(WEEK * 3));
    }

    #[test]
    fn test_empty_history_is_configuration_missing() {
        assert_eq!(period_id(100, &[]), Err(CoreError::ConfigurationMissing));
        assert_eq!(period_bounds(1, &[]), Err(CoreError::ConfigurationMissing));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let history = vec![PeriodConfig { effective_start: 0, duration_secs: 0, period_offset: 0 }];
        assert!(matches!(period_id(10, &history), Err(CoreError::InvalidPeriodConfig(_))));
    }

    #[test]
    fn test_timestamp_before_first_entry() {
        let history = vec![PeriodConfig { effective_start: 1_000, duration_secs: 100, period_offset: 0 }];
        assert_eq!(
            period_id(999, &history),
            Err(CoreError::TimestampBeforeEpoch { timestamp: 999, earliest: 1_000 })
        );
    }

    #[test]
    fn test_duration_change_preserves_history() {
        // Weekly for 4 periods, then daily from period 4 on
        let history = vec![
            PeriodConfig { effective_start: 0, duration_secs: WEEK, period_offset: 0 },
            PeriodConfig { effective_start: WEEK * 4, duration_secs: 86_400, period_offset: 4 },
        ];

        // Old periods keep their weekly bounds
        let p3 = period_bounds(3, &history).unwrap();
        assert_eq!((p3.start, p3.end), (WEEK * 3, WEEK * 4));

        // New periods are daily
        let p4 = period_bounds(4, &history).unwrap();
        assert_eq!((p4.start, p4.end), (WEEK * 4, WEEK * 4 + 86_400));
        let p6 = period_bounds(6, &history).unwrap();
        assert_eq!(p6.start, WEEK * 4 + 2 * 86_400);

        assert_eq!(period_id(WEEK * 4 - 1, &history).unwrap(), 3);
        assert_eq!(period_id(WEEK * 4, &history).unwrap(), 4);
        assert_eq!(period_id(WEEK * 4 + 86_400 * 2 + 5, &history).unwrap(), 6);
    }

    #[test]
    fn test_forward_and_inverse_agree() {
        let history = vec![
            PeriodConfig { effective_start: 100, duration_secs: 50, period_offset: 0 },
            PeriodConfig { effective_start: 600, duration_secs: 30, period_offset: 10 },
        ];
        for ts in (100..1_200).step_by(7) {
            let id = period_id(ts, &history).unwrap();
            let bounds = period_bounds(id, &history).unwrap();
            assert!(bounds.contains(ts), "ts {} not in period {} {:?}", ts, id, bounds);
        }
    }

    #[test]
    fn test_unsorted_history_is_accepted() {
        let history = vec![
            PeriodConfig { effective_start: WEEK * 4, duration_secs: 86_400, period_offset: 4 },
            PeriodConfig { effective_start: 0, duration_secs: WEEK, period_offset: 0 },
        ];
        assert_eq!(period_id(WEEK, &history).unwrap(), 1);
        assert_eq!(period_bounds(5, &history).unwrap().start, WEEK * 4 + 86_400);
    }
}
