//! Period-over-period status counts.
//!
//! # Invariants
//! - Counts exclude soft-deleted packages.
//! - Ranges are `[from, to)` on `created_at`.

use crate::model::package::PackageStatus;
use crate::repo::package_repo::PackageFilter;
use crate::repo::store::WorkflowStore;
use crate::service::error::{WorkflowError, WorkflowResult};
use log::info;
use serde::Serialize;

/// Direction of a period-over-period change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl Trend {
    pub fn from_change(change_percent: i64) -> Self {
        match change_percent.signum() {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::Neutral,
        }
    }
}

/// Rounded percentage change from `previous` to `current`.
///
/// Halves round toward positive infinity. A zero baseline yields `100` when
/// anything was counted and `0` otherwise.
pub fn percentage_change(current: u64, previous: u64) -> i64 {
    if previous == 0 {
        return if current > 0 { 100 } else { 0 };
    }
    let ratio = (current as f64 - previous as f64) / previous as f64 * 100.0;
    (ratio + 0.5).floor() as i64
}

/// Half-open created-at window in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: i64,
    pub to: i64,
}

impl DateRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBucketStat {
    /// `None` for the all-status total.
    pub status: Option<PackageStatus>,
    pub current: u64,
    pub previous: u64,
    pub change_percent: i64,
    pub trend: Trend,
}

impl StatusBucketStat {
    fn new(status: Option<PackageStatus>, current: u64, previous: u64) -> Self {
        let change_percent = percentage_change(current, previous);
        Self {
            status,
            current,
            previous,
            change_percent,
            trend: Trend::from_change(change_percent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStats {
    pub current_range: DateRange,
    pub previous_range: DateRange,
    pub buckets: Vec<StatusBucketStat>,
    pub all: StatusBucketStat,
}

impl StatusStats {
    pub fn bucket(&self, status: PackageStatus) -> Option<&StatusBucketStat> {
        self.buckets
            .iter()
            .find(|bucket| bucket.status == Some(status))
    }
}

pub struct StatsAggregator<S: WorkflowStore> {
    store: S,
}

impl<S: WorkflowStore> StatsAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Counts packages per requested status for both ranges. An empty
    /// `statuses` slice reports every status.
    pub fn status_stats(
        &self,
        filter: &PackageFilter,
        current: DateRange,
        previous: DateRange,
        statuses: &[PackageStatus],
    ) -> WorkflowResult<StatusStats> {
        for range in [current, previous] {
            if range.from > range.to {
                return Err(WorkflowError::Validation(format!(
                    "date range start {} is after its end {}",
                    range.from, range.to
                )));
            }
        }

        let current_counts = self
            .store
            .count_by_status(&filter.with_created_range(current.from, current.to))?;
        let previous_counts = self
            .store
            .count_by_status(&filter.with_created_range(previous.from, previous.to))?;

        let requested: &[PackageStatus] = if statuses.is_empty() {
            &PackageStatus::ALL
        } else {
            statuses
        };
        let buckets: Vec<StatusBucketStat> = requested
            .iter()
            .map(|status| {
                StatusBucketStat::new(
                    Some(*status),
                    current_counts.get(status).copied().unwrap_or(0),
                    previous_counts.get(status).copied().unwrap_or(0),
                )
            })
            .collect();
        let all = StatusBucketStat::new(
            None,
            current_counts.values().sum(),
            previous_counts.values().sum(),
        );

        info!(
            "event=status_stats module=service status=ok buckets={} current_total={} previous_total={}",
            buckets.len(),
            all.current,
            all.previous
        );

        Ok(StatusStats {
            current_range: current,
            previous_range: previous,
            buckets,
            all,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{percentage_change, Trend};

    #[test]
    fn percentage_change_handles_zero_baseline() {
        assert_eq!(percentage_change(10, 0), 100);
        assert_eq!(percentage_change(0, 0), 0);
    }

    #[test]
    fn percentage_change_rounds_half_up() {
        assert_eq!(percentage_change(5, 10), -50);
        assert_eq!(percentage_change(15, 10), 50);
        // 1/8 = 12.5% rounds up, -12.5% rounds toward zero.
        assert_eq!(percentage_change(9, 8), 13);
        assert_eq!(percentage_change(7, 8), -12);
        assert_eq!(percentage_change(1, 3), -67);
    }

    #[test]
    fn trend_follows_sign() {
        assert_eq!(Trend::from_change(3), Trend::Up);
        assert_eq!(Trend::from_change(-1), Trend::Down);
        assert_eq!(Trend::from_change(0), Trend::Neutral);
    }
}
