use chrono::{DateTime, Utc};

use crate::types::{ChartInterval, ChartRange};

/// `(days_since < threshold, range)`, ascending. First match wins.
const RANGE_STEPS: &[(i64, ChartRange)] = &[
    (1, ChartRange::OneDay),
    (5, ChartRange::FiveDays),
    (30, ChartRange::OneMonth),
    (90, ChartRange::ThreeMonths),
    (180, ChartRange::SixMonths),
    (360, ChartRange::OneYear),
    (720, ChartRange::TwoYears),
    (1800, ChartRange::FiveYears),
];
const RANGE_FALLBACK: ChartRange = ChartRange::FiveYears;

const INTERVAL_STEPS: &[(i64, ChartInterval)] = &[
    (1, ChartInterval::FiveMinutes),
    (1800, ChartInterval::OneDay),
];
const INTERVAL_FALLBACK: ChartInterval = ChartInterval::OneDay;

/// Query used for a code that has never been ingested.
pub const COLD_START: (ChartInterval, ChartRange) = (ChartInterval::OneDay, ChartRange::FiveYears);

fn step<T: Copy>(steps: &[(i64, T)], fallback: T, days_since: i64) -> T {
    steps
        .iter()
        .find(|(threshold, _)| days_since < *threshold)
        .map_or(fallback, |(_, value)| *value)
}

/// Whole days elapsed, floored. A fetch stamped in the future counts as zero.
pub fn days_since(last_fetch: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last_fetch).num_days().max(0)
}

pub fn select_range(days_since: i64) -> ChartRange {
    step(RANGE_STEPS, RANGE_FALLBACK, days_since)
}

pub fn select_interval(days_since: i64) -> ChartInterval {
    step(INTERVAL_STEPS, INTERVAL_FALLBACK, days_since)
}

pub fn select_query(days_since: i64) -> (ChartInterval, ChartRange) {
    (select_interval(days_since), select_range(days_since))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn tables_are_ascending() {
        assert!(RANGE_STEPS.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(INTERVAL_STEPS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn boundary_values() {
        assert_eq!(select_query(0), (ChartInterval::FiveMinutes, ChartRange::OneDay));
        assert_eq!(select_range(30), ChartRange::ThreeMonths);
        assert_eq!(select_range(29), ChartRange::OneMonth);
        assert_eq!(select_query(1800), (ChartInterval::OneDay, ChartRange::FiveYears));
        assert_eq!(select_query(10_000), (ChartInterval::OneDay, ChartRange::FiveYears));
    }

    #[test]
    fn every_range_threshold_switches_exactly_at_boundary() {
        let expected = [
            (0, ChartRange::OneDay),
            (1, ChartRange::FiveDays),
            (4, ChartRange::FiveDays),
            (5, ChartRange::OneMonth),
            (89, ChartRange::ThreeMonths),
            (90, ChartRange::SixMonths),
            (179, ChartRange::SixMonths),
            (180, ChartRange::OneYear),
            (359, ChartRange::OneYear),
            (360, ChartRange::TwoYears),
            (719, ChartRange::TwoYears),
            (720, ChartRange::FiveYears),
            (1799, ChartRange::FiveYears),
        ];
        for (days, range) in expected {
            assert_eq!(select_range(days), range, "days_since = {days}");
        }
        assert_eq!(select_interval(1), ChartInterval::OneDay);
        assert_eq!(select_interval(1799), ChartInterval::OneDay);
    }

    #[test]
    fn staler_input_never_narrows_range() {
        let mut prev_range = select_range(0);
        let mut prev_interval = select_interval(0);
        for days in 1..=2500 {
            let range = select_range(days);
            let interval = select_interval(days);
            assert!(range >= prev_range, "range narrowed at {days}");
            assert!(interval >= prev_interval, "interval narrowed at {days}");
            prev_range = range;
            prev_interval = interval;
        }
    }

    #[test]
    fn days_since_floors_and_clamps() {
        let now = Utc::now();
        assert_eq!(days_since(now - Duration::hours(47), now), 1);
        assert_eq!(days_since(now - Duration::days(2), now), 2);
        assert_eq!(days_since(now - Duration::minutes(5), now), 0);
        assert_eq!(days_since(now + Duration::days(3), now), 0);
    }
}
