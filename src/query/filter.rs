//! Events query composition
//!
//! Turns the retrieval parameters into a [`FindQuery`]: a condition tree plus
//! pagination. Composition is pure; the current time is passed in.

use super::condition::{Condition, ConditionBuilder, Field};

/// Result cap applied when no positive limit is requested
pub const DEFAULT_LIMIT: u64 = 1000;

const SECONDS_PER_HOUR: i64 = 3600;

/// Retrieval parameters as given by the caller
///
/// Zero or negative numbers mean "not set", an empty type means "any type".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsQuery {
    pub event_type: String,
    pub from: i64,
    pub to: i64,
    /// Trailing window in hours, takes precedence over `from`/`to`
    pub interval: i64,
    pub limit: i64,
    pub offset: i64,
}

impl EventsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn interval_hours(mut self, hours: i64) -> Self {
        self.interval = hours;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// The single time policy in effect
    pub fn time_filter(&self, now: i64) -> TimeFilter {
        // A trailing interval replaces any explicit bounds
        if self.interval > 0 {
            let window = self.interval.saturating_mul(SECONDS_PER_HOUR);
            return TimeFilter::Between(now.saturating_sub(window), now);
        }

        match (self.from > 0, self.to > 0) {
            (true, true) => TimeFilter::Between(self.from, self.to),
            (true, false) => TimeFilter::Since(self.from),
            (false, true) => TimeFilter::Until(self.to),
            (false, false) => TimeFilter::None,
        }
    }

    pub fn effective_limit(&self) -> u64 {
        if self.limit > 0 {
            self.limit as u64
        } else {
            DEFAULT_LIMIT
        }
    }

    pub fn effective_offset(&self) -> u64 {
        self.offset.max(0) as u64
    }

    /// Compose the store query as of `now` (unix seconds)
    pub fn compose(&self, now: i64) -> FindQuery {
        let mut builder = ConditionBuilder::new();

        if !self.event_type.is_empty() {
            builder = builder.and(Condition::eq(Field::EventType, self.event_type.as_str()));
        }
        builder = builder.and(self.time_filter(now).condition());

        FindQuery {
            condition: builder.build(),
            limit: self.effective_limit(),
            offset: self.effective_offset(),
        }
    }
}

/// Time policy of a query, both bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    None,
    Since(i64),
    Until(i64),
    Between(i64, i64),
}

impl TimeFilter {
    pub fn condition(&self) -> Condition {
        match *self {
            TimeFilter::None => Condition::any(),
            TimeFilter::Since(from) => Condition::gte(Field::Timestamp, from),
            TimeFilter::Until(to) => Condition::lte(Field::Timestamp, to),
            TimeFilter::Between(from, to) => Condition::And(vec![
                Condition::gte(Field::Timestamp, from),
                Condition::lte(Field::Timestamp, to),
            ]),
        }
    }
}

/// A single filtered, timestamp-ordered, paginated read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindQuery {
    pub condition: Condition,
    pub limit: u64,
    pub offset: u64,
}

impl FindQuery {
    /// Match everything, default cap
    pub fn all() -> Self {
        Self {
            condition: Condition::any(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_no_filters() {
        let find = EventsQuery::new().compose(NOW);
        assert!(find.condition.is_empty());
        assert_eq!(find.limit, DEFAULT_LIMIT);
        assert_eq!(find.offset, 0);
    }

    #[test]
    fn test_type_only() {
        let find = EventsQuery::new().event_type("login").compose(NOW);
        assert_eq!(
            find.condition,
            Condition::And(vec![Condition::eq(Field::EventType, "login")])
        );
    }

    #[test]
    fn test_one_sided_ranges() {
        assert_eq!(
            EventsQuery::new().range(100, 0).time_filter(NOW),
            TimeFilter::Since(100)
        );
        assert_eq!(
            EventsQuery::new().range(0, 200).time_filter(NOW),
            TimeFilter::Until(200)
        );
    }

    #[test]
    fn test_full_range_inclusive() {
        let find = EventsQuery::new().range(100, 200).compose(NOW);
        assert_eq!(
            find.condition,
            Condition::And(vec![
                Condition::gte(Field::Timestamp, 100),
                Condition::lte(Field::Timestamp, 200),
            ])
        );
    }

    #[test]
    fn test_interval_discards_range() {
        let query = EventsQuery::new().range(100, 200).interval_hours(1);
        assert_eq!(query.time_filter(NOW), TimeFilter::Between(NOW - 3600, NOW));

        let query = EventsQuery::new().range(100, 0).interval_hours(2);
        assert_eq!(query.time_filter(NOW), TimeFilter::Between(NOW - 7200, NOW));
    }

    #[test]
    fn test_huge_interval_saturates() {
        let query = EventsQuery::new().interval_hours(i64::MAX);
        assert_eq!(query.time_filter(NOW), TimeFilter::Between(NOW - i64::MAX, NOW));

        assert_eq!(
            EventsQuery::new().interval_hours(i64::MAX).time_filter(-10),
            TimeFilter::Between(i64::MIN, -10)
        );
    }

    #[test]
    fn test_negative_values_are_unset() {
        let query = EventsQuery::new()
            .range(-5, -1)
            .interval_hours(-3)
            .limit(-10)
            .offset(-2);
        assert_eq!(query.time_filter(NOW), TimeFilter::None);
        assert_eq!(query.effective_limit(), DEFAULT_LIMIT);
        assert_eq!(query.effective_offset(), 0);
    }

    #[test]
    fn test_pagination() {
        let find = EventsQuery::new().limit(5).offset(10).compose(NOW);
        assert_eq!(find.limit, 5);
        assert_eq!(find.offset, 10);
    }

    #[test]
    fn test_type_combined_with_range() {
        let find = EventsQuery::new()
            .event_type("login")
            .range(900, 1100)
            .compose(NOW);
        assert_eq!(
            find.condition,
            Condition::And(vec![
                Condition::eq(Field::EventType, "login"),
                Condition::gte(Field::Timestamp, 900),
                Condition::lte(Field::Timestamp, 1100),
            ])
        );
    }
}
