use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A calendar month, stored as the first day of that month.
///
/// Ordering follows the calendar. Displays as `YYYY-MM`; serializes as the
/// underlying date (`YYYY-MM-01`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortMonth(NaiveDate);

impl CohortMonth {
    /// Month containing `date`.
    pub fn of_date(date: NaiveDate) -> Self {
        Self(date - Duration::days(i64::from(date.day0())))
    }

    /// Month containing `ts`.
    pub fn of(ts: NaiveDateTime) -> Self {
        Self::of_date(ts.date())
    }

    /// Build from a year and a 1-based month. `None` when out of range.
    pub fn from_ym(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Absolute month index: `year * 12 + (month - 1)`.
    pub fn index(&self) -> i64 {
        i64::from(self.year()) * 12 + i64::from(self.month0())
    }

    /// Whole calendar months from `self` to `later`. Negative when `later`
    /// precedes `self`. Day of month never matters.
    pub fn months_until(&self, later: CohortMonth) -> i64 {
        later.index() - self.index()
    }

    fn month0(&self) -> u32 {
        self.0.month0()
    }
}

impl std::fmt::Display for CohortMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn normalizes_to_first_day() {
        let m = CohortMonth::of(ts(2011, 3, 17));
        assert_eq!(m.first_day(), NaiveDate::from_ymd_opt(2011, 3, 1).unwrap());
        assert_eq!(m, CohortMonth::from_ym(2011, 3).unwrap());
    }

    #[test]
    fn last_day_of_month_stays_in_month() {
        let m = CohortMonth::of(ts(2012, 2, 29));
        assert_eq!((m.year(), m.month()), (2012, 2));
    }

    #[test]
    fn months_until_ignores_day_of_month() {
        let jan31 = CohortMonth::of(ts(2011, 1, 31));
        let feb1 = CohortMonth::of(ts(2011, 2, 1));
        assert_eq!(jan31.months_until(feb1), 1);

        let jan1 = CohortMonth::of(ts(2011, 1, 1));
        assert_eq!(jan1.months_until(jan31), 0);
    }

    #[test]
    fn months_until_crosses_year_boundary() {
        let dec = CohortMonth::from_ym(2010, 12).unwrap();
        let jan = CohortMonth::from_ym(2011, 1).unwrap();
        let next_dec = CohortMonth::from_ym(2011, 12).unwrap();
        assert_eq!(dec.months_until(jan), 1);
        assert_eq!(dec.months_until(next_dec), 12);
        assert_eq!(jan.months_until(dec), -1);
    }

    #[test]
    fn ordering_and_display() {
        let a = CohortMonth::from_ym(2010, 12).unwrap();
        let b = CohortMonth::from_ym(2011, 1).unwrap();
        assert!(a < b);
        assert_eq!(a.to_string(), "2010-12");
        assert_eq!(serde_json::to_string(&b).unwrap(), "\"2011-01-01\"");
    }

    #[test]
    fn from_ym_rejects_bad_month() {
        assert!(CohortMonth::from_ym(2011, 13).is_none());
        assert!(CohortMonth::from_ym(2011, 0).is_none());
    }
}
