//! Holiday calendars for the `isHoliday` feature.
//!
//! spec.md §4.2 leaves the holiday set unspecified ("isHoliday = saleDate ∈
//! holidaySet"). The original implementation hardcoded a Spain national
//! holiday calendar for 2024-2027
//! (`prophet-service/hourly_forecaster.py::SPANISH_HOLIDAYS`); we keep that
//! list as the default but make it a parameter of [`crate::features::build`]
//! rather than a global constant, so a location outside Spain can supply its
//! own.

use chrono::NaiveDate;
use std::collections::HashSet;

/// A set of holiday dates to check calendar features against.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    /// Spain's national public holidays, 2024-2027.
    pub fn spain_2024_2027() -> Self {
        const DAYS: &[(i32, u32, u32)] = &[
            (2024, 1, 1),
            (2024, 1, 6),
            (2024, 3, 29),
            (2024, 4, 1),
            (2024, 5, 1),
            (2024, 8, 15),
            (2024, 10, 12),
            (2024, 11, 1),
            (2024, 12, 6),
            (2024, 12, 8),
            (2024, 12, 25),
            (2025, 1, 1),
            (2025, 1, 6),
            (2025, 4, 18),
            (2025, 4, 21),
            (2025, 5, 1),
            (2025, 8, 15),
            (2025, 10, 12),
            (2025, 11, 1),
            (2025, 12, 6),
            (2025, 12, 8),
            (2025, 12, 25),
            (2026, 1, 1),
            (2026, 1, 6),
            (2026, 4, 3),
            (2026, 4, 6),
            (2026, 5, 1),
            (2026, 8, 15),
            (2026, 10, 12),
            (2026, 11, 1),
            (2026, 12, 6),
            (2026, 12, 8),
            (2026, 12, 25),
            (2027, 1, 1),
            (2027, 1, 6),
            (2027, 3, 26),
            (2027, 3, 29),
            (2027, 5, 1),
            (2027, 8, 15),
            (2027, 10, 12),
            (2027, 11, 1),
            (2027, 12, 6),
            (2027, 12, 8),
            (2027, 12, 25),
        ];
        Self::new(
            DAYS.iter()
                .filter_map(|(y, m, d)| NaiveDate::from_ymd_opt(*y, *m, *d)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spain_calendar_contains_christmas() {
        let cal = HolidayCalendar::spain_2024_2027();
        assert!(cal.contains(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
        assert!(!cal.contains(NaiveDate::from_ymd_opt(2025, 12, 26).unwrap()));
    }

    #[test]
    fn empty_calendar_contains_nothing() {
        let cal = HolidayCalendar::default();
        assert!(!cal.contains(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
    }
}
