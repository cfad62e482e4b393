//! Collapse 15-minute point-of-sale rows into a dense hourly grid.
//!
//! Dense coverage is a prerequisite for positional lag features to be
//! meaningful downstream: a `lag_168` without a gap-free grid would cross
//! variable-length gaps and silently shift to the wrong hour.

use crate::error::{ForecastError, Result};
use crate::types::{HourlyCell, RawBucket};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Sum `sales_net`/`tickets` over the four 15-minute buckets in each hour,
/// then expand to a dense `[minDate, maxDate] × 0..23` grid, zero-filling
/// any (date, hour) that had no source rows. Output is sorted by
/// `(sale_date, hour_of_day)`.
pub fn aggregate(rows: &[RawBucket]) -> Result<Vec<HourlyCell>> {
    if rows.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let mut hourly: BTreeMap<(NaiveDate, u8), (f64, u32)> = BTreeMap::new();
    for row in rows {
        let sale_date = row.ts_bucket.date_naive();
        let hour = row.ts_bucket.hour() as u8;
        let entry = hourly.entry((sale_date, hour)).or_insert((0.0, 0));
        entry.0 += row.sales_net.max(0.0);
        entry.1 += row.tickets;
    }

    let min_date = hourly.keys().map(|(d, _)| *d).min().unwrap();
    let max_date = hourly.keys().map(|(d, _)| *d).max().unwrap();

    Ok(densify(&hourly, min_date, max_date))
}

fn densify(
    hourly: &BTreeMap<(NaiveDate, u8), (f64, u32)>,
    min_date: NaiveDate,
    max_date: NaiveDate,
) -> Vec<HourlyCell> {
    let mut grid = Vec::new();
    let mut date = min_date;
    while date <= max_date {
        let day_of_week = date.weekday().num_days_from_monday() as u8;
        for hour in 0..24u8 {
            let (net_sales, ticket_count) = hourly.get(&(date, hour)).copied().unwrap_or((0.0, 0));
            grid.push(HourlyCell {
                sale_date: date,
                hour_of_day: hour,
                net_sales,
                ticket_count,
                day_of_week,
            });
        }
        date += Duration::days(1);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(ts: chrono::DateTime<Utc>, sales: f64, tickets: u32) -> RawBucket {
        RawBucket {
            ts_bucket: ts,
            sales_net: sales,
            tickets,
        }
    }

    #[test]
    fn sums_four_quarters_into_one_hour() {
        let base = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let rows = vec![
            raw(base, 10.0, 2),
            raw(base + Duration::minutes(15), 20.0, 3),
            raw(base + Duration::minutes(30), 5.0, 1),
            raw(base + Duration::minutes(45), 0.0, 0),
        ];
        let grid = aggregate(&rows).unwrap();
        let cell = grid
            .iter()
            .find(|c| c.hour_of_day == 12 && c.sale_date == base.date_naive())
            .unwrap();
        assert_eq!(cell.net_sales, 35.0);
        assert_eq!(cell.ticket_count, 6);
    }

    #[test]
    fn grid_is_dense_and_sorted() {
        let d0 = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2026, 1, 3, 9, 0, 0).unwrap();
        let rows = vec![raw(d0, 10.0, 1), raw(d2, 5.0, 1)];
        let grid = aggregate(&rows).unwrap();
        // 3 days * 24 hours, including the empty middle day.
        assert_eq!(grid.len(), 72);
        for w in grid.windows(2) {
            let key0 = (w[0].sale_date, w[0].hour_of_day);
            let key1 = (w[1].sale_date, w[1].hour_of_day);
            assert!(key0 < key1);
        }
        let empty_day_noon = grid
            .iter()
            .find(|c| c.sale_date == d0.date_naive() + Duration::days(1) && c.hour_of_day == 9)
            .unwrap();
        assert_eq!(empty_day_noon.net_sales, 0.0);
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        assert!(aggregate(&[]).is_err());
    }
}
