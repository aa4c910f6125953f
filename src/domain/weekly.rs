//! Weekly aggregation of daily prices.
//!
//! Each daily price is bucketed by its week-ending Friday: a Friday is its own
//! week end, any other day maps to the next Friday after it (so Saturday and
//! Sunday fall into the upcoming week). The latest trading day observed in a
//! bucket supplies that week's close. Missing weeks are not filled.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

use crate::domain::price::DailyPrice;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeeklyPoint {
    pub week_ending: NaiveDate,
    pub closing_price: f64,
}

/// Friday on or after `date`.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let weekday = date.weekday().num_days_from_monday() as i64;
    let days_until_friday = (4 - weekday).rem_euclid(7);
    date + Duration::days(days_until_friday)
}

/// Collapse `prices` within `[from_date, to_date]` into one point per week,
/// oldest first.
pub fn aggregate(prices: &[DailyPrice], from_date: NaiveDate, to_date: NaiveDate) -> Vec<WeeklyPoint> {
    let mut weeks: BTreeMap<NaiveDate, &DailyPrice> = BTreeMap::new();

    for price in prices
        .iter()
        .filter(|p| p.date >= from_date && p.date <= to_date)
    {
        weeks
            .entry(week_ending(price.date))
            .and_modify(|latest| {
                if price.date > latest.date {
                    *latest = price;
                }
            })
            .or_insert(price);
    }

    weeks
        .into_iter()
        .map(|(week_ending, last_day)| WeeklyPoint {
            week_ending,
            closing_price: last_day.adj_close,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn price(date: NaiveDate, close: f64) -> DailyPrice {
        DailyPrice::new("TEST", date, close)
    }

    #[test]
    fn friday_is_its_own_week_end() {
        // 2024-01-05 is a Friday
        assert_eq!(week_ending(d(2024, 1, 5)), d(2024, 1, 5));
    }

    #[test]
    fn weekdays_map_forward_to_friday() {
        assert_eq!(week_ending(d(2024, 1, 1)), d(2024, 1, 5));
        assert_eq!(week_ending(d(2024, 1, 4)), d(2024, 1, 5));
    }

    #[test]
    fn weekend_maps_to_next_friday() {
        assert_eq!(week_ending(d(2024, 1, 6)), d(2024, 1, 12));
        assert_eq!(week_ending(d(2024, 1, 7)), d(2024, 1, 12));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(aggregate(&[], d(2024, 1, 1), d(2024, 12, 31)).is_empty());
    }

    #[test]
    fn latest_day_in_week_wins_regardless_of_input_order() {
        let prices = vec![
            price(d(2024, 1, 4), 14.0),
            price(d(2024, 1, 2), 12.0),
            price(d(2024, 1, 3), 13.0),
        ];
        let weekly = aggregate(&prices, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].week_ending, d(2024, 1, 5));
        assert_eq!(weekly[0].closing_price, 14.0);
    }

    #[test]
    fn saturday_price_starts_next_bucket() {
        let prices = vec![price(d(2024, 1, 5), 10.0), price(d(2024, 1, 6), 11.0)];
        let weekly = aggregate(&prices, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].closing_price, 10.0);
        assert_eq!(weekly[1].week_ending, d(2024, 1, 12));
        assert_eq!(weekly[1].closing_price, 11.0);
    }

    #[test]
    fn filters_to_inclusive_range() {
        let prices = vec![
            price(d(2024, 1, 5), 1.0),
            price(d(2024, 1, 12), 2.0),
            price(d(2024, 1, 19), 3.0),
        ];
        let weekly = aggregate(&prices, d(2024, 1, 12), d(2024, 1, 19));
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].closing_price, 2.0);
        assert_eq!(weekly[1].closing_price, 3.0);
    }

    #[test]
    fn missing_weeks_leave_gaps() {
        let prices = vec![price(d(2024, 1, 5), 1.0), price(d(2024, 1, 26), 2.0)];
        let weekly = aggregate(&prices, d(2024, 1, 1), d(2024, 1, 31));
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[1].week_ending, d(2024, 1, 26));
    }
}
