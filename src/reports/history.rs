use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::basis::compute_cost_basis;
use crate::db::Transaction;
use crate::error::BasisError;
use crate::utils::end_of_day;

/// Trailing window ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    Week,    // 1w
    Month,   // 1m
    Quarter, // 3m
}

impl Range {
    /// First day of the window ending on `today`
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        match self {
            Range::Week => today - Duration::days(7),
            Range::Month => today.checked_sub_months(Months::new(1)).unwrap_or(today),
            Range::Quarter => today.checked_sub_months(Months::new(3)).unwrap_or(today),
        }
    }

    /// Default spacing between points for this window
    pub fn default_interval(&self) -> Interval {
        match self {
            Range::Week | Range::Month => Interval::Daily,
            Range::Quarter => Interval::Weekly,
        }
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1w" | "week" => Ok(Range::Week),
            "1m" | "month" => Ok(Range::Month),
            "3m" | "quarter" => Ok(Range::Quarter),
            other => Err(format!("Invalid range '{}'. Use 1w, 1m or 3m", other)),
        }
    }
}

/// Spacing between points of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    /// The `step`-th point after `from`, always offset from `from` itself
    fn nth_step(&self, from: NaiveDate, step: u32) -> Option<NaiveDate> {
        match self {
            Interval::Daily => from.checked_add_signed(Duration::days(i64::from(step))),
            Interval::Weekly => from.checked_add_signed(Duration::weeks(i64::from(step))),
            Interval::Monthly => from.checked_add_months(Months::new(step)),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Interval::Daily),
            "weekly" | "week" | "w" => Ok(Interval::Weekly),
            "monthly" | "month" | "m" => Ok(Interval::Monthly),
            other => Err(format!(
                "Invalid interval '{}'. Use daily, weekly or monthly",
                other
            )),
        }
    }
}

/// Invested amount at the close of one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub invested: Decimal,
}

/// Cost basis at the end of each step from `from` to `to`.
///
/// `to` is always the last point even when it does not fall on a step.
pub fn invested_series(
    transactions: &[Transaction],
    from: NaiveDate,
    to: NaiveDate,
    interval: Interval,
) -> Result<Vec<HistoryPoint>, BasisError> {
    if from > to {
        return Err(BasisError::InvalidRange { from, to });
    }

    let mut dates: Vec<NaiveDate> = (0u32..)
        .map_while(|step| interval.nth_step(from, step))
        .take_while(|date| *date < to)
        .collect();
    dates.push(to);

    dates
        .into_iter()
        .map(|date| {
            compute_cost_basis(transactions, None, Some(end_of_day(date)))
                .map(|invested| HistoryPoint { date, invested })
        })
        .collect()
}
