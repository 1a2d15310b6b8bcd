//! Utility functions for formatting and date handling
//!
//! Centralizes currency display and the date/timestamp formats accepted on
//! the command line and in imported files.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;

/// Core formatting function with full control over output.
///
/// Formats a Decimal value with `,` thousands separators and `.` as the
/// decimal separator, rounded to two places.
///
/// # Arguments
/// * `value` - The decimal value to format
/// * `width` - Minimum width for padding (0 for no padding, right-aligned)
/// * `symbol` - Optional currency label placed before the amount
///
/// # Examples
/// ```
/// use stockbook::utils::format_currency_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, Some("KSH")),
///     "KSH 1,234.56"
/// );
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, None),
///     "    1,234.00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: Option<&str>) -> String {
    let is_negative = value < Decimal::ZERO;
    let abs_value = value.abs().round_dp(2);

    let formatted = format!("{:.2}", abs_value);
    let (integer_part, decimal_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), "00"));

    // Add thousands separators (,) to integer part
    let mut with_separators = String::with_capacity(integer_part.len() + integer_part.len() / 3);
    for (i, c) in integer_part.chars().enumerate() {
        if i > 0 && (integer_part.len() - i) % 3 == 0 {
            with_separators.push(',');
        }
        with_separators.push(c);
    }

    let sign = if is_negative { "-" } else { "" };
    let result = match symbol {
        Some(label) => format!("{} {}{}.{}", label, sign, with_separators, decimal_part),
        None => format!("{}{}.{}", sign, with_separators, decimal_part),
    };

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format an amount with a currency label: "KSH 1,234.56"
///
/// # Examples
/// ```
/// use stockbook::utils::format_currency;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_currency(dec!(1234.56), "KSH"), "KSH 1,234.56");
/// assert_eq!(format_currency(dec!(-500), "KSH"), "KSH -500.00");
/// ```
pub fn format_currency(value: Decimal, label: &str) -> String {
    format_currency_with_width(value, 0, Some(label))
}

/// Signed percentage with two decimals: "+12.50%" / "-3.10%"
pub fn format_percent(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded >= Decimal::ZERO {
        format!("+{:.2}%", rounded)
    } else {
        format!("{:.2}%", rounded)
    }
}

/// Parse flexible date formats: YYYY-MM-DD, YYYY-MM, or YYYY.
///
/// Partial dates resolve to the last day of the month or year.
pub fn parse_flexible_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    // YYYY-MM-DD (exact date)
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date);
    }

    // YYYY-MM (last day of month)
    if let Ok(ym) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        let next_month = if ym.month() == 12 {
            NaiveDate::from_ymd_opt(ym.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(ym.year(), ym.month() + 1, 1)
        };
        if let Some(last_day) = next_month.and_then(|nm| nm.pred_opt()) {
            return Ok(last_day);
        }
    }

    // YYYY (December 31)
    if let Ok(year) = s.parse::<i32>() {
        if (1900..=2100).contains(&year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, 12, 31) {
                return Ok(date);
            }
        }
    }

    Err(anyhow!(
        "Invalid date '{}'. Use YYYY-MM-DD, YYYY-MM, or YYYY",
        s
    ))
}

/// Last representable instant of a day, in UTC
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::nanoseconds(1)
}

/// Parse an execution timestamp: RFC 3339, or a bare YYYY-MM-DD (midnight UTC)
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(anyhow!(
        "Invalid timestamp '{}'. Use RFC 3339 (2025-03-01T10:00:00Z) or YYYY-MM-DD",
        s
    ))
}

/// Parse a point-in-time cutoff: RFC 3339 is exact, a date means end of that day
pub fn parse_as_of(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s.trim()) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_flexible_date(s).map(end_of_day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_currency_basic() {
        assert_eq!(format_currency(dec!(1234.56), "KSH"), "KSH 1,234.56");
        assert_eq!(format_currency(dec!(0.99), "KSH"), "KSH 0.99");
        assert_eq!(format_currency(dec!(1000000), "KSH"), "KSH 1,000,000.00");
    }

    #[test]
    fn test_format_currency_small_and_large_values() {
        assert_eq!(format_currency(dec!(0), "KSH"), "KSH 0.00");
        assert_eq!(format_currency(dec!(123), "KSH"), "KSH 123.00");
        assert_eq!(format_currency(dec!(12345), "KSH"), "KSH 12,345.00");
        assert_eq!(format_currency(dec!(123456), "KSH"), "KSH 123,456.00");
        assert_eq!(format_currency(dec!(12345678.90), "USD"), "USD 12,345,678.90");
    }

    #[test]
    fn test_format_currency_negative_and_rounding() {
        assert_eq!(format_currency(dec!(-1234.56), "KSH"), "KSH -1,234.56");
        assert_eq!(format_currency(dec!(33.3333333), "KSH"), "KSH 33.33");
        assert_eq!(format_currency(dec!(2.675), "KSH"), "KSH 2.68");
    }

    #[test]
    fn test_format_with_width() {
        let result = format_currency_with_width(dec!(100), 12, None);
        assert_eq!(result, "      100.00");
    }

    #[test]
    fn test_format_percent_sign() {
        assert_eq!(format_percent(dec!(12.5)), "+12.50%");
        assert_eq!(format_percent(dec!(-3.104)), "-3.10%");
        assert_eq!(format_percent(dec!(0)), "+0.00%");
    }

    #[test]
    fn test_parse_flexible_date() {
        assert_eq!(
            parse_flexible_date("2025-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert_eq!(
            parse_flexible_date("2024-02").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            parse_flexible_date("2025-12").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert_eq!(
            parse_flexible_date("2023").unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
        assert!(parse_flexible_date("15/03/2025").is_err());
    }

    #[test]
    fn test_end_of_day_is_last_instant() {
        let eod = end_of_day(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(eod.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(eod.hour(), 23);
        assert_eq!(eod.minute(), 59);
        assert!(eod < Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(
            parse_timestamp("2025-03-01T10:00:00+03:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 7, 0, 0).unwrap()
        );
        assert_eq!(
            parse_timestamp("2025-03-01").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_parse_as_of_date_means_end_of_day() {
        let as_of = parse_as_of("2025-03-01").unwrap();
        assert!(as_of > Utc.with_ymd_and_hms(2025, 3, 1, 23, 0, 0).unwrap());
        assert_eq!(
            parse_as_of("2025-03-01T12:00:00Z").unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
        );
    }
}
