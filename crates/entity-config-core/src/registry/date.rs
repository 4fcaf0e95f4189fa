//! `date_comparation`: compare a date value against a reference date

use chrono::{Duration, NaiveDate, NaiveTime, Weekday};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

use super::{reject_unexpected, require_param, ComparisonOperator, ParamSpec, RuleContext, RuleMetadata, RuleParams};
use crate::error::RuleExecutionError;

pub const NAME: &str = "date_comparation";

const PARAMS: [&str; 2] = ["reference_date", "operator"];

/// Reference values resolved to [`RuleContext::today`]
const RELATIVE_REFERENCES: [&str; 2] = ["now", "today"];

/// Lengths of the date part, longest first: `YYYY-MM-DD` / `YYYY-Www-D`,
/// `YYYYMMDD` / `YYYY-Www` / `YYYYWwwD`, `YYYYWww`
const DATE_LENGTHS: [usize; 3] = [10, 8, 7];

pub fn metadata() -> RuleMetadata {
    RuleMetadata::new("Fecha relativa")
        .with_param(
            ParamSpec::new("operator", "select", "Operador").with_options(ComparisonOperator::NAMES),
        )
        .with_param(
            ParamSpec::new("reference_date", "select", "Fecha referencia")
                .with_options(["now", "today", "custom"]),
        )
        .applicable_to(["date", "datetime"])
}

/// Calendar date of an ISO-8601 date or date-time string.
///
/// Accepts calendar dates (`2024-01-31`, `20240131`) and week dates
/// (`2024-W05-3`, `2024W053`, `2024-W05`), optionally followed by any single
/// separator character and a time: `HH`, `HH:MM`, `HH:MM:SS` or their basic
/// forms, with a `.` or `,` fraction and a `Z`, `+HH`, `+HHMM` or `+HH:MM`
/// offset. The time part and any UTC offset are discarded without conversion.
pub fn parse_iso_date(input: &str) -> Option<NaiveDate> {
    DATE_LENGTHS.iter().find_map(|&len| {
        let date = parse_date_part(input.get(..len)?)?;
        let rest = input.get(len..)?;
        if rest.is_empty() {
            return Some(date);
        }

        let mut chars = rest.chars();
        chars.next()?;
        is_iso_time(chars.as_str()).then_some(date)
    })
}

fn parse_date_part(input: &str) -> Option<NaiveDate> {
    match input.as_bytes() {
        [_, _, _, _, b'-', _, _, b'-', _, _] => NaiveDate::from_ymd_opt(
            digits(input.get(0..4)?)?,
            digits(input.get(5..7)?)?,
            digits(input.get(8..10)?)?,
        ),
        [_, _, _, _, _, _, _, _] if is_digits(input) => NaiveDate::from_ymd_opt(
            digits(input.get(0..4)?)?,
            digits(input.get(4..6)?)?,
            digits(input.get(6..8)?)?,
        ),
        _ => parse_week_date(input),
    }
}

/// `YYYY-Www[-D]` or `YYYYWww[D]`; the weekday defaults to Monday
fn parse_week_date(input: &str) -> Option<NaiveDate> {
    let year = digits(input.get(0..4)?)?;
    let rest = input.get(4..)?;

    let (week, weekday) = match rest.strip_prefix("-W") {
        Some(extended) => match extended.len() {
            2 => (extended, None),
            4 => (extended.get(0..2)?, Some(extended.get(2..)?.strip_prefix('-')?)),
            _ => return None,
        },
        None => {
            let basic = rest.strip_prefix('W')?;
            match basic.len() {
                2 => (basic, None),
                3 => (basic.get(0..2)?, Some(basic.get(2..)?)),
                _ => return None,
            }
        }
    };

    let weekday: u32 = match weekday {
        Some(day) => digits(day)?,
        None => 1,
    };
    if !(1..=7).contains(&weekday) {
        return None;
    }
    let monday = NaiveDate::from_isoywd_opt(year, digits(week)?, Weekday::Mon)?;
    monday.checked_add_signed(Duration::days(i64::from(weekday - 1)))
}

/// Time of day with an optional UTC offset
fn is_iso_time(input: &str) -> bool {
    let (time, offset) = match input.find(|c| matches!(c, '+' | '-' | 'Z')) {
        Some(index) => input.split_at(index),
        None => (input, ""),
    };
    if parse_time(time).is_none() {
        return false;
    }
    match offset {
        "" | "Z" => true,
        _ => offset.get(1..).and_then(parse_time).is_some(),
    }
}

/// `HH[:MM[:SS[.f]]]` or `HH[MM[SS[.f]]]`, with `.` or `,` before the fraction
fn parse_time(input: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match input.find(|c| matches!(c, '.' | ',')) {
        Some(index) => (input.get(..index)?, Some(input.get(index + 1..)?)),
        None => (input, None),
    };

    let parts: Vec<&str> = if clock.contains(':') {
        clock.split(':').collect()
    } else if clock.len() % 2 == 0 {
        (0..clock.len()).step_by(2).filter_map(|i| clock.get(i..i + 2)).collect()
    } else {
        return None;
    };
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.len() != 2) {
        return None;
    }
    if fraction.is_some() && parts.len() != 3 {
        return None;
    }

    let hour = digits(parts[0])?;
    let minute = parts.get(1).map_or(Some(0), |m| digits(m))?;
    let second = parts.get(2).map_or(Some(0), |s| digits(s))?;
    let nanos = match fraction {
        Some(fraction) => {
            if !is_digits(fraction) {
                return None;
            }
            let nanos = fraction.get(..fraction.len().min(9))?;
            digits::<u32>(nanos)? * 10u32.pow(9 - nanos.len() as u32)
        }
        None => 0,
    };
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

fn is_digits(input: &str) -> bool {
    !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a non-empty run of ASCII digits
fn digits<T: FromStr>(input: &str) -> Option<T> {
    if !is_digits(input) {
        return None;
    }
    input.parse().ok()
}

/// `value <operator> reference_date`, compared as calendar dates
///
/// Empty, non-string and unparseable values yield `false`. So does an
/// unparseable custom reference date, which is also logged since it points at
/// a broken configuration rather than bad input.
pub fn date_comparation(
    value: &Value,
    params: &RuleParams,
    context: &RuleContext,
) -> Result<bool, RuleExecutionError> {
    reject_unexpected(params, &PARAMS)?;
    let reference = require_param(params, "reference_date")?;
    let operator = require_param(params, "operator")?;

    let Some(value) = value.as_str().filter(|s| !s.is_empty()).and_then(parse_iso_date) else {
        return Ok(false);
    };

    let reference = reference
        .as_str()
        .ok_or_else(|| RuleExecutionError::invalid_param("reference_date", "expected a string"))?;
    let reference = if RELATIVE_REFERENCES.contains(&reference) {
        context.today
    } else {
        match parse_iso_date(reference) {
            Some(date) => date,
            None => {
                warn!(rule = NAME, reference_date = %reference, "Unparseable reference date in rule parameters");
                return Ok(false);
            }
        }
    };

    Ok(ComparisonOperator::from_param(operator)
        .map(|op| op.compare(&value, &reference))
        .unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RuleContext {
        RuleContext::at(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
    }

    fn check(value: Value, reference: Value, operator: &str) -> Result<bool, RuleExecutionError> {
        let mut params = RuleParams::new();
        params.insert("reference_date".to_string(), reference);
        params.insert("operator".to_string(), json!(operator));
        date_comparation(&value, &params, &ctx())
    }

    #[test]
    fn test_parse_iso_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31);
        assert_eq!(parse_iso_date("2024-01-31"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30.123"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20"), expected);
        assert_eq!(parse_iso_date("2024-01-31 10:20:30"), expected);
        assert_eq!(parse_iso_date("2024-01-31T23:30:00+05:00"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30Z"), expected);
        assert_eq!(parse_iso_date("20240131"), expected);

        assert_eq!(parse_iso_date("31/01/2024"), None);
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("yesterday"), None);
    }

    #[test]
    fn test_parse_iso_date_reduced_and_offset_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31);
        assert_eq!(parse_iso_date("2024-01-31T10"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30+0500"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30+05"), expected);
        assert_eq!(parse_iso_date("2024-01-31 10:20:30-03:00"), expected);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30,5"), expected);
        assert_eq!(parse_iso_date("2024-01-31T102030.123456789123"), expected);
        assert_eq!(parse_iso_date("20240131T1020"), expected);
        assert_eq!(parse_iso_date("2024-W05-3"), expected);
        assert_eq!(parse_iso_date("2024W053"), expected);
        assert_eq!(parse_iso_date("2024-W05"), NaiveDate::from_ymd_opt(2024, 1, 29));
        assert_eq!(parse_iso_date("2024W05T10:00"), NaiveDate::from_ymd_opt(2024, 1, 29));

        assert_eq!(parse_iso_date("2024-01-31T"), None);
        assert_eq!(parse_iso_date("2024-01-31T25"), None);
        assert_eq!(parse_iso_date("2024-01-31T10:20:30+"), None);
        assert_eq!(parse_iso_date("2024-01-31T10:2"), None);
        assert_eq!(parse_iso_date("2024-01-31T10:20,5"), None);
        assert_eq!(parse_iso_date("2024-W05-8"), None);
        assert_eq!(parse_iso_date("2024-W60"), None);
        assert_eq!(parse_iso_date("2024-é1-31"), None);
    }

    #[test]
    fn test_offset_date_compares_as_calendar_date() {
        assert_eq!(check(json!("2024-06-20T10:20:30+0500"), json!("today"), "gt"), Ok(true));
        assert_eq!(check(json!("2024-06-15T23:00+05"), json!("today"), "eq"), Ok(true));
    }

    #[test]
    fn test_relative_reference() {
        assert_eq!(check(json!("2024-07-01"), json!("today"), "gt"), Ok(true));
        assert_eq!(check(json!("2024-06-15"), json!("now"), "gt"), Ok(false));
        assert_eq!(check(json!("2024-06-15T08:00:00"), json!("now"), "eq"), Ok(true));
        assert_eq!(check(json!("2024-01-01"), json!("today"), "lt"), Ok(true));
    }

    #[test]
    fn test_custom_reference() {
        assert_eq!(check(json!("2024-12-31"), json!("2024-12-31"), "lte"), Ok(true));
        assert_eq!(check(json!("2025-01-01"), json!("2024-12-31T12:00:00"), "gt"), Ok(true));
        assert_eq!(check(json!("2025-01-01"), json!("2024-12-31"), "neq"), Ok(true));
    }

    #[test]
    fn test_unusable_value_is_false() {
        assert_eq!(check(json!(""), json!("today"), "gt"), Ok(false));
        assert_eq!(check(json!("not a date"), json!("today"), "gt"), Ok(false));
        assert_eq!(check(json!(20240101), json!("today"), "gt"), Ok(false));
        assert_eq!(check(json!(null), json!("today"), "gt"), Ok(false));
    }

    #[test]
    fn test_unparseable_reference_is_false() {
        assert_eq!(check(json!("2024-01-01"), json!("someday"), "neq"), Ok(false));
    }

    #[test]
    fn test_unknown_operator_is_false() {
        assert_eq!(check(json!("2024-01-01"), json!("today"), "before"), Ok(false));
    }

    #[test]
    fn test_non_string_reference_is_error() {
        assert!(matches!(
            check(json!("2024-01-01"), json!(20240101), "lt"),
            Err(RuleExecutionError::InvalidParam { ref param, .. }) if param == "reference_date"
        ));
    }

    #[test]
    fn test_missing_params() {
        let mut params = RuleParams::new();
        params.insert("operator".to_string(), json!("gt"));
        assert_eq!(
            date_comparation(&json!("2024-01-01"), &params, &ctx()),
            Err(RuleExecutionError::MissingParam("reference_date".to_string()))
        );
    }
}
