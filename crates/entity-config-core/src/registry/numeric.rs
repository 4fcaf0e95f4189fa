//! `numeric_comparation`: compare a numeric value against a threshold

use serde_json::Value;
use std::borrow::Cow;

use super::{reject_unexpected, require_param, ComparisonOperator, ParamSpec, RuleContext, RuleMetadata, RuleParams};
use crate::error::RuleExecutionError;

pub const NAME: &str = "numeric_comparation";

const PARAMS: [&str; 2] = ["threshold", "operator"];

pub fn metadata() -> RuleMetadata {
    RuleMetadata::new("Min/Max/Equivalencia")
        .with_param(
            ParamSpec::new("operator", "select", "Operador").with_options(ComparisonOperator::NAMES),
        )
        .with_param(ParamSpec::new("threshold", "number", "Valor límite"))
        .applicable_to(["integer", "float"])
}

/// Coerce a JSON value to a float the way a lenient form would.
///
/// Numbers pass through, booleans become `1.0`/`0.0`, strings are parsed after
/// trimming and dropping digit-group underscores (`1_000`). Anything else has
/// no numeric reading.
pub fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => strip_digit_separators(s.trim())?.parse::<f64>().ok(),
        _ => None,
    }
}

/// Remove `_` separators, each of which must sit between two digits
fn strip_digit_separators(input: &str) -> Option<Cow<'_, str>> {
    if !input.contains('_') {
        return Some(Cow::Borrowed(input));
    }

    let bytes = input.as_bytes();
    let between_digits = |i: usize| {
        i > 0
            && bytes[i - 1].is_ascii_digit()
            && bytes.get(i + 1).map_or(false, u8::is_ascii_digit)
    };
    let separated = bytes.iter().enumerate().all(|(i, &b)| b != b'_' || between_digits(i));
    separated.then(|| Cow::Owned(input.replace('_', "")))
}

/// `value <operator> threshold`
///
/// Values or thresholds without a numeric reading and unknown operators yield
/// `false`. Only a missing or unexpected parameter is an error.
pub fn numeric_comparation(
    value: &Value,
    params: &RuleParams,
    _context: &RuleContext,
) -> Result<bool, RuleExecutionError> {
    reject_unexpected(params, &PARAMS)?;
    let threshold = require_param(params, "threshold")?;
    let operator = require_param(params, "operator")?;

    let (Some(value), Some(threshold)) = (as_float(value), as_float(threshold)) else {
        return Ok(false);
    };

    Ok(ComparisonOperator::from_param(operator)
        .map(|op| op.compare(&value, &threshold))
        .unwrap_or(false))
}
