//! Best-effort conversion of attribute values.
//!
//! Conversions never lose information silently:
//!
//! | target | accepted inputs |
//! |--------|-----------------|
//! | `I64`  | integers in range, floats with no fractional part inside the `i64` range, numeric strings, bools (1/0) |
//! | `U64`  | as `I64`, negatives rejected |
//! | `F64`  | any number; integers above 2^53 in magnitude are rejected; numeric strings; bools (1.0/0.0) |
//! | `Bool` | bools, the numbers 0 and 1, `true`/`false`/`1`/`0` strings (trimmed, case-insensitive) |
//! | `String` | strings, numbers and bools via their display form |
//! | `Map`, `Sequence` | only a value of that kind |

use crate::error::{BoError, BoResult};
use serde_json::{Map, Number, Value};

/// Largest integer magnitude an `f64` represents exactly.
const F64_EXACT_INT: u64 = 1 << 53;

/// The type a typed read converts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    String,
    /// Map keyed by string.
    Map,
    /// Sequence.
    Sequence,
}

impl TargetType {
    /// Human-readable name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Map => "map",
            Self::Sequence => "sequence",
        }
    }
}

/// Returns the kind name of a value, for diagnostics.
#[must_use]
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

/// Converts `value` to `target`.
///
/// # Errors
///
/// Returns [`BoError::Coercion`] when the conversion is not allowed or would
/// lose information.
pub fn coerce(value: &Value, target: TargetType) -> BoResult<Value> {
    match target {
        TargetType::Bool => to_bool(value).map(Value::Bool),
        TargetType::I64 => to_i64(value).map(Value::from),
        TargetType::U64 => to_u64(value).map(Value::from),
        TargetType::F64 => {
            let f = to_f64(value)?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| refuse(value, target, "not a finite number"))
        }
        TargetType::String => to_string(value).map(Value::String),
        TargetType::Map => match value {
            Value::Object(_) => Ok(value.clone()),
            _ => Err(refuse(value, target, "kind mismatch")),
        },
        TargetType::Sequence => match value {
            Value::Array(_) => Ok(value.clone()),
            _ => Err(refuse(value, target, "kind mismatch")),
        },
    }
}

fn refuse(value: &Value, target: TargetType, reason: impl Into<String>) -> BoError {
    BoError::coercion(kind_name(value), target.name(), reason)
}

/// Converts to `bool`.
pub fn to_bool(value: &Value) -> BoResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(0), _) => Ok(false),
            (Some(1), _) => Ok(true),
            (None, Some(f)) if f == 0.0 => Ok(false),
            (None, Some(f)) if f == 1.0 => Ok(true),
            _ => Err(refuse(value, TargetType::Bool, format!("{n} is neither 0 nor 1"))),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(refuse(
                value,
                TargetType::Bool,
                format!("{other:?} is not a boolean"),
            )),
        },
        _ => Err(refuse(value, TargetType::Bool, "kind mismatch")),
    }
}

/// Converts to `i64`.
pub fn to_i64(value: &Value) -> BoResult<i64> {
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => number_to_i64(n).ok_or_else(|| {
            refuse(value, TargetType::I64, format!("{n} is not an integer in range"))
        }),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(i);
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(integral_f64_to_i64)
                .ok_or_else(|| {
                    refuse(value, TargetType::I64, format!("{s:?} is not an integer"))
                })
        }
        _ => Err(refuse(value, TargetType::I64, "kind mismatch")),
    }
}

/// Converts to `u64`.
pub fn to_u64(value: &Value) -> BoResult<u64> {
    match value {
        Value::Number(n) if n.is_u64() => {
            n.as_u64()
                .ok_or_else(|| refuse(value, TargetType::U64, "unrepresentable number"))
        }
        Value::String(s) => match s.trim().parse::<u64>() {
            Ok(u) => Ok(u),
            Err(_) => signed_to_u64(value),
        },
        _ => signed_to_u64(value),
    }
}

fn signed_to_u64(value: &Value) -> BoResult<u64> {
    let signed = to_i64(value)
        .map_err(|_| refuse(value, TargetType::U64, "not an unsigned integer in range"))?;
    u64::try_from(signed).map_err(|_| refuse(value, TargetType::U64, format!("{signed} is negative")))
}

/// Converts to `f64`.
pub fn to_f64(value: &Value) -> BoResult<f64> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return exact_int_to_f64(u, false)
                    .ok_or_else(|| refuse(value, TargetType::F64, format!("{n} exceeds 2^53")));
            }
            if let Some(i) = n.as_i64() {
                return exact_int_to_f64(i.unsigned_abs(), i < 0)
                    .ok_or_else(|| refuse(value, TargetType::F64, format!("{n} exceeds 2^53")));
            }
            n.as_f64()
                .ok_or_else(|| refuse(value, TargetType::F64, "unrepresentable number"))
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| refuse(value, TargetType::F64, format!("{s:?} is not a number"))),
        _ => Err(refuse(value, TargetType::F64, "kind mismatch")),
    }
}

/// Converts to `String`.
pub fn to_string(value: &Value) -> BoResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(refuse(value, TargetType::String, "kind mismatch")),
    }
}

fn number_to_i64(n: &Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        // Above i64::MAX.
        return None;
    }
    n.as_f64().and_then(integral_f64_to_i64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64_to_i64(f: f64) -> Option<i64> {
    // i64::MAX is not representable; 2^63 is the first float out of range.
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

#[allow(clippy::cast_precision_loss)]
fn exact_int_to_f64(magnitude: u64, negative: bool) -> Option<f64> {
    if magnitude > F64_EXACT_INT {
        return None;
    }
    let f = magnitude as f64;
    Some(if negative { -f } else { f })
}

/// Conversion from an attribute value into a concrete Rust type.
///
/// Used by [`crate::GenericBo::get_as`].
pub trait FromAttribute: Sized {
    /// Converts the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`BoError::Coercion`] when the value cannot be converted.
    fn from_attribute(value: &Value) -> BoResult<Self>;
}

impl FromAttribute for Value {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        Ok(value.clone())
    }
}

impl FromAttribute for bool {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        to_bool(value)
    }
}

impl FromAttribute for i64 {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        to_i64(value)
    }
}

impl FromAttribute for i32 {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        let wide = to_i64(value)?;
        i32::try_from(wide)
            .map_err(|_| BoError::coercion(kind_name(value), "i32", format!("{wide} out of range")))
    }
}

impl FromAttribute for u64 {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        to_u64(value)
    }
}

impl FromAttribute for f64 {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        to_f64(value)
    }
}

impl FromAttribute for String {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        to_string(value)
    }
}

impl FromAttribute for Map<String, Value> {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        match value {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(refuse(value, TargetType::Map, "kind mismatch")),
        }
    }
}

impl FromAttribute for Vec<Value> {
    fn from_attribute(value: &Value) -> BoResult<Self> {
        match value {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(refuse(value, TargetType::Sequence, "kind mismatch")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_from_strings_and_floats() {
        assert_eq!(to_i64(&json!("17")).unwrap(), 17);
        assert_eq!(to_i64(&json!(" -3 ")).unwrap(), -3);
        assert_eq!(to_i64(&json!(4.0)).unwrap(), 4);
        assert_eq!(to_i64(&json!("5.0")).unwrap(), 5);
        assert_eq!(to_i64(&json!(true)).unwrap(), 1);
    }

    #[test]
    fn integers_reject_lossy_input() {
        assert!(to_i64(&json!(4.5)).is_err());
        assert!(to_i64(&json!("abc")).is_err());
        assert!(to_i64(&json!(u64::MAX)).is_err());
        assert!(to_i64(&json!(1e19)).is_err());
        assert!(to_i64(&json!([1])).is_err());
    }

    #[test]
    fn unsigned_rejects_negative() {
        assert_eq!(to_u64(&json!(u64::MAX)).unwrap(), u64::MAX);
        assert_eq!(to_u64(&json!("9")).unwrap(), 9);
        assert!(matches!(
            to_u64(&json!(-1)),
            Err(BoError::Coercion { target: "u64", .. })
        ));
    }

    #[test]
    fn floats_reject_inexact_integers() {
        assert_eq!(to_f64(&json!(3)).unwrap(), 3.0);
        assert_eq!(to_f64(&json!(-3)).unwrap(), -3.0);
        assert_eq!(to_f64(&json!("2.5")).unwrap(), 2.5);
        assert_eq!(to_f64(&json!(1u64 << 53)).unwrap(), 9_007_199_254_740_992.0);
        assert!(to_f64(&json!((1u64 << 53) + 1)).is_err());
        assert!(to_f64(&json!("NaN")).is_err());
    }

    #[test]
    fn bools() {
        assert!(to_bool(&json!(1)).unwrap());
        assert!(!to_bool(&json!(0)).unwrap());
        assert!(to_bool(&json!(" TRUE ")).unwrap());
        assert!(!to_bool(&json!("0")).unwrap());
        assert!(to_bool(&json!(2)).is_err());
        assert!(to_bool(&json!("yes")).is_err());
    }

    #[test]
    fn strings() {
        assert_eq!(to_string(&json!(12)).unwrap(), "12");
        assert_eq!(to_string(&json!(false)).unwrap(), "false");
        assert!(to_string(&json!({"a": 1})).is_err());
    }

    #[test]
    fn container_targets_require_matching_kind() {
        assert_eq!(coerce(&json!({"a": 1}), TargetType::Map).unwrap(), json!({"a": 1}));
        assert!(coerce(&json!("x"), TargetType::Sequence).is_err());
    }

    #[test]
    fn narrow_integer_range() {
        assert_eq!(i32::from_attribute(&json!(7)).unwrap(), 7);
        assert!(i32::from_attribute(&json!(i64::from(i32::MAX) + 1)).is_err());
    }
}
