//! Condition reduction and time-range extraction
//!
//! Splits a parsed `WHERE` expression into an absolute time range and the
//! residual condition the storage engine evaluates against tag sets. Relative
//! terms such as `now() - 1h` are resolved against an explicit reference
//! instant so the result is deterministic.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query::ast::{BinaryOp, Expr};
use crate::query::error::{CompileError, CompileResult};

/// Smallest timestamp the engine can represent; the two values below it are reserved
pub const MIN_TIME_NANO: i64 = i64::MIN + 2;

/// Largest timestamp the engine can represent; `i64::MAX` is reserved
pub const MAX_TIME_NANO: i64 = i64::MAX - 1;

/// Optional lower/upper time bounds in nanoseconds, both inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound, `None` when unbounded
    pub min: Option<i64>,
    /// Inclusive upper bound, `None` when unbounded
    pub max: Option<i64>,
}

impl TimeRange {
    /// Range with both bounds set
    pub fn new(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// True when neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Narrow this range to the overlap with `other`
    pub fn intersect(self, other: TimeRange) -> TimeRange {
        let min = match (self.min, other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        TimeRange { min, max }
    }

    /// Lower bound, defaulting to the engine minimum
    pub fn min_time_nano(&self) -> i64 {
        self.min.unwrap_or(MIN_TIME_NANO)
    }

    /// Upper bound, defaulting to the engine maximum
    pub fn max_time_nano(&self) -> i64 {
        self.max.unwrap_or(MAX_TIME_NANO)
    }
}

/// Split `expr` into its residual condition and the time range it implies
pub fn condition_expr(
    expr: &Expr,
    now: DateTime<Utc>,
) -> CompileResult<(Option<Expr>, TimeRange)> {
    match expr {
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And | BinaryOp::Or => {
                let (lhs_expr, lhs_time) = condition_expr(lhs, now)?;
                let (rhs_expr, rhs_time) = condition_expr(rhs, now)?;

                // OR-ed time bounds are intersected, same as AND.
                let time_range = lhs_time.intersect(rhs_time);

                let residual = match (lhs_expr, rhs_expr) {
                    (None, None) => None,
                    (Some(l), None) => Some(l),
                    (None, Some(r)) => Some(r),
                    (Some(l), Some(r)) => Some(reduce(&Expr::binary(*op, l, r), now)),
                };
                Ok((residual, time_range))
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                if lhs.is_time_ref() {
                    let range = time_range_for(*op, rhs, now)?;
                    return Ok((None, range));
                }
                if rhs.is_time_ref() {
                    let range = time_range_for(op.mirrored(), lhs, now)?;
                    return Ok((None, range));
                }
                Ok((Some(reduce(expr, now)), TimeRange::default()))
            }
            BinaryOp::EqRegex | BinaryOp::NeqRegex => {
                if lhs.is_time_ref() || rhs.is_time_ref() {
                    return Err(CompileError::InvalidTimeCondition(format!(
                        "invalid time comparison operator: {}",
                        op
                    )));
                }
                Ok((Some(reduce(expr, now)), TimeRange::default()))
            }
            _ => Err(CompileError::InvalidCondition(expr.to_string())),
        },
        Expr::Paren(inner) => {
            let (residual, time_range) = condition_expr(inner, now)?;
            match residual {
                None => Ok((None, time_range)),
                Some(inner) => Ok((Some(reduce(&Expr::paren(inner), now)), time_range)),
            }
        }
        Expr::Boolean(_) => Ok((Some(expr.clone()), TimeRange::default())),
        other => Err(CompileError::InvalidCondition(other.to_string())),
    }
}

/// Bounds implied by `time <op> value`
fn time_range_for(op: BinaryOp, value: &Expr, now: DateTime<Utc>) -> CompileResult<TimeRange> {
    let reduced = reduce(value, now);
    let t = time_value(&reduced)?;

    if !(MIN_TIME_NANO..=MAX_TIME_NANO).contains(&t) {
        return Err(CompileError::InvalidTimeCondition(format!(
            "time {} overflows time literal",
            t
        )));
    }

    let mut range = TimeRange::default();
    match op {
        BinaryOp::Gt => range.min = Some(t.saturating_add(1)),
        BinaryOp::Gte => range.min = Some(t),
        BinaryOp::Lt => range.max = Some(t.saturating_sub(1)),
        BinaryOp::Lte => range.max = Some(t),
        BinaryOp::Eq => {
            range.min = Some(t);
            range.max = Some(t);
        }
        other => {
            return Err(CompileError::InvalidTimeCondition(format!(
                "invalid time comparison operator: {}",
                other
            )))
        }
    }
    Ok(range)
}

/// Interpret a reduced literal as nanoseconds since the epoch
fn time_value(expr: &Expr) -> CompileResult<i64> {
    match expr {
        Expr::Time(ns) | Expr::Duration(ns) | Expr::Integer(ns) => Ok(*ns),
        Expr::Number(n) if n.is_finite() => Ok(*n as i64),
        Expr::Number(n) => Err(CompileError::InvalidTimeCondition(format!(
            "time {} is not a finite number",
            n
        ))),
        Expr::String(s) => parse_time_string(s).ok_or_else(|| {
            CompileError::InvalidTimeCondition(format!("unable to parse time '{}'", s))
        }),
        other => Err(CompileError::InvalidTimeCondition(format!(
            "cannot compare time with {}",
            other.kind()
        ))),
    }
}

/// Parse RFC3339 or `YYYY-MM-DD[ HH:MM:SS[.fff]]` (UTC) into nanoseconds
fn parse_time_string(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.timestamp_nanos_opt();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return dt.and_utc().timestamp_nanos_opt();
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_nanos_opt();
    }
    None
}

/// Fold constant sub-expressions and resolve `now()`
pub fn reduce(expr: &Expr, now: DateTime<Utc>) -> Expr {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            let lhs = reduce(lhs, now);
            let rhs = reduce(rhs, now);
            reduce_binary(*op, lhs, rhs)
        }
        Expr::Paren(inner) => {
            let inner = reduce(inner, now);
            if inner.is_literal() {
                inner
            } else {
                Expr::paren(inner)
            }
        }
        Expr::Call { name, args } if name == "now" && args.is_empty() => {
            Expr::Time(now.timestamp_nanos_opt().unwrap_or(MAX_TIME_NANO))
        }
        other => other.clone(),
    }
}

fn reduce_binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    use Expr::*;

    match (op, &lhs, &rhs) {
        (BinaryOp::And, Boolean(true), _) => rhs,
        (BinaryOp::And, _, Boolean(true)) => lhs,
        (BinaryOp::And, Boolean(false), _) | (BinaryOp::And, _, Boolean(false)) => Boolean(false),
        (BinaryOp::Or, Boolean(false), _) => rhs,
        (BinaryOp::Or, _, Boolean(false)) => lhs,
        (BinaryOp::Or, Boolean(true), _) | (BinaryOp::Or, _, Boolean(true)) => Boolean(true),

        (BinaryOp::Add, Time(t), Duration(d)) | (BinaryOp::Add, Duration(d), Time(t)) => {
            checked(t.checked_add(*d), Time).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Sub, Time(t), Duration(d)) => {
            checked(t.checked_sub(*d), Time).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Sub, Time(a), Time(b)) => {
            checked(a.checked_sub(*b), Duration).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Add, Duration(a), Duration(b)) => {
            checked(a.checked_add(*b), Duration).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Sub, Duration(a), Duration(b)) => {
            checked(a.checked_sub(*b), Duration).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Mul, Duration(d), Integer(i)) | (BinaryOp::Mul, Integer(i), Duration(d)) => {
            checked(d.checked_mul(*i), Duration).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Div, Duration(d), Integer(i)) if *i != 0 => Duration(d / i),

        (_, Integer(a), Integer(b)) => reduce_integers(op, *a, *b)
            .unwrap_or_else(|| Expr::binary(op, lhs, rhs)),
        (_, Number(_), Number(_)) | (_, Number(_), Integer(_)) | (_, Integer(_), Number(_)) => {
            let (a, b) = (as_float(&lhs), as_float(&rhs));
            reduce_floats(op, a, b).unwrap_or_else(|| Expr::binary(op, lhs, rhs))
        }
        (BinaryOp::Eq, String(a), String(b)) => Boolean(a == b),
        (BinaryOp::Neq, String(a), String(b)) => Boolean(a != b),
        (BinaryOp::Add, String(a), String(b)) => String(format!("{}{}", a, b)),

        _ => Expr::binary(op, lhs, rhs),
    }
}

fn checked(value: Option<i64>, wrap: fn(i64) -> Expr) -> Option<Expr> {
    value.map(wrap)
}

fn as_float(expr: &Expr) -> f64 {
    match expr {
        Expr::Number(n) => *n,
        Expr::Integer(i) => *i as f64,
        _ => f64::NAN,
    }
}

fn reduce_integers(op: BinaryOp, a: i64, b: i64) -> Option<Expr> {
    let folded = match op {
        BinaryOp::Add => Expr::Integer(a.checked_add(b)?),
        BinaryOp::Sub => Expr::Integer(a.checked_sub(b)?),
        BinaryOp::Mul => Expr::Integer(a.checked_mul(b)?),
        BinaryOp::Div if b != 0 => Expr::Number(a as f64 / b as f64),
        BinaryOp::Mod if b != 0 => Expr::Integer(a % b),
        BinaryOp::BitAnd => Expr::Integer(a & b),
        BinaryOp::BitOr => Expr::Integer(a | b),
        BinaryOp::BitXor => Expr::Integer(a ^ b),
        BinaryOp::Eq => Expr::Boolean(a == b),
        BinaryOp::Neq => Expr::Boolean(a != b),
        BinaryOp::Lt => Expr::Boolean(a < b),
        BinaryOp::Lte => Expr::Boolean(a <= b),
        BinaryOp::Gt => Expr::Boolean(a > b),
        BinaryOp::Gte => Expr::Boolean(a >= b),
        _ => return None,
    };
    Some(folded)
}

fn reduce_floats(op: BinaryOp, a: f64, b: f64) -> Option<Expr> {
    let folded = match op {
        BinaryOp::Add => Expr::Number(a + b),
        BinaryOp::Sub => Expr::Number(a - b),
        BinaryOp::Mul => Expr::Number(a * b),
        BinaryOp::Div if b != 0.0 => Expr::Number(a / b),
        BinaryOp::Mod if b != 0.0 => Expr::Number(a % b),
        BinaryOp::Eq => Expr::Boolean(a == b),
        BinaryOp::Neq => Expr::Boolean(a != b),
        BinaryOp::Lt => Expr::Boolean(a < b),
        BinaryOp::Lte => Expr::Boolean(a <= b),
        BinaryOp::Gt => Expr::Boolean(a > b),
        BinaryOp::Gte => Expr::Boolean(a >= b),
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse_expr;
    use chrono::TimeZone;

    const HOUR: i64 = 3_600_000_000_000;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn now_ns() -> i64 {
        now().timestamp_nanos_opt().unwrap()
    }

    fn split(input: &str) -> CompileResult<(Option<Expr>, TimeRange)> {
        condition_expr(&parse_expr(input).unwrap(), now())
    }

    #[test]
    fn test_no_time_condition() {
        let (residual, range) = split("host = 'a'").unwrap();
        assert_eq!(residual.unwrap().to_string(), "host = 'a'");
        assert!(range.is_unbounded());
        assert_eq!(range.min_time_nano(), MIN_TIME_NANO);
        assert_eq!(range.max_time_nano(), MAX_TIME_NANO);
    }

    #[test]
    fn test_relative_lower_bound() {
        let (residual, range) = split("time > now() - 1h AND host = 'a'").unwrap();
        assert_eq!(residual.unwrap().to_string(), "host = 'a'");
        assert_eq!(range.min, Some(now_ns() - HOUR + 1));
        assert_eq!(range.max, None);
    }

    #[test]
    fn test_absolute_bounds() {
        let (residual, range) = split(
            "time >= '2024-01-01T00:00:00Z' AND time <= '2024-01-02 00:00:00'",
        )
        .unwrap();
        assert!(residual.is_none());
        assert_eq!(range.min, Some(1_704_067_200_000_000_000));
        assert_eq!(range.max, Some(1_704_153_600_000_000_000));
    }

    #[test]
    fn test_strict_upper_bound_and_integer_time() {
        let (_, range) = split("time < 1000").unwrap();
        assert_eq!(range.max, Some(999));
    }

    #[test]
    fn test_time_on_right_side_is_mirrored() {
        let (_, range) = split("1000 < time").unwrap();
        assert_eq!(range.min, Some(1001));
        assert_eq!(range.max, None);
    }

    #[test]
    fn test_time_equality() {
        let (_, range) = split("time = 5000").unwrap();
        assert_eq!(range, TimeRange::new(5000, 5000));
    }

    #[test]
    fn test_intersection_of_bounds() {
        let (_, range) = split("time > 10 AND time > 20 AND time < 100").unwrap();
        assert_eq!(range, TimeRange::new(21, 99));
    }

    #[test]
    fn test_time_not_equal_rejected() {
        let err = split("time != 10").unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimeCondition(_)));
    }

    #[test]
    fn test_time_regex_rejected() {
        let err = split("time =~ /1/").unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimeCondition(_)));
    }

    #[test]
    fn test_unparseable_time_string() {
        let err = split("time > 'yesterday'").unwrap_err();
        assert!(matches!(err, CompileError::InvalidTimeCondition(_)));
    }

    #[test]
    fn test_non_finite_time_rejected() {
        for input in ["time > 1e400", "time < 1e400 - 1e400", "time = -1e400"] {
            let err = split(input).unwrap_err();
            assert!(
                matches!(err, CompileError::InvalidTimeCondition(_)),
                "{input}: {err:?}"
            );
        }
    }

    #[test]
    fn test_float_time_truncates() {
        let (_, range) = split("time >= 1.5e3").unwrap();
        assert_eq!(range.min, Some(1500));
    }

    #[test]
    fn test_paren_keeps_residual_grouping() {
        let (residual, range) = split("(host = 'a' OR host = 'b') AND time > 0").unwrap();
        assert_eq!(residual.unwrap().to_string(), "(host = 'a' OR host = 'b')");
        assert_eq!(range.min, Some(1));
    }

    #[test]
    fn test_paren_with_only_time_disappears() {
        let (residual, range) = split("(time > 0) AND host = 'a'").unwrap();
        assert_eq!(residual.unwrap().to_string(), "host = 'a'");
        assert_eq!(range.min, Some(1));
    }

    #[test]
    fn test_boolean_literal_folds_away() {
        let (residual, _) = split("(true) AND host = 'a'").unwrap();
        assert_eq!(residual.unwrap().to_string(), "host = 'a'");
    }

    #[test]
    fn test_non_condition_rejected() {
        let err = split("'just a string'").unwrap_err();
        assert!(matches!(err, CompileError::InvalidCondition(_)));
    }

    #[test]
    fn test_reduce_arithmetic() {
        let reduced = reduce(&parse_expr("now() - 2h + 30m").unwrap(), now());
        assert_eq!(reduced, Expr::Time(now_ns() - 2 * HOUR + HOUR / 2));

        let reduced = reduce(&parse_expr("1 + 2 * 3").unwrap(), now());
        assert_eq!(reduced, Expr::Integer(7));
    }

    #[test]
    fn test_intersect_keeps_single_bounds() {
        let a = TimeRange {
            min: Some(5),
            max: None,
        };
        let b = TimeRange {
            min: None,
            max: Some(9),
        };
        assert_eq!(a.intersect(b), TimeRange::new(5, 9));
    }
}
