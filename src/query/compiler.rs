//! Filter compiler
//!
//! Turns a raw filter description into a [`ReadRequest`]: the source to read
//! from, an absolute time range and the predicate tree for everything else.
//!
//! ```text
//! db=telegraf measurement=cpu field=usage where="host = 'a' AND time > now() - 1h"
//!   -> (host = 'a' AND time > now() - 1h) AND _measurement = 'cpu' AND _field = 'usage'
//!   -> range [now - 1h + 1ns, MAX], predicate (host = 'a') AND _measurement = 'cpu' AND _field = 'usage'
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::query::ast::{escape_string, BinaryOp, Expr};
use crate::query::condition::condition_expr;
use crate::query::error::{CompileError, CompileResult};
use crate::query::parser::parse_expr;
use crate::query::predicate::{ComparisonOp, LiteralValue, LogicalOp, Node, Predicate};

/// Reserved tag key carrying the measurement name
pub const MEASUREMENT_TAG_KEY: &str = "_measurement";

/// Reserved tag key carrying the field name
pub const FIELD_TAG_KEY: &str = "_field";

/// Field read when the request names none
pub const DEFAULT_FIELD: &str = "value";

/// Database and retention policy a read targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadSource {
    pub database: String,
    pub retention_policy: String,
}

/// Inclusive time bounds in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRange {
    pub start: i64,
    pub end: i64,
}

/// Fully resolved read against the storage engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub source: ReadSource,
    pub range: TimestampRange,
    pub predicate: Option<Predicate>,
}

/// Compile a filter into a read request, resolving relative times against `now`
pub fn compile(
    db: &str,
    rp: &str,
    measurement: &str,
    field: &str,
    where_clause: &str,
    now: DateTime<Utc>,
) -> CompileResult<ReadRequest> {
    if db.is_empty() {
        return Err(CompileError::MissingDatabase);
    }
    if measurement.is_empty() {
        return Err(CompileError::MissingMeasurement);
    }
    let field = if field.is_empty() { DEFAULT_FIELD } else { field };

    let condition = condition_text(measurement, field, where_clause.trim());
    trace!(condition = %condition, "Compiling filter");

    let expr = parse_expr(&condition)?;
    let (residual, time_range) = condition_expr(&expr, now)?;

    let range = TimestampRange {
        start: time_range.min_time_nano(),
        end: time_range.max_time_nano(),
    };
    if range.start > range.end {
        return Err(CompileError::EmptyTimeRange {
            start: range.start,
            end: range.end,
        });
    }

    let predicate = residual
        .as_ref()
        .map(build_node)
        .transpose()?
        .map(Predicate::new);

    Ok(ReadRequest {
        source: ReadSource {
            database: db.to_string(),
            retention_policy: rp.to_string(),
        },
        range,
        predicate,
    })
}

fn condition_text(measurement: &str, field: &str, where_clause: &str) -> String {
    let system = format!(
        "{} = '{}' AND {} = '{}'",
        MEASUREMENT_TAG_KEY,
        escape_string(measurement),
        FIELD_TAG_KEY,
        escape_string(field)
    );
    if where_clause.is_empty() {
        system
    } else {
        format!("({}) AND {}", where_clause, system)
    }
}

/// Convert a residual condition into a predicate node
pub fn build_node(expr: &Expr) -> CompileResult<Node> {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            let lhs = build_node(lhs)?;
            let rhs = build_node(rhs)?;
            if let Some(cmp) = comparison_op(*op) {
                Ok(Node::comparison(cmp, lhs, rhs))
            } else if let Some(logical) = logical_op(*op) {
                Ok(Node::logical(logical, lhs, rhs))
            } else {
                Err(CompileError::UnsupportedOperator(op.to_string()))
            }
        }
        Expr::Paren(inner) => Ok(Node::paren(build_node(inner)?)),
        Expr::String(s) => Ok(Node::literal(LiteralValue::String(s.clone()))),
        Expr::Number(n) => Ok(Node::literal(LiteralValue::Float(*n))),
        Expr::Integer(i) => Ok(Node::literal(LiteralValue::Integer(*i))),
        Expr::Unsigned(u) => Ok(Node::literal(LiteralValue::Unsigned(*u))),
        Expr::Regex(pattern) => Ok(Node::literal(LiteralValue::Regex(pattern.clone()))),
        Expr::VarRef(name) => Ok(Node::tag_ref(name.clone())),
        other => Err(CompileError::UnsupportedExpression(other.kind().to_string())),
    }
}

fn comparison_op(op: BinaryOp) -> Option<ComparisonOp> {
    match op {
        BinaryOp::Eq => Some(ComparisonOp::Equal),
        BinaryOp::Neq => Some(ComparisonOp::NotEqual),
        BinaryOp::EqRegex => Some(ComparisonOp::RegexMatch),
        BinaryOp::NeqRegex => Some(ComparisonOp::RegexNotMatch),
        BinaryOp::Lt => Some(ComparisonOp::Less),
        BinaryOp::Lte => Some(ComparisonOp::LessEqual),
        BinaryOp::Gt => Some(ComparisonOp::Greater),
        BinaryOp::Gte => Some(ComparisonOp::GreaterEqual),
        _ => None,
    }
}

fn logical_op(op: BinaryOp) -> Option<LogicalOp> {
    match op {
        BinaryOp::And => Some(LogicalOp::And),
        BinaryOp::Or => Some(LogicalOp::Or),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::condition::{MAX_TIME_NANO, MIN_TIME_NANO};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap()
    }

    fn eq(key: &str, value: &str) -> Node {
        Node::comparison(
            ComparisonOp::Equal,
            Node::tag_ref(key),
            Node::literal(LiteralValue::String(value.into())),
        )
    }

    #[test]
    fn test_system_clauses_only() {
        let req = compile("db0", "", "cpu", "usage", "", now()).unwrap();
        let root = req.predicate.unwrap().root;
        assert_eq!(
            root,
            Node::logical(
                LogicalOp::And,
                eq(MEASUREMENT_TAG_KEY, "cpu"),
                eq(FIELD_TAG_KEY, "usage")
            )
        );
        assert_eq!(req.range.start, MIN_TIME_NANO);
        assert_eq!(req.range.end, MAX_TIME_NANO);
        assert_eq!(req.source.database, "db0");
        assert_eq!(req.source.retention_policy, "");
    }

    #[test]
    fn test_three_way_conjunction() {
        let req = compile("db0", "autogen", "cpu", "usage", "host = 'a'", now()).unwrap();
        let root = req.predicate.unwrap().root;
        let expected = Node::logical(
            LogicalOp::And,
            Node::logical(
                LogicalOp::And,
                Node::paren(eq("host", "a")),
                eq(MEASUREMENT_TAG_KEY, "cpu"),
            ),
            eq(FIELD_TAG_KEY, "usage"),
        );
        assert_eq!(root, expected);
        assert_eq!(root.depth(), 5);
    }

    #[test]
    fn test_field_defaults_to_value() {
        let req = compile("db0", "", "cpu", "", "", now()).unwrap();
        assert!(req
            .predicate
            .unwrap()
            .to_string()
            .ends_with("_field = 'value'"));
    }

    #[test]
    fn test_missing_database_before_parsing() {
        let err = compile("", "", "cpu", "", "this is ((( not parseable", now()).unwrap_err();
        assert_eq!(err, CompileError::MissingDatabase);
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_measurement() {
        let err = compile("db0", "", "", "", "", now()).unwrap_err();
        assert_eq!(err, CompileError::MissingMeasurement);
    }

    #[test]
    fn test_parse_failure() {
        let err = compile("db0", "", "cpu", "", "host = ", now()).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn test_deep_filter_rejected() {
        let filter = format!("{}host = 'a'{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || compile("db0", "", "cpu", "", &filter, now()))
            .unwrap()
            .join()
            .unwrap()
            .unwrap_err();
        assert_eq!(err, CompileError::Parse("expression nested too deeply".into()));
    }

    #[test]
    fn test_filter_at_depth_limit_compiles() {
        let filter = vec!["host = 'a'"; 200].join(" AND ");
        let req = compile("db0", "", "cpu", "", &filter, now()).unwrap();
        assert!(req.predicate.is_some());
    }

    #[test]
    fn test_time_terms_extracted() {
        let req = compile(
            "db0",
            "",
            "cpu",
            "usage",
            "time >= now() - 1h AND host =~ /web-\\d+/",
            now(),
        )
        .unwrap();
        let now_ns = now().timestamp_nanos_opt().unwrap();
        assert_eq!(req.range.start, now_ns - 3_600_000_000_000);
        assert_eq!(req.range.end, MAX_TIME_NANO);
        let text = req.predicate.unwrap().to_string();
        assert!(!text.contains("time"));
        assert!(text.starts_with("(host =~ /web-\\d+/)"));
    }

    #[test]
    fn test_empty_range_rejected() {
        let err = compile("db0", "", "cpu", "", "time > 100 AND time < 50", now()).unwrap_err();
        assert_eq!(err, CompileError::EmptyTimeRange { start: 101, end: 49 });
    }

    #[test]
    fn test_quotes_in_measurement_stay_literal() {
        let req = compile("db0", "", "it's", "f", "", now()).unwrap();
        let root = req.predicate.unwrap().root;
        assert_eq!(
            root,
            Node::logical(LogicalOp::And, eq(MEASUREMENT_TAG_KEY, "it's"), eq(FIELD_TAG_KEY, "f"))
        );
    }

    #[test]
    fn test_unsupported_operator() {
        let err = compile("db0", "", "cpu", "", "a + b = 'x'", now()).unwrap_err();
        assert_eq!(err, CompileError::UnsupportedOperator("+".into()));
    }

    #[test]
    fn test_unsupported_expression() {
        let err = build_node(&Expr::Duration(5)).unwrap_err();
        assert_eq!(
            err,
            CompileError::UnsupportedExpression("duration literal".into())
        );
    }

    #[test]
    fn test_literal_kinds() {
        assert_eq!(
            build_node(&Expr::Unsigned(u64::MAX)).unwrap(),
            Node::literal(LiteralValue::Unsigned(u64::MAX))
        );
        assert_eq!(
            build_node(&Expr::Number(1.5)).unwrap(),
            Node::literal(LiteralValue::Float(1.5))
        );
        assert_eq!(
            build_node(&Expr::Integer(-3)).unwrap(),
            Node::literal(LiteralValue::Integer(-3))
        );
    }

    #[test]
    fn test_order_preserved() {
        let req = compile("db0", "", "cpu", "", "a < b", now()).unwrap();
        let text = req.predicate.unwrap().to_string();
        assert!(text.starts_with("(a < b)"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let w = "(host = 'a' OR host = 'b') AND time > now() - 5m";
        let a = compile("db0", "rp", "cpu", "usage", w, now()).unwrap();
        let b = compile("db0", "rp", "cpu", "usage", w, now()).unwrap();
        assert_eq!(a, b);
    }
}
