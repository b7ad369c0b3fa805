//! Predicate evaluation against a tag set
//!
//! Comparisons pair a tag reference with a literal (either side) or with a
//! second tag reference. Missing tags read as the empty string. Numeric
//! literals compare numerically when the tag value parses as a number.

use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::query::{ComparisonOp, LiteralValue, LogicalOp, Node, Predicate};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::Tags;

/// A predicate with its regex literals compiled once
#[derive(Debug, Clone)]
pub struct PredicateMatcher {
    root: Node,
    regexes: HashMap<String, Regex>,
}

enum Operand<'a> {
    Tag(&'a str),
    Literal(&'a LiteralValue),
}

impl PredicateMatcher {
    pub fn new(predicate: &Predicate) -> StorageResult<Self> {
        let mut regexes = HashMap::new();
        collect_regexes(&predicate.root, &mut regexes)?;
        Ok(Self {
            root: predicate.root.clone(),
            regexes,
        })
    }

    /// True when `tags` satisfies the predicate
    pub fn matches(&self, tags: &Tags) -> StorageResult<bool> {
        self.eval(&self.root, tags)
    }

    fn eval(&self, node: &Node, tags: &Tags) -> StorageResult<bool> {
        match node {
            Node::Logical { op, lhs, rhs } => match op {
                LogicalOp::And => Ok(self.eval(lhs, tags)? && self.eval(rhs, tags)?),
                LogicalOp::Or => Ok(self.eval(lhs, tags)? || self.eval(rhs, tags)?),
            },
            Node::Paren { expr } => self.eval(expr, tags),
            Node::Comparison { op, lhs, rhs } => {
                let lhs = operand(lhs, tags)?;
                let rhs = operand(rhs, tags)?;
                match (lhs, rhs) {
                    (Operand::Tag(value), Operand::Literal(lit)) => self.compare(*op, value, lit),
                    (Operand::Literal(lit), Operand::Tag(value)) => {
                        self.compare(mirror(*op), value, lit)
                    }
                    (Operand::Tag(a), Operand::Tag(b)) => match op {
                        ComparisonOp::RegexMatch | ComparisonOp::RegexNotMatch => Err(
                            StorageError::Engine("regex comparison requires a regex literal".into()),
                        ),
                        _ => Ok(apply_ordering(*op, a.cmp(b))),
                    },
                    (Operand::Literal(_), Operand::Literal(_)) => Err(StorageError::Engine(
                        format!("comparison between two literals: {}", node),
                    )),
                }
            }
            Node::Literal { .. } | Node::TagRef { .. } => Err(StorageError::Engine(format!(
                "expression is not a condition: {}",
                node
            ))),
        }
    }

    fn compare(&self, op: ComparisonOp, value: &str, lit: &LiteralValue) -> StorageResult<bool> {
        match (op, lit) {
            (ComparisonOp::RegexMatch, LiteralValue::Regex(pattern)) => {
                Ok(self.regex(pattern)?.is_match(value))
            }
            (ComparisonOp::RegexNotMatch, LiteralValue::Regex(pattern)) => {
                Ok(!self.regex(pattern)?.is_match(value))
            }
            (ComparisonOp::RegexMatch | ComparisonOp::RegexNotMatch, _)
            | (_, LiteralValue::Regex(_)) => Err(StorageError::Engine(format!(
                "operator {} cannot be used with {}",
                op.as_str(),
                lit
            ))),
            (_, LiteralValue::String(s)) => Ok(apply_ordering(op, value.cmp(s.as_str()))),
            (_, LiteralValue::Float(n)) => Ok(compare_numeric(op, value, *n)),
            (_, LiteralValue::Integer(n)) => Ok(compare_numeric(op, value, *n as f64)),
            (_, LiteralValue::Unsigned(n)) => Ok(compare_numeric(op, value, *n as f64)),
        }
    }

    fn regex(&self, pattern: &str) -> StorageResult<&Regex> {
        self.regexes
            .get(pattern)
            .ok_or_else(|| StorageError::Engine(format!("regex not compiled: {}", pattern)))
    }
}

fn collect_regexes(node: &Node, out: &mut HashMap<String, Regex>) -> StorageResult<()> {
    match node {
        Node::Literal {
            value: LiteralValue::Regex(pattern),
        } => {
            if !out.contains_key(pattern) {
                let re = Regex::new(pattern).map_err(|e| {
                    StorageError::Engine(format!("invalid regex /{}/: {}", pattern, e))
                })?;
                out.insert(pattern.clone(), re);
            }
            Ok(())
        }
        Node::Literal { .. } | Node::TagRef { .. } => Ok(()),
        Node::Comparison { lhs, rhs, .. } | Node::Logical { lhs, rhs, .. } => {
            collect_regexes(lhs, out)?;
            collect_regexes(rhs, out)
        }
        Node::Paren { expr } => collect_regexes(expr, out),
    }
}

fn operand<'a>(node: &'a Node, tags: &'a Tags) -> StorageResult<Operand<'a>> {
    match node {
        Node::TagRef { key } => Ok(Operand::Tag(tags.get(key).unwrap_or(""))),
        Node::Literal { value } => Ok(Operand::Literal(value)),
        other => Err(StorageError::Engine(format!(
            "unsupported comparison operand: {}",
            other
        ))),
    }
}

fn mirror(op: ComparisonOp) -> ComparisonOp {
    match op {
        ComparisonOp::Less => ComparisonOp::Greater,
        ComparisonOp::LessEqual => ComparisonOp::GreaterEqual,
        ComparisonOp::Greater => ComparisonOp::Less,
        ComparisonOp::GreaterEqual => ComparisonOp::LessEqual,
        other => other,
    }
}

fn compare_numeric(op: ComparisonOp, value: &str, rhs: f64) -> bool {
    match value.trim().parse::<f64>() {
        Ok(lhs) => match lhs.partial_cmp(&rhs) {
            Some(ord) => apply_ordering(op, ord),
            None => op == ComparisonOp::NotEqual,
        },
        // Non-numeric tag values never equal a number
        Err(_) => op == ComparisonOp::NotEqual,
    }
}

fn apply_ordering(op: ComparisonOp, ord: Ordering) -> bool {
    match op {
        ComparisonOp::Equal => ord == Ordering::Equal,
        ComparisonOp::NotEqual => ord != Ordering::Equal,
        ComparisonOp::Less => ord == Ordering::Less,
        ComparisonOp::LessEqual => ord != Ordering::Greater,
        ComparisonOp::Greater => ord == Ordering::Greater,
        ComparisonOp::GreaterEqual => ord != Ordering::Less,
        ComparisonOp::RegexMatch | ComparisonOp::RegexNotMatch => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::compile;
    use chrono::Utc;

    fn matcher(where_clause: &str) -> PredicateMatcher {
        let req = compile("db", "", "cpu", "usage", where_clause, Utc::now()).unwrap();
        PredicateMatcher::new(&req.predicate.unwrap()).unwrap()
    }

    fn tags(host: &str) -> Tags {
        Tags::sorted([
            ("_field", "usage"),
            ("_measurement", "cpu"),
            ("host", host),
            ("cores", "8"),
        ])
    }

    #[test]
    fn test_equality_and_system_tags() {
        let m = matcher("host = 'a'");
        assert!(m.matches(&tags("a")).unwrap());
        assert!(!m.matches(&tags("b")).unwrap());

        let other_measurement = Tags::sorted([("_field", "usage"), ("_measurement", "mem"), ("host", "a")]);
        assert!(!m.matches(&other_measurement).unwrap());
    }

    #[test]
    fn test_regex_and_or() {
        let m = matcher("host =~ /^web-\\d+$/ OR host = 'db'");
        assert!(m.matches(&tags("web-12")).unwrap());
        assert!(m.matches(&tags("db")).unwrap());
        assert!(!m.matches(&tags("web-x")).unwrap());

        let m = matcher("host !~ /web/");
        assert!(m.matches(&tags("db")).unwrap());
        assert!(!m.matches(&tags("web-1")).unwrap());
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(matcher("cores >= 8").matches(&tags("a")).unwrap());
        assert!(matcher("cores < 10.5").matches(&tags("a")).unwrap());
        assert!(!matcher("cores > 8").matches(&tags("a")).unwrap());
        // host is not numeric
        assert!(!matcher("host = 1").matches(&tags("a")).unwrap());
        assert!(matcher("host != 1").matches(&tags("a")).unwrap());
    }

    #[test]
    fn test_literal_on_left_is_mirrored() {
        assert!(matcher("4 < cores").matches(&tags("a")).unwrap());
        assert!(!matcher("'b' < host").matches(&tags("a")).unwrap());
    }

    #[test]
    fn test_missing_tag_is_empty_string() {
        assert!(matcher("region = ''").matches(&tags("a")).unwrap());
        assert!(!matcher("region = 'eu'").matches(&tags("a")).unwrap());
    }

    #[test]
    fn test_string_literal_with_regex_operator_is_error() {
        let m = matcher("host =~ 'a'");
        assert!(matches!(m.matches(&tags("a")), Err(StorageError::Engine(_))));
    }
}
