//! Predicate tree
//!
//! The structured boolean expression handed to the storage engine. Every
//! comparison and logical node owns exactly two ordered children and every
//! parenthesized node owns exactly one, enforced by the shape of [`Node`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::query::ast::{escape_string, quote_ident};

/// Literal operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LiteralValue {
    String(String),
    Float(f64),
    Integer(i64),
    Unsigned(u64),
    /// Regex pattern text, compiled by the engine
    Regex(String),
}

/// Comparison operators understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    RegexMatch,
    RegexNotMatch,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::RegexMatch => "=~",
            ComparisonOp::RegexNotMatch => "!~",
            ComparisonOp::Less => "<",
            ComparisonOp::LessEqual => "<=",
            ComparisonOp::Greater => ">",
            ComparisonOp::GreaterEqual => ">=",
        }
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A predicate tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Literal {
        value: LiteralValue,
    },
    TagRef {
        key: String,
    },
    Comparison {
        op: ComparisonOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Paren {
        expr: Box<Node>,
    },
}

impl Node {
    pub fn literal(value: LiteralValue) -> Self {
        Node::Literal { value }
    }

    pub fn tag_ref(key: impl Into<String>) -> Self {
        Node::TagRef { key: key.into() }
    }

    pub fn comparison(op: ComparisonOp, lhs: Node, rhs: Node) -> Self {
        Node::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn logical(op: LogicalOp, lhs: Node, rhs: Node) -> Self {
        Node::Logical {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn paren(expr: Node) -> Self {
        Node::Paren {
            expr: Box::new(expr),
        }
    }

    /// Nesting depth, a leaf has depth 1
    pub fn depth(&self) -> usize {
        match self {
            Node::Literal { .. } | Node::TagRef { .. } => 1,
            Node::Comparison { lhs, rhs, .. } | Node::Logical { lhs, rhs, .. } => {
                1 + lhs.depth().max(rhs.depth())
            }
            Node::Paren { expr } => 1 + expr.depth(),
        }
    }

    /// Children in order
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Literal { .. } | Node::TagRef { .. } => Vec::new(),
            Node::Comparison { lhs, rhs, .. } | Node::Logical { lhs, rhs, .. } => {
                vec![lhs.as_ref(), rhs.as_ref()]
            }
            Node::Paren { expr } => vec![expr.as_ref()],
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "'{}'", escape_string(s)),
            LiteralValue::Float(v) => write!(f, "{}", v),
            LiteralValue::Integer(v) => write!(f, "{}", v),
            LiteralValue::Unsigned(v) => write!(f, "{}", v),
            LiteralValue::Regex(p) => write!(f, "/{}/", p.replace('/', "\\/")),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Literal { value } => write!(f, "{}", value),
            Node::TagRef { key } => write!(f, "{}", quote_ident(key)),
            Node::Comparison { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
            Node::Logical { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op.as_str(), rhs),
            Node::Paren { expr } => write!(f, "({})", expr),
        }
    }
}

/// Root of a predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub root: Node,
}

impl Predicate {
    pub fn new(root: Node) -> Self {
        Self { root }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_eq(value: &str) -> Node {
        Node::comparison(
            ComparisonOp::Equal,
            Node::tag_ref("host"),
            Node::literal(LiteralValue::String(value.to_string())),
        )
    }

    #[test]
    fn test_display_round_trips_to_text() {
        let tree = Node::logical(
            LogicalOp::And,
            Node::paren(Node::logical(LogicalOp::Or, host_eq("a"), host_eq("b"))),
            Node::comparison(
                ComparisonOp::RegexMatch,
                Node::tag_ref("region"),
                Node::literal(LiteralValue::Regex("us-.*".into())),
            ),
        );
        assert_eq!(
            tree.to_string(),
            "(host = 'a' OR host = 'b') AND region =~ /us-.*/"
        );
    }

    #[test]
    fn test_depth_and_children() {
        let tree = Node::paren(host_eq("a"));
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.children().len(), 1);
        assert_eq!(host_eq("a").children().len(), 2);
        assert!(Node::tag_ref("x").children().is_empty());
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(host_eq("a")).unwrap();
        assert_eq!(json["node"], "comparison");
        assert_eq!(json["op"], "equal");
        assert_eq!(json["lhs"]["node"], "tag_ref");
        assert_eq!(json["rhs"]["value"]["type"], "string");

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, host_eq("a"));
    }
}
