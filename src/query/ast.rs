//! Expression Abstract Syntax Tree
//!
//! Defines the AST for filter expressions, the boolean/arithmetic subset of
//! InfluxQL used in `WHERE` clauses.
//!
//! # Example Expressions
//!
//! ```text
//! host = 'server01' AND region =~ /us-.*/
//! time >= now() - 1h AND (cpu = 'cpu0' OR cpu = 'cpu1')
//! "disk name" != 'sda' AND time < '2024-01-01T00:00:00Z'
//! ```

use std::fmt;

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Binary operation, `lhs op rhs`
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Explicitly parenthesized expression
    Paren(Box<Expr>),
    /// Single-quoted string literal
    String(String),
    /// Floating point literal
    Number(f64),
    /// Signed integer literal
    Integer(i64),
    /// Integer literal too large for `i64`
    Unsigned(u64),
    /// `true` / `false`
    Boolean(bool),
    /// Regex literal, pattern text between the slashes
    Regex(String),
    /// Duration literal in nanoseconds
    Duration(i64),
    /// Absolute time in nanoseconds since the epoch, produced by reduction
    Time(i64),
    /// Reference to a tag or field key
    VarRef(String),
    /// Function call such as `now()`
    Call { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Build a binary expression
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Wrap an expression in parentheses
    pub fn paren(expr: Expr) -> Self {
        Expr::Paren(Box::new(expr))
    }

    /// Build a variable reference
    pub fn var(name: impl Into<String>) -> Self {
        Expr::VarRef(name.into())
    }

    /// Build a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Expr::String(value.into())
    }

    /// Human readable name of the expression kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Binary { .. } => "binary expression",
            Expr::Paren(_) => "parenthesized expression",
            Expr::String(_) => "string literal",
            Expr::Number(_) => "number literal",
            Expr::Integer(_) => "integer literal",
            Expr::Unsigned(_) => "unsigned literal",
            Expr::Boolean(_) => "boolean literal",
            Expr::Regex(_) => "regex literal",
            Expr::Duration(_) => "duration literal",
            Expr::Time(_) => "time literal",
            Expr::VarRef(_) => "variable reference",
            Expr::Call { .. } => "function call",
        }
    }

    /// Returns true if this is a literal value (no references or calls)
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Expr::String(_)
                | Expr::Number(_)
                | Expr::Integer(_)
                | Expr::Unsigned(_)
                | Expr::Boolean(_)
                | Expr::Regex(_)
                | Expr::Duration(_)
                | Expr::Time(_)
        )
    }

    /// Returns true if this is a reference to the `time` pseudo-column
    pub fn is_time_ref(&self) -> bool {
        matches!(self, Expr::VarRef(name) if name.eq_ignore_ascii_case("time"))
    }
}

/// Binary operators, in InfluxQL spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    EqRegex,
    NeqRegex,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::EqRegex
            | BinaryOp::NeqRegex
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => 4,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::BitAnd => 6,
        }
    }

    /// Comparison operators (`=`, `!=`, `=~`, `!~`, `<`, `<=`, `>`, `>=`)
    pub fn is_comparison(self) -> bool {
        self.precedence() == 4
    }

    /// The operator with its operands swapped, for comparisons where that
    /// changes meaning. `a < b` is `b > a`.
    pub fn mirrored(self) -> Self {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Lte => BinaryOp::Gte,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Gte => BinaryOp::Lte,
            other => other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::Neq => "!=",
            BinaryOp::EqRegex => "=~",
            BinaryOp::NeqRegex => "!~",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::String(s) => write!(f, "'{}'", escape_string(s)),
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Integer(i) => write!(f, "{}", i),
            Expr::Unsigned(u) => write!(f, "{}", u),
            Expr::Boolean(b) => write!(f, "{}", b),
            Expr::Regex(pattern) => write!(f, "/{}/", pattern.replace('/', "\\/")),
            Expr::Duration(ns) => write!(f, "{}ns", ns),
            Expr::Time(ns) => write!(f, "{}", ns),
            Expr::VarRef(name) => write!(f, "{}", quote_ident(name)),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Escape a value for use inside a single-quoted string literal
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Render an identifier, double-quoting it when it is not a bare word
pub fn quote_ident(name: &str) -> String {
    let bare = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if bare {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(BinaryOp::Or.precedence() < BinaryOp::And.precedence());
        assert!(BinaryOp::And.precedence() < BinaryOp::Eq.precedence());
        assert!(BinaryOp::Eq.precedence() < BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() < BinaryOp::Mul.precedence());
    }

    #[test]
    fn test_mirrored() {
        assert_eq!(BinaryOp::Lt.mirrored(), BinaryOp::Gt);
        assert_eq!(BinaryOp::Gte.mirrored(), BinaryOp::Lte);
        assert_eq!(BinaryOp::Eq.mirrored(), BinaryOp::Eq);
    }

    #[test]
    fn test_display() {
        let expr = Expr::binary(
            BinaryOp::And,
            Expr::paren(Expr::binary(
                BinaryOp::Eq,
                Expr::var("host"),
                Expr::string("it's"),
            )),
            Expr::binary(BinaryOp::EqRegex, Expr::var("disk name"), Expr::Regex("sd.".into())),
        );
        assert_eq!(
            expr.to_string(),
            r#"(host = 'it\'s') AND "disk name" =~ /sd./"#
        );
    }

    #[test]
    fn test_is_time_ref() {
        assert!(Expr::var("time").is_time_ref());
        assert!(Expr::var("TIME").is_time_ref());
        assert!(!Expr::var("host").is_time_ref());
    }
}
