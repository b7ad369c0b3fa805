//! Filter compilation
//!
//! Turns the textual filter of a raw read into a structured read request:
//!
//! - **AST**: Expression syntax tree types
//! - **Parser**: Parse expression strings into the AST
//! - **Condition**: Resolve `now()` and pull time bounds out of the condition
//! - **Predicate**: The tree handed to the storage engine
//! - **Compiler**: Glue from filter fields to [`ReadRequest`]
//!
//! # Filter Language
//!
//! ```text
//! host = 'server01' AND (region =~ /us-.*/ OR dc != 'fra1')
//! time >= now() - 6h AND time < '2024-01-01T00:00:00Z'
//! ```
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use rawread::query::compile;
//!
//! let request = compile("telegraf", "", "cpu", "usage_idle", "host = 'a'", Utc::now()).unwrap();
//! assert!(request.predicate.is_some());
//! ```

pub mod ast;
pub mod compiler;
pub mod condition;
mod error;
mod parser;
pub mod predicate;

pub use ast::{BinaryOp, Expr};
pub use compiler::{
    compile, ReadRequest, ReadSource, TimestampRange, DEFAULT_FIELD, FIELD_TAG_KEY,
    MEASUREMENT_TAG_KEY,
};
pub use condition::{TimeRange, MAX_TIME_NANO, MIN_TIME_NANO};
pub use error::{CompileError, CompileResult};
pub use parser::parse_expr;
pub use predicate::{ComparisonOp, LiteralValue, LogicalOp, Node, Predicate};
