//! # AlphaForge Expression Engine
//!
//! Grammar, AST, serializer and rewrite transformers for alpha expressions:
//! arithmetic/functional formulas over named market-data fields, e.g.
//! `group_neutralize(ts_rank(close / vwap, 25), industry)`.
//!
//! The parser is single-pass and deterministic; the canonical rendered form
//! re-parses to a structurally identical tree, which is what lets the search
//! strategies treat expression text as the exchange format.

pub mod ast;
pub mod error;
pub mod parse;
pub mod transform;

pub use ast::{Arg, BinaryOp, Expr, Symbols};
pub use error::ParseError;
pub use parse::parse;
pub use transform::{rename_fields, rename_operators, OpCategory, OperatorRewrite};
