//! Parser, AST and canonical serializer for sieve expressions: single-parameter lambdas such as
//! `p => p.Age > 18 && p.Tags.Any(t => t.StartsWith("a"))`.
//!
//! This crate is purely syntactic. Binding identifiers to a parameter type and evaluating the result
//! happens in `sieve-core`.

pub mod ast;
pub mod conversion;
pub mod error;
pub mod grammar;
pub mod literal;
pub mod parser;
pub mod serializer;

pub use error::ParseError;
pub use parser::parse_expression;
pub use serializer::serialize;
