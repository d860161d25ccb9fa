use crate::grammar::Rule;
use pest::error::InputLocation;
use std::convert::Infallible;
use thiserror::Error;

/// The single failure kind of the expression language: malformed grammar, unknown identifiers or types,
/// and unsupported constructs all surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", .position.map(|p| format!(" (at position {p})")).unwrap_or_default())]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the source text, when the failure can be pinned to a token
    pub position: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self { Self { message: message.into(), position: None } }

    pub fn at(message: impl Into<String>, position: usize) -> Self { Self { message: message.into(), position: Some(position) } }

    pub(crate) fn unexpected(expected: &'static str, got: Rule, position: usize) -> Self {
        Self::at(format!("Expected {expected}, got {got:?}"), position)
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let position = match err.location {
            InputLocation::Pos(pos) => pos,
            InputLocation::Span((start, _)) => start,
        };
        Self::at(format!("Syntax error: {}", err.variant.message()), position)
    }
}

impl From<Infallible> for ParseError {
    fn from(_: Infallible) -> Self { unreachable!("Infallible can never be constructed") }
}
