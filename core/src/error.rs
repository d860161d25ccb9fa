//! Error taxonomy for binding, resolution and evaluation.
//!
//! Expression text failures are `sieveql::ParseError`; everything the engine adds on top is one of the
//! three kinds below, and all four fold into `QueryError` at the API surface.

pub use sieveql::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyResolutionError {
    #[error("property '{segment}' not found on type '{type_name}' (path '{path}')")]
    NotFound { path: String, segment: String, type_name: String },

    #[error("type '{type_name}' cannot be indexed (path '{path}')")]
    NotIndexable { path: String, type_name: String },

    #[error("malformed property path '{path}': {reason}")]
    Malformed { path: String, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeConversionError {
    /// Cannot convert from source type to target type
    #[error("cannot convert from {from} to {to}")]
    IncompatibleTypes { from: String, to: String },

    /// Invalid text for the target type (e.g. an unparseable date)
    #[error("invalid format '{value}' for type {target}")]
    InvalidFormat { value: String, target: String },

    #[error("numeric overflow: '{value}' cannot fit in {target}")]
    NumericOverflow { value: String, target: String },

    #[error("values of type {left} and {right} cannot be compared")]
    Incomparable { left: String, right: String },

    #[error("filter operator {operator} requires a value")]
    MissingValue { operator: String },

    #[error("filter operator {operator} is not applicable to property '{property}' of type {type_name}")]
    UnsupportedOperator { operator: String, property: String, type_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("arithmetic overflow in {operation}")]
    Overflow { operation: &'static str },

    #[error("division by zero")]
    DivideByZero,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("property resolution error: {0}")]
    Property(#[from] PropertyResolutionError),

    #[error("type conversion error: {0}")]
    Conversion(#[from] TypeConversionError),

    #[error("range error: {0}")]
    Range(#[from] RangeError),
}
