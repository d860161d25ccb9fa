use crate::ast::{Expr, Literal};
use crate::error::ParseError;
use crate::parser;
use std::convert::TryFrom;

impl<'a> TryFrom<&'a str> for Expr {
    type Error = ParseError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> { parser::parse_expression(value) }
}

impl TryFrom<String> for Expr {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> { parser::parse_expression(&value) }
}

impl std::str::FromStr for Expr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { parser::parse_expression(s) }
}

impl From<Literal> for Expr {
    fn from(value: Literal) -> Self { Expr::Literal(value) }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(&crate::serializer::serialize(self)) }
}
