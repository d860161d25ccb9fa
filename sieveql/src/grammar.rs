use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "expression.pest"]
pub struct ExpressionParser;
