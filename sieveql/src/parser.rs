use std::sync::LazyLock;

use crate::ast::{BinaryOperator, CallTarget, Expr, Literal, TypeName};
use crate::error::ParseError;
use crate::grammar::{ExpressionParser, Rule};
use crate::literal::{self, LiteralFactory};
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;

static PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::Coalesce, Assoc::Right))
        .op(Op::infix(Rule::Or, Assoc::Left))
        .op(Op::infix(Rule::And, Assoc::Left))
        .op(Op::infix(Rule::Eq, Assoc::Left) | Op::infix(Rule::NotEq, Assoc::Left))
        .op(Op::infix(Rule::Lt, Assoc::Left)
            | Op::infix(Rule::LtEq, Assoc::Left)
            | Op::infix(Rule::Gt, Assoc::Left)
            | Op::infix(Rule::GtEq, Assoc::Left))
        .op(Op::infix(Rule::Add, Assoc::Left) | Op::infix(Rule::Sub, Assoc::Left))
        .op(Op::infix(Rule::Mul, Assoc::Left) | Op::infix(Rule::Div, Assoc::Left) | Op::infix(Rule::Mod, Assoc::Left))
        .op(Op::prefix(Rule::Not) | Op::prefix(Rule::Neg))
});

/// Parse expression text into an (unbound) expression tree.
///
/// The result is purely syntactic: identifiers are left as `Expr::Parameter` and casts as `Expr::Cast`
/// until a binder resolves them against a parameter type. The only folding done here is negative
/// numeric literals and `Type.Parse("...")` literal factories.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut pairs = ExpressionParser::parse(Rule::Root, input)?;

    // Root is silent, so the first pair is the Expression itself
    let expr = pairs.next().ok_or_else(|| ParseError::new("Empty expression"))?;
    if expr.as_rule() != Rule::Expression {
        return Err(ParseError::unexpected("Expression", expr.as_rule(), expr.as_span().start()));
    }

    let parsed = parse_expr(expr)?;
    tracing::trace!(input, ?parsed, "parsed expression");
    Ok(parsed)
}

fn first_inner(pair: Pair<Rule>) -> Result<Pair<Rule>, ParseError> {
    let position = pair.as_span().start();
    pair.into_inner().next().ok_or_else(|| ParseError::at("Empty expression", position))
}

fn parse_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let inner = first_inner(pair)?;
    match inner.as_rule() {
        Rule::Lambda => parse_lambda(inner),
        Rule::Conditional => parse_conditional(inner),
        other => Err(ParseError::unexpected("Lambda or Conditional", other, inner.as_span().start())),
    }
}

fn parse_lambda(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    let mut inner = pair.into_inner();
    let parameter = inner.next().ok_or_else(|| ParseError::at("Missing lambda parameter", position))?;
    let body = inner.next().ok_or_else(|| ParseError::at("Missing lambda body", position))?;
    Ok(Expr::lambda(parameter.as_str(), parse_expr(body)?))
}

fn parse_conditional(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    let mut inner = pair.into_inner();
    let test = parse_binary(inner.next().ok_or_else(|| ParseError::at("Missing operand", position))?)?;
    match (inner.next(), inner.next()) {
        (None, _) => Ok(test),
        (Some(then), Some(otherwise)) => Ok(Expr::Conditional {
            test: Box::new(test),
            then: Box::new(parse_expr(then)?),
            otherwise: Box::new(parse_expr(otherwise)?),
        }),
        (Some(_), None) => Err(ParseError::at("Conditional expression is missing its ':' branch", position)),
    }
}

fn parse_binary(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    PRATT
        .map_primary(parse_postfix)
        .map_prefix(|op, operand| {
            let operand = operand?;
            match op.as_rule() {
                Rule::Not => Ok(Expr::not(operand)),
                Rule::Neg => Ok(negate(operand)),
                other => Err(ParseError::unexpected("prefix operator", other, op.as_span().start())),
            }
        })
        .map_infix(|left, op, right| Ok(Expr::binary(binary_operator(&op)?, left?, right?)))
        .parse(pair.into_inner())
}

fn binary_operator(op: &Pair<Rule>) -> Result<BinaryOperator, ParseError> {
    Ok(match op.as_rule() {
        Rule::Coalesce => BinaryOperator::Coalesce,
        Rule::Or => BinaryOperator::Or,
        Rule::And => BinaryOperator::And,
        Rule::Eq => BinaryOperator::Equal,
        Rule::NotEq => BinaryOperator::NotEqual,
        Rule::Lt => BinaryOperator::LessThan,
        Rule::LtEq => BinaryOperator::LessThanOrEqual,
        Rule::Gt => BinaryOperator::GreaterThan,
        Rule::GtEq => BinaryOperator::GreaterThanOrEqual,
        Rule::Add => BinaryOperator::Add,
        Rule::Sub => BinaryOperator::Subtract,
        Rule::Mul => BinaryOperator::Multiply,
        Rule::Div => BinaryOperator::Divide,
        Rule::Mod => BinaryOperator::Modulo,
        other => return Err(ParseError::unexpected("binary operator", other, op.as_span().start())),
    })
}

/// `-5` is a literal, not a negation of one
fn negate(operand: Expr) -> Expr {
    if let Expr::Literal(literal) = &operand {
        if let Some(negated) = literal.negate() {
            return Expr::Literal(narrow(negated));
        }
    }
    Expr::Unary { operator: crate::ast::UnaryOperator::Negate, operand: Box::new(operand) }
}

/// `-2147483648` is lexed as a long before negation; bring it back to int when it fits
fn narrow(literal: Literal) -> Literal {
    match literal {
        Literal::I64(i) => i32::try_from(i).map(Literal::I32).unwrap_or(Literal::I64(i)),
        other => other,
    }
}

fn parse_postfix(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    let mut inner = pair.into_inner();
    let primary = inner.next().ok_or_else(|| ParseError::at("Missing operand", position))?;
    let mut expr = parse_primary(primary)?;

    for suffix in inner {
        let position = suffix.as_span().start();
        match suffix.as_rule() {
            Rule::MemberSuffix => {
                let mut parts = suffix.into_inner();
                let name = parts.next().ok_or_else(|| ParseError::at("Missing member name", position))?.as_str().to_string();
                expr = match parts.next() {
                    Some(arguments) => make_call(expr, name, parse_arguments(arguments)?, position)?,
                    None => Expr::member(expr, name),
                };
            }
            Rule::IndexSuffix => {
                let index = parse_expr(first_inner(suffix)?)?;
                expr = Expr::index(expr, index);
            }
            other => return Err(ParseError::unexpected("member access or indexer", other, position)),
        }
    }
    Ok(expr)
}

fn parse_arguments(pair: Pair<Rule>) -> Result<Vec<Expr>, ParseError> { pair.into_inner().map(parse_expr).collect() }

fn parse_primary(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    match pair.as_rule() {
        Rule::Null => Ok(Expr::Literal(Literal::Null)),
        Rule::True => Ok(Expr::Literal(Literal::Bool(true))),
        Rule::False => Ok(Expr::Literal(Literal::Bool(false))),
        Rule::Number | Rule::SignedNumber => Ok(Expr::Literal(parse_number(pair.as_str(), position)?)),
        Rule::StringLiteral => parse_string_literal(pair),
        Rule::NewArray => parse_new_array(pair),
        Rule::Cast => parse_cast(pair),
        Rule::Parenthesized => parse_expr(first_inner(pair)?),
        Rule::Identifier => Ok(Expr::Parameter(pair.as_str().to_string())),
        other => Err(ParseError::unexpected("literal, identifier or parenthesized expression", other, position)),
    }
}

/// Parse a numeric literal, honoring the `L`, `U`, `UL`, `F`, `D` and `M` suffixes
fn parse_number(text: &str, position: usize) -> Result<Literal, ParseError> {
    let lower = text.trim().to_ascii_lowercase();
    let split = lower.trim_end_matches(|c: char| c.is_ascii_alphabetic()).len();
    let (digits, suffix) = lower.split_at(split);
    let fractional = digits.contains('.') || digits.contains('e');
    let invalid = |e: &dyn std::fmt::Display| ParseError::at(format!("Invalid numeric literal '{text}': {e}"), position);

    match suffix {
        "" if fractional => digits.parse::<f64>().map(Literal::F64).map_err(|e| invalid(&e)),
        "" => match digits.parse::<i32>() {
            Ok(i) => Ok(Literal::I32(i)),
            Err(_) => digits.parse::<i64>().map(Literal::I64).map_err(|e| invalid(&e)),
        },
        "l" | "u" | "ul" | "lu" if !fractional => digits.parse::<i64>().map(Literal::I64).map_err(|e| invalid(&e)),
        "f" => digits.parse::<f32>().map(Literal::F32).map_err(|e| invalid(&e)),
        "d" | "m" => digits.parse::<f64>().map(Literal::F64).map_err(|e| invalid(&e)),
        _ => Err(ParseError::at(format!("Invalid numeric suffix in '{text}'"), position)),
    }
}

fn parse_string_literal(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    let content = match pair.into_inner().next() {
        Some(content) => content.as_str(),
        None => "",
    };
    Ok(Expr::Literal(Literal::String(unescape(content, position)?)))
}

fn unescape(content: &str, position: usize) -> Result<String, ParseError> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some('\\') => result.push('\\'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('0') => result.push('\0'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32);
                result.push(decoded.ok_or_else(|| ParseError::at(format!("Invalid unicode escape '\\u{hex}'"), position))?);
            }
            Some(other) => return Err(ParseError::at(format!("Unknown escape sequence '\\{other}'"), position)),
            None => return Err(ParseError::at("Unterminated escape sequence", position)),
        }
    }
    Ok(result)
}

fn parse_new_array(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let mut element_type = None;
    let mut elements = Vec::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::New => {}
            Rule::TypeName => element_type = Some(TypeName::parse(part.as_str())),
            Rule::Expression => elements.push(parse_expr(part)?),
            other => return Err(ParseError::unexpected("array element", other, part.as_span().start())),
        }
    }
    Ok(Expr::NewArray { element_type, elements })
}

fn parse_cast(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    let position = pair.as_span().start();
    let mut inner = pair.into_inner();
    let ty = inner.next().ok_or_else(|| ParseError::at("Missing cast type", position))?;
    let operand = inner.next().ok_or_else(|| ParseError::at("Missing cast operand", position))?;
    Ok(Expr::Cast { ty: TypeName::parse(ty.as_str()), expr: Box::new(parse_primary(operand)?) })
}

/// Dotted name of an identifier chain such as `System.Globalization.CultureInfo`
pub(crate) fn dotted_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Parameter(name) => Some(name.clone()),
        Expr::Member { target, name } => dotted_name(target).map(|prefix| format!("{prefix}.{name}")),
        _ => None,
    }
}

fn make_call(receiver: Expr, method: String, args: Vec<Expr>, position: usize) -> Result<Expr, ParseError> {
    if let Some(factory) = dotted_name(&receiver).as_deref().and_then(LiteralFactory::from_name) {
        return fold_factory_call(factory, method, args, position);
    }
    Ok(Expr::Call { target: CallTarget::Instance(Box::new(receiver)), method, args })
}

fn is_format_provider(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(Literal::Null) => true,
        other => dotted_name(other).is_some_and(|name| {
            name.starts_with("CultureInfo.") || name.starts_with("System.Globalization.CultureInfo.")
        }),
    }
}

fn date_time_styles(expr: &Expr) -> Option<i32> {
    match expr {
        Expr::Cast { ty, expr } if literal::is_date_time_styles_type(&ty.name) => match expr.as_ref() {
            Expr::Literal(Literal::I32(flags)) => Some(*flags),
            _ => None,
        },
        other => {
            let name = dotted_name(other)?;
            let (ty, member) = name.rsplit_once('.')?;
            if literal::is_date_time_styles_type(ty) {
                literal::date_time_style(member)
            } else {
                None
            }
        }
    }
}

/// Fold `DateTime.Parse("...")` and friends into literals. Calls whose first argument is not a string
/// literal stay as static calls, normalized to `(value[, CultureInfo.InvariantCulture, (DateTimeStyles)N])`.
fn fold_factory_call(factory: LiteralFactory, method: String, args: Vec<Expr>, position: usize) -> Result<Expr, ParseError> {
    if method != "Parse" {
        return Err(ParseError::at(format!("Unsupported method '{}.{}'", factory.name(), method), position));
    }

    let mut args = args.into_iter();
    let value = args.next().ok_or_else(|| ParseError::at(format!("{}.Parse requires an argument", factory.name()), position))?;

    let mut styles = None;
    for arg in args {
        if is_format_provider(&arg) {
            continue;
        }
        match date_time_styles(&arg) {
            Some(flags) if factory == LiteralFactory::DateTime && styles.is_none() => styles = Some(flags),
            _ => return Err(ParseError::at(format!("Unsupported argument to {}.Parse", factory.name()), position)),
        }
    }

    let text = match value {
        Expr::Literal(Literal::String(text)) => text,
        other => {
            let mut args = vec![other];
            if let Some(flags) = styles {
                args.push(Expr::member(Expr::parameter("CultureInfo"), "InvariantCulture"));
                args.push(Expr::Cast { ty: TypeName::new("DateTimeStyles"), expr: Box::new(Expr::Literal(Literal::I32(flags))) });
            }
            return Ok(Expr::Call { target: CallTarget::Static(factory.name().to_string()), method, args });
        }
    };

    let invalid = || ParseError::at(format!("'{}' is not a valid {}", text, factory.name()), position);
    let literal = match factory {
        LiteralFactory::DateTime => Literal::DateTime { value: literal::parse_date_time(&text).ok_or_else(invalid)?, styles },
        LiteralFactory::DateTimeOffset => Literal::DateTimeOffset(literal::parse_date_time_offset(&text).ok_or_else(invalid)?),
        LiteralFactory::DateOnly => Literal::Date(literal::parse_date(&text).ok_or_else(invalid)?),
        LiteralFactory::TimeOnly => Literal::Time(literal::parse_time(&text).ok_or_else(invalid)?),
        LiteralFactory::Guid => Literal::Guid(literal::parse_guid(&text).ok_or_else(invalid)?),
    };
    Ok(Expr::Literal(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::UnaryOperator;
    use chrono::NaiveDate;

    fn member(param: &str, name: &str) -> Expr { Expr::member(Expr::parameter(param), name) }

    #[test]
    fn test_parse_lambda_equality() {
        let expr = parse_expression(r#"p => p.Name == "foo""#).unwrap();
        assert_eq!(
            expr,
            Expr::lambda("p", Expr::binary(BinaryOperator::Equal, member("p", "Name"), Expr::literal("foo")))
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("a || b && c == 1 + 2 * 3").unwrap();
        let product = Expr::binary(BinaryOperator::Multiply, Expr::literal(2), Expr::literal(3));
        let sum = Expr::binary(BinaryOperator::Add, Expr::literal(1), product);
        let eq = Expr::binary(BinaryOperator::Equal, Expr::parameter("c"), sum);
        let and = Expr::binary(BinaryOperator::And, Expr::parameter("b"), eq);
        assert_eq!(expr, Expr::binary(BinaryOperator::Or, Expr::parameter("a"), and));
    }

    #[test]
    fn test_left_associative_subtraction() {
        let expr = parse_expression("10 - 4 - 3").unwrap();
        let inner = Expr::binary(BinaryOperator::Subtract, Expr::literal(10), Expr::literal(4));
        assert_eq!(expr, Expr::binary(BinaryOperator::Subtract, inner, Expr::literal(3)));
    }

    #[test]
    fn test_conditional() {
        let expr = parse_expression("x => x.Age > 18 ? \"adult\" : \"minor\"").unwrap();
        let Expr::Lambda { body, .. } = expr else { panic!("expected lambda") };
        assert!(matches!(*body, Expr::Conditional { .. }));
    }

    #[test]
    fn test_negative_literals_fold() {
        assert_eq!(parse_expression("-5").unwrap(), Expr::literal(-5));
        assert_eq!(parse_expression("-2147483648").unwrap(), Expr::literal(i32::MIN));
        assert_eq!(parse_expression("-x").unwrap(), Expr::Unary { operator: UnaryOperator::Negate, operand: Box::new(Expr::parameter("x")) });
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(parse_expression("50").unwrap(), Expr::literal(50));
        assert_eq!(parse_expression("3000000000").unwrap(), Expr::literal(3_000_000_000i64));
        assert_eq!(parse_expression("5L").unwrap(), Expr::literal(5i64));
        assert_eq!(parse_expression("85.3f").unwrap(), Expr::literal(85.3f32));
        assert_eq!(parse_expression("1.5").unwrap(), Expr::literal(1.5f64));
        assert_eq!(parse_expression("2e3").unwrap(), Expr::literal(2000.0f64));
        assert!(parse_expression("1.5L").is_err());
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse_expression(r#""a\"b\\c\nA""#).unwrap(), Expr::literal("a\"b\\c\nA"));
        assert!(parse_expression(r#""bad \q""#).is_err());
    }

    #[test]
    fn test_static_literal_factories() {
        let expr = parse_expression(r#"DateTime.Parse("2024-01-02T03:04:05.0000000")"#).unwrap();
        let value = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        assert_eq!(expr, Expr::Literal(Literal::DateTime { value, styles: None }));

        let expr =
            parse_expression(r#"DateTime.Parse("2024-01-02", CultureInfo.InvariantCulture, (DateTimeStyles)16)"#).unwrap();
        let midnight = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(expr, Expr::Literal(Literal::DateTime { value: midnight, styles: Some(16) }));

        let expr = parse_expression(r#"System.DateTime.Parse("2024-01-02", null, DateTimeStyles.AdjustToUniversal)"#).unwrap();
        assert_eq!(expr, Expr::Literal(Literal::DateTime { value: midnight, styles: Some(16) }));

        let expr = parse_expression(r#"Guid.Parse("4c9d4f3e-0bb3-4b8e-9d7e-2f64a1b8e0a1")"#).unwrap();
        assert!(matches!(expr, Expr::Literal(Literal::Guid(_))));

        assert!(matches!(parse_expression(r#"DateOnly.Parse("2024-01-02")"#).unwrap(), Expr::Literal(Literal::Date(_))));
        assert!(matches!(parse_expression(r#"TimeOnly.Parse("10:30:00")"#).unwrap(), Expr::Literal(Literal::Time(_))));
    }

    #[test]
    fn test_static_factory_errors_carry_position() {
        let err = parse_expression(r#"x => x.When > DateTime.Parse("not a date")"#).unwrap_err();
        assert!(err.message.contains("not a valid DateTime"), "{err}");
        assert!(err.position.is_some());

        assert!(parse_expression(r#"Guid.NewGuid()"#).is_err());
    }

    #[test]
    fn test_static_factory_with_runtime_argument() {
        let expr = parse_expression("x => DateTime.Parse(x.Text)").unwrap();
        let Expr::Lambda { body, .. } = expr else { panic!("expected lambda") };
        assert_eq!(
            *body,
            Expr::Call { target: CallTarget::Static("DateTime".into()), method: "Parse".into(), args: vec![member("x", "Text")] }
        );
    }

    #[test]
    fn test_enum_cast_is_left_for_binding() {
        let expr = parse_expression("x => x.Status == (MyApp.Status)1").unwrap();
        let Expr::Lambda { body, .. } = expr else { panic!("expected lambda") };
        let Expr::Binary { right, .. } = *body else { panic!("expected binary") };
        assert_eq!(*right, Expr::Cast { ty: TypeName::new("MyApp.Status"), expr: Box::new(Expr::literal(1)) });
    }

    #[test]
    fn test_array_receiver_and_argument() {
        let expr = parse_expression(r#"x => (new [] { "Alice" }).Intersect(x.Names).Any()"#).unwrap();
        let Expr::Lambda { body, .. } = expr else { panic!("expected lambda") };
        let array = Expr::array(vec![Expr::literal("Alice")]);
        let intersect = Expr::call(array, "Intersect", vec![member("x", "Names")]);
        assert_eq!(*body, Expr::call(intersect, "Any", vec![]));
    }

    #[test]
    fn test_nested_lambda_argument() {
        let expr = parse_expression(r#"o => o.Items.Any(i => i.Price >= 10.5)"#).unwrap();
        let Expr::Lambda { body, .. } = expr else { panic!("expected lambda") };
        let Expr::Call { method, args, .. } = *body else { panic!("expected call") };
        assert_eq!(method, "Any");
        assert_eq!(
            args,
            vec![Expr::lambda("i", Expr::binary(BinaryOperator::GreaterThanOrEqual, member("i", "Price"), Expr::literal(10.5)))]
        );
    }

    #[test]
    fn test_indexer() {
        let expr = parse_expression("x.Values[1]").unwrap();
        assert_eq!(expr, Expr::index(member("x", "Values"), Expr::literal(1)));
    }

    #[test]
    fn test_syntax_error_has_position() {
        let err = parse_expression("x => x.Name ==").unwrap_err();
        assert!(err.position.is_some_and(|p| p >= 12));
        assert!(err.message.starts_with("Syntax error"));
    }
}
