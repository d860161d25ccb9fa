//! Evaluation of bound expression trees.
//!
//! Nulls propagate the way the lifted operators of the source language do: member access on null is null,
//! `==` treats null as an ordinary value, ordering against null is false and arithmetic with null is null.
//! Integer arithmetic is checked.

use crate::compiler::{Node, SequenceArg};
use crate::error::{ParseError, QueryError, RangeError, TypeConversionError};
use crate::members::{self, SequenceMethod, StringMethod};
use crate::path::Step;
use crate::reflect::Reflect;
use crate::value::Value;
use sieveql::ast::BinaryOperator;
use sieveql::literal::{self, LiteralFactory};
use std::cmp::Ordering;

const EXPRESSION_PATH: &str = "<expression>";

enum Slot<'a> {
    Borrowed(&'a dyn Reflect),
    Owned(Value),
}

/// The parameter stack: the root parameter, then one slot per enclosing sequence lambda
pub struct Scope<'a> {
    slots: Vec<Slot<'a>>,
}

/// Predicate truth: a null result does not match
pub fn truthy(value: Value) -> Result<bool, QueryError> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "bool".to_string() }.into()),
    }
}

impl<'a> Scope<'a> {
    pub fn borrowed(source: &'a dyn Reflect) -> Self { Self { slots: vec![Slot::Borrowed(source)] } }

    pub fn owned(source: Value) -> Self { Self { slots: vec![Slot::Owned(source)] } }

    pub fn eval(&mut self, node: &Node) -> Result<Value, QueryError> {
        match node {
            Node::Constant(value) => Ok(value.clone()),
            Node::Parameter(depth) => match self.slots.get(*depth) {
                Some(Slot::Borrowed(object)) => Ok(object.to_value()),
                Some(Slot::Owned(value)) => Ok(value.clone()),
                None => Err(ParseError::new(format!("Unbound parameter at depth {depth}")).into()),
            },
            Node::Member { target, step } => {
                // read fields straight off a borrowed parameter without materializing it
                if let (Node::Parameter(depth), Step::Field(_) | Step::Dynamic(_)) = (target.as_ref(), step) {
                    if let Some(Slot::Borrowed(object)) = self.slots.get(*depth) {
                        let object = *object;
                        return step.apply_object(object, EXPRESSION_PATH);
                    }
                }
                let target = self.eval(target)?;
                step.apply(&target, EXPRESSION_PATH)
            }
            Node::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_into(target, index)
            }
            Node::Binary { operator, left, right } => self.eval_binary(*operator, left, right),
            Node::Not(operand) => match self.eval(operand)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "bool".to_string() }.into()),
            },
            Node::Negate(operand) => negate(self.eval(operand)?),
            Node::Conditional { test, then, otherwise } => {
                if truthy(self.eval(test)?)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Node::String { method, target, arg } => {
                let target = self.eval(target)?;
                let arg = match arg {
                    Some(arg) => Some(self.eval(arg)?),
                    None => None,
                };
                Ok(method.apply(&target, arg.as_ref()))
            }
            Node::Sequence { method, target, arg } => self.eval_sequence(*method, target, arg.as_ref()),
            Node::Parse { factory, text } => match self.eval(text)? {
                Value::Null => Ok(Value::Null),
                Value::String(text) => parse_factory(*factory, &text),
                other => Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "string".to_string() }.into()),
            },
            Node::Array(elements) => Ok(Value::List(elements.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?)),
            Node::Convert { target, ty } => Ok(self.eval(target)?.cast_to(ty)?),
        }
    }

    fn eval_binary(&mut self, operator: BinaryOperator, left: &Node, right: &Node) -> Result<Value, QueryError> {
        match operator {
            BinaryOperator::And => {
                if !truthy(self.eval(left)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(self.eval(right)?)?))
            }
            BinaryOperator::Or => {
                if truthy(self.eval(left)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(self.eval(right)?)?))
            }
            BinaryOperator::Coalesce => match self.eval(left)? {
                Value::Null => self.eval(right),
                value => Ok(value),
            },
            BinaryOperator::Equal => Ok(Value::Bool(self.eval(left)?.loose_eq(&self.eval(right)?)?)),
            BinaryOperator::NotEqual => Ok(Value::Bool(!self.eval(left)?.loose_eq(&self.eval(right)?)?)),
            BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => {
                let (left, right) = (self.eval(left)?, self.eval(right)?);
                if left.is_null() || right.is_null() {
                    return Ok(Value::Bool(false));
                }
                let Some(ordering) = left.compare(&right)? else { return Ok(Value::Bool(false)) };
                Ok(Value::Bool(match operator {
                    BinaryOperator::LessThan => ordering == Ordering::Less,
                    BinaryOperator::LessThanOrEqual => ordering != Ordering::Greater,
                    BinaryOperator::GreaterThan => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => {
                let (left, right) = (self.eval(left)?, self.eval(right)?);
                arithmetic(operator, left, right)
            }
        }
    }

    fn eval_sequence(&mut self, method: SequenceMethod, target: &Node, arg: Option<&SequenceArg>) -> Result<Value, QueryError> {
        let target = self.eval(target)?;
        let items = match target {
            Value::List(items) => items,
            Value::Null => {
                return Ok(match method {
                    SequenceMethod::Count => Value::I32(0),
                    SequenceMethod::Intersect | SequenceMethod::Except => Value::List(Vec::new()),
                    _ => Value::Bool(false),
                })
            }
            // untyped receivers bind `Contains` to the sequence form; strings answer it themselves
            text @ Value::String(_) if method == SequenceMethod::Contains => {
                let needle = match arg {
                    Some(SequenceArg::Value(node)) => self.eval(node)?,
                    _ => Value::Null,
                };
                return Ok(StringMethod::Contains.apply(&text, Some(&needle)));
            }
            other => return Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "a sequence".to_string() }.into()),
        };

        match (method, arg) {
            (SequenceMethod::Any, None) => Ok(Value::Bool(!items.is_empty())),
            (SequenceMethod::Count, None) => Ok(Value::I32(items.len() as i32)),
            (SequenceMethod::Any, Some(SequenceArg::Predicate(body))) => {
                for item in items {
                    if self.test_element(item, body)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            (SequenceMethod::All, Some(SequenceArg::Predicate(body))) => {
                for item in items {
                    if !self.test_element(item, body)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            (SequenceMethod::Count, Some(SequenceArg::Predicate(body))) => {
                let mut count = 0i32;
                for item in items {
                    if self.test_element(item, body)? {
                        count = count.checked_add(1).ok_or(RangeError::Overflow { operation: "Count" })?;
                    }
                }
                Ok(Value::I32(count))
            }
            (SequenceMethod::Contains, Some(SequenceArg::Value(node))) => {
                let needle = self.eval(node)?;
                for item in &items {
                    if item.loose_eq(&needle)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            (SequenceMethod::Intersect | SequenceMethod::Except, Some(SequenceArg::Value(node))) => {
                let other = match self.eval(node)? {
                    Value::Null => Vec::new(),
                    Value::List(other) => other,
                    other => return Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "a sequence".to_string() }.into()),
                };
                Ok(Value::List(members::intersect(&items, &other, method == SequenceMethod::Intersect)?))
            }
            (method, _) => Err(ParseError::new(format!("Malformed call to sequence method '{}'", method.name())).into()),
        }
    }

    fn test_element(&mut self, element: Value, body: &Node) -> Result<bool, QueryError> {
        self.slots.push(Slot::Owned(element));
        let result = self.eval(body).and_then(truthy);
        self.slots.pop();
        result
    }
}

fn index_into(target: Value, index: Value) -> Result<Value, QueryError> {
    let items = match target {
        Value::Null => return Ok(Value::Null),
        Value::List(items) => items,
        other => return Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "a sequence".to_string() }.into()),
    };
    let i = index.as_i64().ok_or_else(|| TypeConversionError::IncompatibleTypes { from: index.type_name(), to: "int".to_string() })?;
    usize::try_from(i)
        .ok()
        .and_then(|i| items.get(i).cloned())
        .ok_or_else(|| RangeError::IndexOutOfRange { index: i, len: items.len() }.into())
}

fn negate(value: Value) -> Result<Value, QueryError> {
    let overflow = || QueryError::from(RangeError::Overflow { operation: "-" });
    match value {
        Value::Null => Ok(Value::Null),
        Value::I32(i) => i.checked_neg().map(Value::I32).ok_or_else(overflow),
        Value::I64(i) => i.checked_neg().map(Value::I64).ok_or_else(overflow),
        Value::F32(f) => Ok(Value::F32(-f)),
        Value::F64(f) => Ok(Value::F64(-f)),
        other => Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to: "a number".to_string() }.into()),
    }
}

fn numeric_rank(value: &Value) -> Option<u8> {
    match value {
        Value::I32(_) => Some(1),
        Value::I64(_) => Some(2),
        Value::F32(_) => Some(3),
        Value::F64(_) => Some(4),
        _ => None,
    }
}

macro_rules! checked_int {
    ($operator:expr, $a:expr, $b:expr, $variant:ident) => {{
        let (a, b) = ($a, $b);
        if b == 0 && matches!($operator, BinaryOperator::Divide | BinaryOperator::Modulo) {
            return Err(RangeError::DivideByZero.into());
        }
        let result = match $operator {
            BinaryOperator::Add => a.checked_add(b),
            BinaryOperator::Subtract => a.checked_sub(b),
            BinaryOperator::Multiply => a.checked_mul(b),
            BinaryOperator::Divide => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        result.map(Value::$variant).ok_or_else(|| QueryError::from(RangeError::Overflow { operation: $operator.symbol() }))
    }};
}

macro_rules! float_op {
    ($operator:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        match $operator {
            BinaryOperator::Add => a + b,
            BinaryOperator::Subtract => a - b,
            BinaryOperator::Multiply => a * b,
            BinaryOperator::Divide => a / b,
            _ => a % b,
        }
    }};
}

pub(crate) fn arithmetic(operator: BinaryOperator, left: Value, right: Value) -> Result<Value, QueryError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if operator == BinaryOperator::Add && (matches!(left, Value::String(_)) || matches!(right, Value::String(_))) {
        return Ok(Value::String(format!("{left}{right}")));
    }
    let (Some(a), Some(b)) = (numeric_rank(&left), numeric_rank(&right)) else {
        return Err(TypeConversionError::Incomparable { left: left.type_name(), right: right.type_name() }.into());
    };
    let (x, y) = (left.as_f64().unwrap_or_default(), right.as_f64().unwrap_or_default());
    match a.max(b) {
        4 => Ok(Value::F64(float_op!(operator, x, y))),
        3 => Ok(Value::F32(float_op!(operator, x as f32, y as f32))),
        2 => checked_int!(operator, left.as_i64().unwrap_or_default(), right.as_i64().unwrap_or_default(), I64),
        _ => checked_int!(operator, x as i32, y as i32, I32),
    }
}

fn parse_factory(factory: LiteralFactory, text: &str) -> Result<Value, QueryError> {
    let parsed = match factory {
        LiteralFactory::DateTime => literal::parse_date_time(text).map(Value::DateTime),
        LiteralFactory::DateTimeOffset => literal::parse_date_time_offset(text).map(Value::DateTimeOffset),
        LiteralFactory::DateOnly => literal::parse_date(text).map(Value::Date),
        LiteralFactory::TimeOnly => literal::parse_time(text).map(Value::Time),
        LiteralFactory::Guid => literal::parse_guid(text).map(Value::Guid),
    };
    parsed.ok_or_else(|| TypeConversionError::InvalidFormat { value: text.to_string(), target: factory.name().to_string() }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompiledLambda;
    use crate::reflect::Record;
    use crate::types::{ObjectType, Type};
    use sieveql::parse_expression;
    use std::sync::Arc;

    fn person_type() -> Arc<ObjectType> {
        ObjectType::builder("Person")
            .field("Name", Type::String)
            .field("Age", Type::I32)
            .field("Score", Type::nullable(Type::F64))
            .field("Tags", Type::list(Type::String))
            .field("Born", Type::nullable(Type::DateTime))
            .build()
    }

    fn person(name: Option<&str>, age: i32, score: Option<f64>, tags: Option<Vec<&str>>) -> Record {
        Record::new(person_type())
            .with("Name", name)
            .unwrap()
            .with("Age", age)
            .unwrap()
            .with("Score", score)
            .unwrap()
            .with("Tags", tags)
            .unwrap()
    }

    fn eval(text: &str, record: &Record) -> Result<Value, QueryError> {
        let ty = Type::Object(person_type());
        let lambda = CompiledLambda::compile(&parse_expression(text)?, &ty, "it", None)?;
        lambda.evaluate(record)
    }

    #[test]
    fn test_comparisons_and_logic() {
        let ada = person(Some("Ada"), 36, Some(85.5), Some(vec!["math", "code"]));
        assert_eq!(eval("p => p.Name == \"Ada\" && p.Age >= 36", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("Age > 40 || Name.StartsWith(\"A\")", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("!(Score > 50)", &ada).unwrap(), Value::Bool(false));
        assert_eq!(eval("Age > 18 ? \"adult\" : \"minor\"", &ada).unwrap(), Value::from("adult"));
    }

    #[test]
    fn test_null_semantics() {
        let nobody = person(None, 0, None, None);
        assert_eq!(eval("Score > 50", &nobody).unwrap(), Value::Bool(false));
        assert_eq!(eval("Score <= 50", &nobody).unwrap(), Value::Bool(false));
        assert_eq!(eval("Score == null", &nobody).unwrap(), Value::Bool(true));
        assert_eq!(eval("Score + 1", &nobody).unwrap(), Value::Null);
        assert_eq!(eval("Score ?? 1.5", &nobody).unwrap(), Value::F64(1.5));
        assert_eq!(eval("Name.Contains(\"a\")", &nobody).unwrap(), Value::Bool(false));
        assert_eq!(eval("Name.Length", &nobody).unwrap(), Value::Null);
        assert_eq!(eval("Tags.Any()", &nobody).unwrap(), Value::Bool(false));
        assert_eq!(eval("Tags.Count()", &nobody).unwrap(), Value::I32(0));
        assert_eq!(eval("Born.HasValue", &nobody).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_sequences() {
        let ada = person(Some("Ada"), 36, None, Some(vec!["math", "code", "math"]));
        assert_eq!(eval("Tags.Any(t => t == \"code\")", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("Tags.All(t => t.Length == 4)", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("Tags.Count(t => t == \"math\")", &ada).unwrap(), Value::I32(2));
        assert_eq!(eval("Tags.Contains(\"code\")", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("(new [] { \"Ada\", \"Bob\" }).Contains(Name)", &ada).unwrap(), Value::Bool(true));
        assert_eq!(eval("Tags.Intersect(new [] { \"math\", \"art\" })", &ada).unwrap(), Value::from(vec!["math"]));
        assert_eq!(eval("Tags.Except(new [] { \"math\" }).Any()", &ada).unwrap(), Value::Bool(true));
        // outer parameter visible inside the nested lambda
        assert_eq!(eval("p => p.Tags.Any(t => t.Length == p.Name.Length + 1)", &ada).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic() {
        let ada = person(Some("Ada"), 36, Some(1.5), None);
        assert_eq!(eval("Age * 2 + 1", &ada).unwrap(), Value::I32(73));
        assert_eq!(eval("Age / 5", &ada).unwrap(), Value::I32(7));
        assert_eq!(eval("Age % 5L", &ada).unwrap(), Value::I64(1));
        assert_eq!(eval("Score * 2", &ada).unwrap(), Value::F64(3.0));
        assert_eq!(eval("Name + \"!\" + Age", &ada).unwrap(), Value::from("Ada!36"));
        assert_eq!(eval("-Age", &ada).unwrap(), Value::I32(-36));
        assert_eq!(eval("Age / 0", &ada), Err(QueryError::Range(RangeError::DivideByZero)));
        assert_eq!(eval("Age + 2147483647", &ada), Err(QueryError::Range(RangeError::Overflow { operation: "+" })));
    }

    #[test]
    fn test_index_and_parse() {
        let ada = person(Some("Ada"), 36, None, Some(vec!["a", "b"]));
        assert_eq!(eval("Tags[1]", &ada).unwrap(), Value::from("b"));
        assert_eq!(eval("Tags[2]", &ada), Err(QueryError::Range(RangeError::IndexOutOfRange { index: 2, len: 2 })));
        assert_eq!(eval("Guid.Parse(Name)", &ada).unwrap_err().to_string(), "type conversion error: invalid format 'Ada' for type Guid");
    }

    #[test]
    fn test_runtime_parse_matches_folded_literal() {
        let stamped = person(Some("2024-01-02T03:00:00+02:00"), 1, None, None);
        let styled = "DateTime.Parse(Name, CultureInfo.InvariantCulture, DateTimeStyles.AdjustToUniversal)";
        let folded = r#"DateTime.Parse("2024-01-02T03:00:00+02:00", CultureInfo.InvariantCulture, DateTimeStyles.AdjustToUniversal)"#;
        assert_eq!(eval(&format!("{styled} == {folded}"), &stamped).unwrap(), Value::Bool(true));
        assert_eq!(eval("DateTime.Parse(Name) == DateTime.Parse(\"2024-01-02T01:00:00\")", &stamped).unwrap(), Value::Bool(true));
        assert_eq!(eval(&format!("{styled}.Hour"), &stamped).unwrap(), Value::I32(1));
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Value::Bool(true)).unwrap());
        assert!(!truthy(Value::Null).unwrap());
        assert!(truthy(Value::I32(1)).is_err());
    }
}
