//! Translation of filter descriptors into a predicate expression, and the lazy stream that applies it.
//!
//! Descriptors become an ordinary `it => ...` expression first, so a filter built from a grid can be
//! serialized, logged or sent elsewhere exactly like one typed by hand.

use super::descriptor::{FilterCaseSensitivity, FilterDescriptor, FilterOperator, LogicalFilterOperator};
use crate::compiler::CompiledLambda;
use crate::error::{QueryError, TypeConversionError};
use crate::path::PropertyPath;
use crate::reflect::Reflect;
use crate::types::Type;
use crate::value::Value;
use sieveql::ast::{BinaryOperator, Expr, Literal};
use std::sync::Arc;
use tracing::trace;

fn logical(operator: LogicalFilterOperator) -> BinaryOperator {
    match operator {
        LogicalFilterOperator::And => BinaryOperator::And,
        LogicalFilterOperator::Or => BinaryOperator::Or,
    }
}

/// Builds the predicate expression for a list of descriptors over a source type
pub struct FilterBuilder<'a> {
    source: &'a Type,
    parameter: &'a str,
    case_sensitivity: FilterCaseSensitivity,
}

impl<'a> FilterBuilder<'a> {
    pub fn new(source: &'a Type, parameter: &'a str, case_sensitivity: FilterCaseSensitivity) -> Self {
        Self { source, parameter, case_sensitivity }
    }

    /// `None` when there is nothing to filter on
    pub fn build(&self, filters: &[FilterDescriptor], combinator: LogicalFilterOperator) -> Result<Option<Expr>, QueryError> {
        let conditions = filters.iter().map(|f| self.descriptor(f)).collect::<Result<Vec<_>, _>>()?;
        let Some(body) = Expr::fold(logical(combinator), conditions) else { return Ok(None) };
        let lambda = Expr::lambda(self.parameter, body);
        trace!("filter plan: {}", sieveql::serialize(&lambda));
        Ok(Some(lambda))
    }

    fn descriptor(&self, descriptor: &FilterDescriptor) -> Result<Expr, QueryError> {
        let accessor = PropertyPath::parse(&descriptor.property)?.resolve(self.source)?;
        let member = Member { expr: accessor.to_expr(Expr::parameter(self.parameter)), ty: accessor.result_type(), property: &descriptor.property };

        let primary = self.condition(&member, descriptor.filter_operator, descriptor.filter_value.as_ref())?;
        match descriptor.second_filter_operator {
            Some(operator) => {
                let secondary = self.condition(&member, operator, descriptor.second_filter_value.as_ref())?;
                Ok(Expr::binary(logical(descriptor.logical_filter_operator), primary, secondary))
            }
            None => Ok(primary),
        }
    }

    fn fold_case(&self, member: &Member) -> bool {
        self.case_sensitivity == FilterCaseSensitivity::CaseInsensitive && member.element_type().is_string()
    }

    /// `member.Any(x => test(x.ToLower()))`: a set test over the lowercased elements of a string collection
    fn any_folded(&self, member: &Member, test: impl FnOnce(Expr) -> Expr) -> Expr {
        let element = if self.parameter == "x" { "y" } else { "x" };
        let folded = Expr::call(Expr::parameter(element), "ToLower", vec![]);
        Expr::call(member.expr.clone(), "Any", vec![Expr::lambda(element, test(folded))])
    }

    fn condition(&self, member: &Member, operator: FilterOperator, value: Option<&Value>) -> Result<Expr, QueryError> {
        let fold = self.fold_case(member);
        let target = || if fold { Expr::call(member.expr.clone(), "ToLower", vec![]) } else { member.expr.clone() };
        let required = || value.filter(|v| !v.is_null()).ok_or_else(|| TypeConversionError::MissingValue { operator: operator.to_string() });
        let unsupported = || member.unsupported(operator);

        let expr = match operator {
            FilterOperator::Equals | FilterOperator::NotEquals => {
                let binary = if operator == FilterOperator::Equals { BinaryOperator::Equal } else { BinaryOperator::NotEqual };
                match value.filter(|v| !v.is_null()) {
                    None => Expr::binary(binary, member.expr.clone(), Expr::Literal(Literal::Null)),
                    Some(value) => Expr::binary(binary, target(), member.literal(value, member.ty, fold)?),
                }
            }
            FilterOperator::LessThan | FilterOperator::LessThanOrEquals | FilterOperator::GreaterThan | FilterOperator::GreaterThanOrEquals => {
                if !member.ty.is_orderable() {
                    return Err(unsupported().into());
                }
                let binary = match operator {
                    FilterOperator::LessThan => BinaryOperator::LessThan,
                    FilterOperator::LessThanOrEquals => BinaryOperator::LessThanOrEqual,
                    FilterOperator::GreaterThan => BinaryOperator::GreaterThan,
                    _ => BinaryOperator::GreaterThanOrEqual,
                };
                Expr::binary(binary, target(), member.literal(required()?, member.ty, fold)?)
            }
            FilterOperator::StartsWith | FilterOperator::EndsWith => {
                if !member.ty.is_string() {
                    return Err(unsupported().into());
                }
                let method = if operator == FilterOperator::StartsWith { "StartsWith" } else { "EndsWith" };
                Expr::call(target(), method, vec![member.literal(required()?, &Type::String, fold)?])
            }
            FilterOperator::Contains | FilterOperator::DoesNotContain => {
                let value = required()?;
                let contains = if member.ty.is_string() {
                    Expr::call(target(), "Contains", vec![member.literal(value, &Type::String, fold)?])
                } else if let Some(element) = member.ty.element_type() {
                    match value {
                        Value::List(_) => {
                            let values = member.literal(value, &Type::list(element.clone()), fold)?;
                            if fold {
                                self.any_folded(member, |item| Expr::call(values, "Contains", vec![item]))
                            } else {
                                Expr::call(Expr::call(member.expr.clone(), "Intersect", vec![values]), "Any", vec![])
                            }
                        }
                        scalar => {
                            let needle = member.literal(scalar, element, fold)?;
                            if fold {
                                self.any_folded(member, |item| Expr::binary(BinaryOperator::Equal, item, needle))
                            } else {
                                Expr::call(member.expr.clone(), "Contains", vec![needle])
                            }
                        }
                    }
                } else {
                    return Err(unsupported().into());
                };
                if operator == FilterOperator::Contains {
                    contains
                } else {
                    Expr::not(contains)
                }
            }
            FilterOperator::IsNull => Expr::binary(BinaryOperator::Equal, member.expr.clone(), Expr::Literal(Literal::Null)),
            FilterOperator::IsNotNull => Expr::binary(BinaryOperator::NotEqual, member.expr.clone(), Expr::Literal(Literal::Null)),
            // a null string is neither empty nor non-empty
            FilterOperator::IsEmpty if member.ty.is_string() => {
                Expr::binary(BinaryOperator::Equal, member.expr.clone(), Expr::literal(""))
            }
            FilterOperator::IsNotEmpty if member.ty.is_string() => Expr::binary(
                BinaryOperator::And,
                Expr::binary(BinaryOperator::NotEqual, member.expr.clone(), Expr::Literal(Literal::Null)),
                Expr::binary(BinaryOperator::NotEqual, member.expr.clone(), Expr::literal("")),
            ),
            FilterOperator::IsEmpty if member.ty.is_enumerable() => Expr::binary(
                BinaryOperator::And,
                Expr::binary(BinaryOperator::NotEqual, member.expr.clone(), Expr::Literal(Literal::Null)),
                Expr::not(Expr::call(member.expr.clone(), "Any", vec![])),
            ),
            FilterOperator::IsNotEmpty if member.ty.is_enumerable() => Expr::call(member.expr.clone(), "Any", vec![]),
            FilterOperator::IsEmpty | FilterOperator::IsNotEmpty => return Err(unsupported().into()),
            FilterOperator::In | FilterOperator::NotIn => {
                let values = match required()? {
                    Value::List(items) => Value::List(items.clone()),
                    scalar => Value::List(vec![scalar.clone()]),
                };
                let element = member.element_type();
                let array = member.literal(&values, &Type::list(element.clone()), fold)?;
                match (member.ty.is_enumerable(), operator) {
                    (false, FilterOperator::In) => Expr::call(array, "Contains", vec![target()]),
                    (false, _) => Expr::not(Expr::call(array, "Contains", vec![target()])),
                    (true, FilterOperator::In) if fold => self.any_folded(member, |item| Expr::call(array, "Contains", vec![item])),
                    (true, _) if fold => self.any_folded(member, |item| Expr::not(Expr::call(array, "Contains", vec![item]))),
                    (true, FilterOperator::In) => {
                        Expr::call(Expr::call(array, "Intersect", vec![member.expr.clone()]), "Any", vec![])
                    }
                    (true, _) => Expr::call(Expr::call(member.expr.clone(), "Except", vec![array]), "Any", vec![]),
                }
            }
        };
        Ok(expr)
    }
}

struct Member<'a> {
    expr: Expr,
    ty: &'a Type,
    property: &'a str,
}

impl Member<'_> {
    /// Element type for collection members, the member type otherwise
    fn element_type(&self) -> &Type { self.ty.element_type().unwrap_or(self.ty) }

    fn unsupported(&self, operator: FilterOperator) -> TypeConversionError {
        TypeConversionError::UnsupportedOperator {
            operator: operator.to_string(),
            property: self.property.to_string(),
            type_name: self.ty.to_string(),
        }
    }

    /// The filter value converted to `ty` and rendered as a literal (or array literal)
    fn literal(&self, value: &Value, ty: &Type, fold: bool) -> Result<Expr, QueryError> {
        let converted = value.cast_to(ty)?;
        // expression text has no spelling for NaN or infinity
        if let Some(bad) = non_finite(&converted) {
            return Err(TypeConversionError::InvalidFormat { value: bad.to_string(), target: ty.to_string() }.into());
        }
        let converted = if fold { lowercase(converted) } else { converted };
        converted
            .to_expr()
            .ok_or_else(|| TypeConversionError::IncompatibleTypes { from: value.type_name(), to: ty.to_string() }.into())
    }
}

fn non_finite(value: &Value) -> Option<&Value> {
    match value {
        Value::F32(f) if !f.is_finite() => Some(value),
        Value::F64(f) if !f.is_finite() => Some(value),
        Value::List(items) => items.iter().find_map(non_finite),
        _ => None,
    }
}

fn lowercase(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::List(items) => Value::List(items.into_iter().map(lowercase).collect()),
        other => other,
    }
}

/// Yields the items matching a compiled predicate. The first evaluation error is yielded and ends the stream.
pub struct FilteredStream<I> {
    inner: I,
    predicate: Option<Arc<CompiledLambda>>,
    failed: bool,
}

impl<I> FilteredStream<I> {
    pub fn new(inner: I, predicate: Option<Arc<CompiledLambda>>) -> Self { Self { inner, predicate, failed: false } }
}

impl<I> Iterator for FilteredStream<I>
where
    I: Iterator,
    I::Item: Reflect,
{
    type Item = Result<I::Item, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let item = self.inner.next()?;
            let Some(predicate) = &self.predicate else { return Some(Ok(item)) };
            match predicate.test(&item) {
                Ok(true) => return Some(Ok(item)),
                Ok(false) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
