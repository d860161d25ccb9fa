//! Terminal operations over projected sequences. Each takes the `Result` items produced by the lazy
//! stages and stops at the first error.

use crate::error::{QueryError, TypeConversionError};
use crate::eval::arithmetic;
use crate::types::Type;
use crate::value::Value;
use indexmap::IndexSet;
use sieveql::ast::BinaryOperator;
use std::cmp::Ordering;

fn numeric(value: Value, operator: &str) -> Result<Value, QueryError> {
    if value.is_numeric() {
        Ok(value)
    } else {
        Err(TypeConversionError::IncompatibleTypes { from: value.type_name(), to: format!("numeric ({operator})") }.into())
    }
}

/// Sum of the non-null values, widened to the widest operand type. An empty sequence sums to `0`.
pub fn sum<I>(values: I) -> Result<Value, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    let mut total = Value::I32(0);
    for value in values {
        let value = value?;
        if value.is_null() {
            continue;
        }
        total = arithmetic(BinaryOperator::Add, total, numeric(value, "Sum")?)?;
    }
    Ok(total)
}

/// Mean of the non-null values as a double, or `Null` when there are none
pub fn average<I>(values: I) -> Result<Value, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    let mut total = 0f64;
    let mut count = 0usize;
    for value in values {
        let value = value?;
        if value.is_null() {
            continue;
        }
        total += numeric(value, "Average")?.as_f64().unwrap_or_default();
        count += 1;
    }
    Ok(if count == 0 { Value::Null } else { Value::F64(total / count as f64) })
}

fn extreme<I>(values: I, keep: Ordering) -> Result<Value, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    let mut best: Option<Value> = None;
    for value in values {
        let value = value?;
        if value.is_null() {
            continue;
        }
        best = match best {
            Some(current) if value.compare(&current)? != Some(keep) => Some(current),
            _ => Some(value),
        };
    }
    Ok(best.unwrap_or(Value::Null))
}

/// Smallest non-null value. Numerics compare after promotion; `Null` for an empty sequence.
pub fn min<I>(values: I) -> Result<Value, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    extreme(values, Ordering::Less)
}

pub fn max<I>(values: I) -> Result<Value, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    extreme(values, Ordering::Greater)
}

pub fn count<T, I>(items: I) -> Result<usize, QueryError>
where I: IntoIterator<Item = Result<T, QueryError>> {
    let mut n = 0;
    for item in items {
        item?;
        n += 1;
    }
    Ok(n)
}

/// Drops repeated values, keeping first occurrences in order. Equality is structural per variant.
pub fn distinct<I>(values: I) -> Result<Vec<Value>, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    let mut seen = IndexSet::new();
    for value in values {
        seen.insert(value?);
    }
    Ok(seen.into_iter().collect())
}

/// Re-types an untyped sequence, failing on the first value that does not convert
pub fn cast<I>(values: I, target: &Type) -> Result<Vec<Value>, QueryError>
where I: IntoIterator<Item = Result<Value, QueryError>> {
    values.into_iter().map(|value| Ok(value?.cast_to(target)?)).collect()
}

pub fn to_list<T, I>(items: I) -> Result<Vec<T>, QueryError>
where I: IntoIterator<Item = Result<T, QueryError>> {
    items.into_iter().collect()
}

/// The first item, or `None` for an empty sequence. Only the first item is pulled.
pub fn first_or_default<T, I>(items: I) -> Result<Option<T>, QueryError>
where I: IntoIterator<Item = Result<T, QueryError>> {
    items.into_iter().next().transpose()
}

pub fn last_or_default<T, I>(items: I) -> Result<Option<T>, QueryError>
where I: IntoIterator<Item = Result<T, QueryError>> {
    let mut last = None;
    for item in items {
        last = Some(item?);
    }
    Ok(last)
}
