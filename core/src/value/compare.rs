use crate::error::TypeConversionError;
use crate::value::Value;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

fn incomparable(left: &Value, right: &Value) -> TypeConversionError {
    TypeConversionError::Incomparable { left: left.type_name(), right: right.type_name() }
}

fn float_key(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

fn same_object(a: &Arc<dyn crate::reflect::Reflect>, b: &Arc<dyn crate::reflect::Reflect>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Fixed ordering between unrelated kinds, used only when sorting mixed sequences
fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::I32(_) | Value::I64(_) | Value::F32(_) | Value::F64(_) | Value::Enum { .. } => 2,
        Value::String(_) => 3,
        Value::Guid(_) => 4,
        Value::DateTime(_) | Value::DateTimeOffset(_) => 5,
        Value::Date(_) => 6,
        Value::Time(_) => 7,
        Value::List(_) => 8,
        Value::Object(_) => 9,
    }
}

impl Value {
    /// Ordering between two values of compatible kinds. Numbers compare after promotion, strings
    /// ordinally, and nulls sort before everything. `Ok(None)` means unordered (a NaN operand).
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>, TypeConversionError> {
        Ok(match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),

            (Value::Enum { ty: a, value: x }, Value::Enum { ty: b, value: y }) => {
                if a.name != b.name {
                    return Err(incomparable(self, other));
                }
                Some(x.cmp(y))
            }
            (Value::F32(_) | Value::F64(_), _) | (_, Value::F32(_) | Value::F64(_)) => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => return Err(incomparable(self, other)),
            },
            (Value::I32(_) | Value::I64(_) | Value::Enum { .. }, Value::I32(_) | Value::I64(_) | Value::Enum { .. }) => {
                match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => Some(a.cmp(&b)),
                    _ => return Err(incomparable(self, other)),
                }
            }

            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
            (Value::Guid(a), Value::Guid(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTimeOffset(b)) => Some(a.cmp(&b.naive_utc())),
            (Value::DateTimeOffset(a), Value::DateTime(b)) => Some(a.naive_utc().cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            _ => return Err(incomparable(self, other)),
        })
    }

    /// Equality as the `==` operator sees it: null equals only null, numbers compare after promotion,
    /// enums equal their underlying integers, and objects compare by identity.
    pub fn loose_eq(&self, other: &Value) -> Result<bool, TypeConversionError> {
        match (self, other) {
            (Value::Null, Value::Null) => Ok(true),
            (Value::Null, _) | (_, Value::Null) => Ok(false),
            (Value::Object(a), Value::Object(b)) => Ok(same_object(a, b)),
            (Value::List(a), Value::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.loose_eq(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(self.compare(other)? == Some(Ordering::Equal)),
        }
    }

    /// Total order for sorting: nulls first, NaN before other numbers, unrelated kinds by a fixed rank.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match self.compare(other) {
            Ok(Some(ordering)) => ordering,
            Ok(None) => {
                let a_nan = self.as_f64().is_some_and(f64::is_nan);
                let b_nan = other.as_f64().is_some_and(f64::is_nan);
                b_nan.cmp(&a_nan)
            }
            Err(_) => kind_rank(self).cmp(&kind_rank(other)),
        }
    }
}

/// Structural equality per variant: no cross-kind promotion, NaN equals NaN, objects by identity.
/// This is the equality `Distinct` uses.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => float_key(*a as f64) == float_key(*b as f64),
            (Value::F64(a), Value::F64(b)) => float_key(*a) == float_key(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Guid(a), Value::Guid(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::DateTimeOffset(a), Value::DateTimeOffset(b)) => a == b && a.offset() == b.offset(),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Enum { ty: a, value: x }, Value::Enum { ty: b, value: y }) => a.name == b.name && x == y,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => same_object(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::I32(i) => i.hash(state),
            Value::I64(i) => i.hash(state),
            Value::F32(f) => float_key(*f as f64).hash(state),
            Value::F64(f) => float_key(*f).hash(state),
            Value::String(s) => s.hash(state),
            Value::Guid(g) => g.hash(state),
            Value::DateTime(d) => d.hash(state),
            Value::DateTimeOffset(d) => {
                d.naive_utc().hash(state);
                d.offset().local_minus_utc().hash(state);
            }
            Value::Date(d) => d.hash(state),
            Value::Time(t) => t.hash(state),
            Value::Enum { ty, value } => {
                ty.name.hash(state);
                value.hash(state);
            }
            Value::List(items) => items.hash(state),
            Value::Object(o) => (Arc::as_ptr(o) as *const () as usize).hash(state),
        }
    }
}
