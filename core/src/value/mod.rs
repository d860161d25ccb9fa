mod cast;
mod compare;

use crate::reflect::Reflect;
use crate::types::{EnumType, Type};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize};
use sieveql::ast::{Expr, Literal};
use sieveql::literal;
use std::fmt::{self, Display};
use std::sync::Arc;
use uuid::Uuid;

/// A runtime value. `Object` holds a shared, reflectable instance; every other variant is plain data.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Guid(Uuid),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    Enum { ty: Arc<EnumType>, value: i64 },
    List(Vec<Value>),
    Object(Arc<dyn Reflect>),
}

impl Value {
    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integral view of ints, longs and enum members
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(i) => Some(*i as i64),
            Value::I64(i) => Some(*i),
            Value::Enum { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(i) => Some(*i as f64),
            Value::I64(i) => Some(*i as f64),
            Value::F32(f) => Some(*f as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool { matches!(self, Value::I32(_) | Value::I64(_) | Value::F32(_) | Value::F64(_)) }

    /// Best-effort type of this particular value. Lists report the type of their first non-null element.
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::Any,
            Value::Bool(_) => Type::Bool,
            Value::I32(_) => Type::I32,
            Value::I64(_) => Type::I64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::String(_) => Type::String,
            Value::Guid(_) => Type::Guid,
            Value::DateTime(_) => Type::DateTime,
            Value::DateTimeOffset(_) => Type::DateTimeOffset,
            Value::Date(_) => Type::Date,
            Value::Time(_) => Type::Time,
            Value::Enum { ty, .. } => Type::Enum(ty.clone()),
            Value::List(items) => Type::list(items.iter().find(|v| !v.is_null()).map(Value::runtime_type).unwrap_or(Type::Any)),
            Value::Object(object) => object.type_info(),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            other => other.runtime_type().to_string(),
        }
    }

    /// Literal form of a scalar. Lists and objects have none.
    pub fn to_literal(&self) -> Option<Literal> {
        Some(match self {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::I32(i) => Literal::I32(*i),
            Value::I64(i) => Literal::I64(*i),
            Value::F32(f) => Literal::F32(*f),
            Value::F64(f) => Literal::F64(*f),
            Value::String(s) => Literal::String(s.clone()),
            Value::Guid(g) => Literal::Guid(*g),
            Value::DateTime(d) => Literal::DateTime { value: *d, styles: None },
            Value::DateTimeOffset(d) => Literal::DateTimeOffset(*d),
            Value::Date(d) => Literal::Date(*d),
            Value::Time(t) => Literal::Time(*t),
            Value::Enum { ty, value } => Literal::Enum { type_name: ty.name.clone(), value: *value },
            Value::List(_) | Value::Object(_) => return None,
        })
    }

    /// Expression form of a value: a literal, or an array literal for lists of scalars
    pub fn to_expr(&self) -> Option<Expr> {
        match self {
            Value::List(items) => Some(Expr::array(items.iter().map(Value::to_expr).collect::<Option<Vec<_>>>()?)),
            other => other.to_literal().map(Expr::Literal),
        }
    }

    /// Runtime value of a parsed literal. Enum literals lose their type here; the binder re-attaches it.
    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::I32(i) => Value::I32(*i),
            Literal::I64(i) => Value::I64(*i),
            Literal::F32(f) => Value::F32(*f),
            Literal::F64(f) => Value::F64(*f),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Guid(g) => Value::Guid(*g),
            Literal::DateTime { value, .. } => Value::DateTime(*value),
            Literal::DateTimeOffset(d) => Value::DateTimeOffset(*d),
            Literal::Date(d) => Value::Date(*d),
            Literal::Time(t) => Value::Time(*t),
            Literal::Enum { value, .. } => Value::I64(*value),
        }
    }
}

impl Display for Value {
    /// Culture-invariant text, as used by string concatenation and conversion to string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::F32(x) => write!(f, "{}", x),
            Value::F64(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Guid(g) => write!(f, "{}", literal::format_guid(g)),
            Value::DateTime(d) => write!(f, "{}", literal::format_date_time(d)),
            Value::DateTimeOffset(d) => write!(f, "{}", literal::format_date_time_offset(d)),
            Value::Date(d) => write!(f, "{}", literal::format_date(d)),
            Value::Time(t) => write!(f, "{}", literal::format_time(t)),
            Value::Enum { ty, value } => match ty.name_of(*value) {
                Some(name) => write!(f, "{}", name),
                None => write!(f, "{}", value),
            },
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "{}", object.type_info()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({:?})", b),
            Value::I32(i) => write!(f, "I32({:?})", i),
            Value::I64(i) => write!(f, "I64({:?})", i),
            Value::F32(x) => write!(f, "F32({:?})", x),
            Value::F64(x) => write!(f, "F64({:?})", x),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Guid(g) => write!(f, "Guid({})", g),
            Value::DateTime(d) => write!(f, "DateTime({})", d),
            Value::DateTimeOffset(d) => write!(f, "DateTimeOffset({})", d),
            Value::Date(d) => write!(f, "Date({})", d),
            Value::Time(t) => write!(f, "Time({})", t),
            Value::Enum { ty, value } => write!(f, "Enum({}::{})", ty.name, ty.name_of(*value).map(str::to_string).unwrap_or(value.to_string())),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Object(object) => write!(f, "Object({})", object.type_info()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I32(i) => serializer.serialize_i32(*i),
            Value::I64(i) => serializer.serialize_i64(*i),
            Value::F32(x) => serializer.serialize_f32(*x),
            Value::F64(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(object) => match object.type_info() {
                Type::Object(ty) => {
                    let mut map = serializer.serialize_map(Some(ty.fields().len()))?;
                    for field in ty.fields() {
                        map.serialize_entry(&field.name, &object.field(&field.name).unwrap_or(Value::Null))?;
                    }
                    map.end()
                }
                other => serializer.serialize_str(&other.to_string()),
            },
            // dates, guids and enum names serialize as their invariant text
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    /// Untyped: JSON numbers become longs or doubles and everything textual stays a string until
    /// it is cast to a member type.
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        crate::reflect::json_to_value(&json, &Type::Any).map_err(serde::de::Error::custom)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(value: $ty) -> Self { Value::$variant(value) }
        })*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    String => String,
    Uuid => Guid,
    NaiveDateTime => DateTime,
    DateTime<FixedOffset> => DateTimeOffset,
    NaiveDate => Date,
    NaiveTime => Time,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Value::String(value.to_string()) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self { value.map(Into::into).unwrap_or(Value::Null) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self { Value::List(value.into_iter().map(Into::into).collect()) }
}
