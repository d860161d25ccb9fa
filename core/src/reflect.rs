//! The seam between caller data and the engine.
//!
//! Types that want to be queried implement [`Reflect`] (field access by canonical name) and, for the
//! statically-typed API, [`Typed`]. [`Record`] is a ready-made runtime object for data whose shape is
//! only known at runtime, such as JSON.

use crate::error::{PropertyResolutionError, QueryError, TypeConversionError};
use crate::types::{ObjectType, Type};
use crate::value::Value;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use uuid::Uuid;

pub trait Reflect: Send + Sync {
    /// The runtime type of this instance, normally `Type::Object`
    fn type_info(&self) -> Type;

    /// Value of a field by its canonical name. `None` for unknown fields.
    fn field(&self, name: &str) -> Option<Value>;

    /// An owned value for this instance, used when an expression yields the instance itself
    fn to_value(&self) -> Value;
}

/// Types with a type descriptor known ahead of time
pub trait Typed: Reflect {
    fn static_type() -> Type;
}

impl<T: Reflect + ?Sized> Reflect for &T {
    fn type_info(&self) -> Type { (**self).type_info() }
    fn field(&self, name: &str) -> Option<Value> { (**self).field(name) }
    fn to_value(&self) -> Value { (**self).to_value() }
}

impl<T: Typed> Typed for &T {
    fn static_type() -> Type { T::static_type() }
}

impl<T: Reflect + ?Sized> Reflect for Arc<T> {
    fn type_info(&self) -> Type { (**self).type_info() }
    fn field(&self, name: &str) -> Option<Value> { (**self).field(name) }
    fn to_value(&self) -> Value { (**self).to_value() }
}

impl<T: Typed> Typed for Arc<T> {
    fn static_type() -> Type { T::static_type() }
}

impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn type_info(&self) -> Type { (**self).type_info() }
    fn field(&self, name: &str) -> Option<Value> { (**self).field(name) }
    fn to_value(&self) -> Value { (**self).to_value() }
}

/// A runtime object: an object type plus one value per field.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<ObjectType>,
    values: Vec<Value>,
}

impl Record {
    /// A record with every field null
    pub fn new(ty: Arc<ObjectType>) -> Self {
        let values = vec![Value::Null; ty.fields().len()];
        Self { ty, values }
    }

    pub fn object_type(&self) -> &Arc<ObjectType> { &self.ty }

    pub fn get(&self, name: &str) -> Option<&Value> { self.ty.field_index(name).and_then(|i| self.values.get(i)) }

    /// Set a field, converting the value to the field's declared type
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), QueryError> {
        let field = self.ty.resolve_field(name).ok_or_else(|| PropertyResolutionError::NotFound {
            path: name.to_string(),
            segment: name.to_string(),
            type_name: self.ty.name.clone(),
        })?;
        let converted = value.into().cast_to(&field.ty)?;
        let index = self.ty.field_index(&field.name).unwrap_or_default();
        self.values[index] = converted;
        Ok(())
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, QueryError> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Build a record from a JSON object. Missing members stay null; unknown members are ignored.
    pub fn from_json(ty: &Arc<ObjectType>, json: &serde_json::Value) -> Result<Self, TypeConversionError> {
        let serde_json::Value::Object(members) = json else {
            return Err(TypeConversionError::IncompatibleTypes { from: json_kind(json).to_string(), to: ty.name.clone() });
        };
        let mut record = Record::new(ty.clone());
        for (i, field) in ty.fields().iter().enumerate() {
            if let Some(member) = members.get(&field.name) {
                record.values[i] = json_to_value(member, &field.ty)?;
            }
        }
        Ok(record)
    }

    /// Build a record from a JSON object, inferring the object type from the members present
    pub fn infer(name: &str, members: &serde_json::Map<String, serde_json::Value>) -> Result<Self, TypeConversionError> {
        let mut builder = ObjectType::builder(name);
        let mut values = Vec::with_capacity(members.len());
        for (key, member) in members {
            let value = json_to_value(member, &Type::Any)?;
            builder = builder.field(key, if value.is_null() { Type::Any } else { value.runtime_type() });
            values.push(value);
        }
        Ok(Record { ty: builder.build(), values })
    }
}

impl Reflect for Record {
    fn type_info(&self) -> Type { Type::Object(self.ty.clone()) }

    fn field(&self, name: &str) -> Option<Value> { self.get(name).cloned() }

    fn to_value(&self) -> Value { Value::Object(Arc::new(self.clone())) }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Convert JSON into a value of the given type. With `Type::Any` numbers become longs (or doubles),
/// arrays become lists and objects become records with an inferred type.
pub fn json_to_value(json: &serde_json::Value, ty: &Type) -> Result<Value, TypeConversionError> {
    let untyped = match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::I64(i),
            None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            let element = ty.element_type().cloned().unwrap_or(Type::Any);
            return Ok(Value::List(items.iter().map(|item| json_to_value(item, &element)).collect::<Result<_, _>>()?));
        }
        serde_json::Value::Object(members) => {
            return match ty.underlying() {
                Type::Object(object_ty) => Ok(Record::from_json(object_ty, json)?.to_value()),
                Type::Any => Ok(Record::infer("object", members)?.to_value()),
                other => Err(TypeConversionError::IncompatibleTypes { from: "object".to_string(), to: other.to_string() }),
            };
        }
    };
    untyped.cast_to(ty)
}

/// Extraction of a concrete Rust value from a runtime value, used by typed accessors.
pub trait FromValue: Sized {
    fn value_type() -> Type;
    fn from_value(value: Value) -> Result<Self, TypeConversionError>;
}

fn unexpected<T: FromValue>(value: &Value) -> TypeConversionError {
    TypeConversionError::IncompatibleTypes { from: value.type_name(), to: T::value_type().to_string() }
}

macro_rules! from_value {
    ($($ty:ty => $variant:ident as $type:ident),* $(,)?) => {
        $(impl FromValue for $ty {
            fn value_type() -> Type { Type::$type }
            fn from_value(value: Value) -> Result<Self, TypeConversionError> {
                match value.cast_to(&Type::$type)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(unexpected::<Self>(&other)),
                }
            }
        })*
    };
}

from_value! {
    bool => Bool as Bool,
    i32 => I32 as I32,
    i64 => I64 as I64,
    f32 => F32 as F32,
    f64 => F64 as F64,
    String => String as String,
    Uuid => Guid as Guid,
    NaiveDateTime => DateTime as DateTime,
    DateTime<FixedOffset> => DateTimeOffset as DateTimeOffset,
    NaiveDate => Date as Date,
    NaiveTime => Time as Time,
}

impl FromValue for Value {
    fn value_type() -> Type { Type::Any }
    fn from_value(value: Value) -> Result<Self, TypeConversionError> { Ok(value) }
}

impl<T: FromValue> FromValue for Option<T> {
    fn value_type() -> Type { Type::nullable(T::value_type()) }
    fn from_value(value: Value) -> Result<Self, TypeConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn value_type() -> Type { Type::list(T::value_type()) }
    fn from_value(value: Value) -> Result<Self, TypeConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(unexpected::<Self>(&other)),
        }
    }
}
