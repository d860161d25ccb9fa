use crate::error::TypeConversionError;
use crate::types::Type;
use crate::value::Value;
use sieveql::literal;

fn incompatible(value: &Value, target: &Type) -> TypeConversionError {
    TypeConversionError::IncompatibleTypes { from: value.type_name(), to: target.to_string() }
}

fn invalid_format(text: &str, target: &Type) -> TypeConversionError {
    TypeConversionError::InvalidFormat { value: text.to_string(), target: target.to_string() }
}

fn overflow(value: impl ToString, target: &Type) -> TypeConversionError {
    TypeConversionError::NumericOverflow { value: value.to_string(), target: target.to_string() }
}

impl Value {
    /// Convert this value to the specified target type.
    ///
    /// Numeric conversions are range checked, text parses into every scalar type, enums convert from
    /// member names or their underlying numbers, and null converts into any type that admits it.
    pub fn cast_to(&self, target: &Type) -> Result<Value, TypeConversionError> {
        match (self, target) {
            (_, Type::Any) => Ok(self.clone()),
            (Value::Null, target) if target.accepts_null() => Ok(Value::Null),
            (Value::Null, target) => Err(TypeConversionError::IncompatibleTypes { from: "null".to_string(), to: target.to_string() }),
            (_, Type::Nullable(inner)) => self.cast_to(inner),

            // Same kind, no conversion needed
            (Value::Bool(_), Type::Bool)
            | (Value::I32(_), Type::I32)
            | (Value::I64(_), Type::I64)
            | (Value::F32(_), Type::F32)
            | (Value::F64(_), Type::F64)
            | (Value::String(_), Type::String)
            | (Value::Guid(_), Type::Guid)
            | (Value::DateTime(_), Type::DateTime)
            | (Value::DateTimeOffset(_), Type::DateTimeOffset)
            | (Value::Date(_), Type::Date)
            | (Value::Time(_), Type::Time)
            | (Value::Object(_), Type::Object(_)) => Ok(self.clone()),

            // Numeric conversions
            (Value::I32(n), Type::I64) => Ok(Value::I64(*n as i64)),
            (Value::I32(n), Type::F32) => Ok(Value::F32(*n as f32)),
            (Value::I32(n), Type::F64) => Ok(Value::F64(*n as f64)),
            (Value::I64(n), Type::I32) => i32::try_from(*n).map(Value::I32).map_err(|_| overflow(n, target)),
            (Value::I64(n), Type::F32) => Ok(Value::F32(*n as f32)),
            (Value::I64(n), Type::F64) => Ok(Value::F64(*n as f64)),
            (Value::F32(n), Type::F64) => Ok(Value::F64(*n as f64)),
            (Value::F64(n), Type::F32) => {
                if !n.is_finite() || n.abs() <= f32::MAX as f64 {
                    Ok(Value::F32(*n as f32))
                } else {
                    Err(overflow(n, target))
                }
            }
            (Value::F32(_) | Value::F64(_), Type::I32 | Type::I64) => {
                let n = self.as_f64().unwrap_or(f64::NAN);
                let (min, max) = if *target == Type::I32 { (i32::MIN as f64, i32::MAX as f64) } else { (i64::MIN as f64, i64::MAX as f64) };
                if n.is_finite() && n.fract() == 0.0 && n >= min && n <= max {
                    Ok(if *target == Type::I32 { Value::I32(n as i32) } else { Value::I64(n as i64) })
                } else {
                    Err(overflow(n, target))
                }
            }

            // Bool <-> numeric (0 = false, non-zero = true)
            (Value::Bool(b), Type::I32) => Ok(Value::I32(*b as i32)),
            (Value::Bool(b), Type::I64) => Ok(Value::I64(*b as i64)),
            (Value::Bool(b), Type::F32) => Ok(Value::F32(if *b { 1.0 } else { 0.0 })),
            (Value::Bool(b), Type::F64) => Ok(Value::F64(if *b { 1.0 } else { 0.0 })),
            (Value::I32(_) | Value::I64(_) | Value::F32(_) | Value::F64(_), Type::Bool) => {
                Ok(Value::Bool(self.as_f64().is_some_and(|n| n != 0.0)))
            }

            // Enum conversions
            (Value::Enum { ty, value }, Type::Enum(target_ty)) if ty.name == target_ty.name => {
                Ok(Value::Enum { ty: target_ty.clone(), value: *value })
            }
            (Value::I32(_) | Value::I64(_), Type::Enum(ty)) => Ok(Value::Enum { ty: ty.clone(), value: self.as_i64().unwrap_or_default() }),
            (Value::Enum { value, .. }, Type::I32) => i32::try_from(*value).map(Value::I32).map_err(|_| overflow(value, target)),
            (Value::Enum { value, .. }, Type::I64) => Ok(Value::I64(*value)),
            (Value::String(s), Type::Enum(ty)) => {
                let text = s.trim();
                match ty.value_of(text).or_else(|| text.parse::<i64>().ok()) {
                    Some(value) => Ok(Value::Enum { ty: ty.clone(), value }),
                    None => Err(invalid_format(s, target)),
                }
            }

            // Date and time conversions
            (Value::DateTimeOffset(d), Type::DateTime) => Ok(Value::DateTime(d.naive_utc())),
            (Value::DateTime(d), Type::DateTimeOffset) => Ok(Value::DateTimeOffset(d.and_utc().fixed_offset())),
            (Value::DateTime(d), Type::Date) => Ok(Value::Date(d.date())),
            (Value::DateTime(d), Type::Time) => Ok(Value::Time(d.time())),
            (Value::Date(d), Type::DateTime) => d.and_hms_opt(0, 0, 0).map(Value::DateTime).ok_or_else(|| incompatible(self, target)),

            // Text parsing
            (Value::String(s), Type::I32) => s.trim().parse().map(Value::I32).map_err(|_| invalid_format(s, target)),
            (Value::String(s), Type::I64) => s.trim().parse().map(Value::I64).map_err(|_| invalid_format(s, target)),
            (Value::String(s), Type::F32) => s.trim().parse().map(Value::F32).map_err(|_| invalid_format(s, target)),
            (Value::String(s), Type::F64) => s.trim().parse().map(Value::F64).map_err(|_| invalid_format(s, target)),
            (Value::String(s), Type::Bool) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid_format(s, target)),
            },
            (Value::String(s), Type::Guid) => literal::parse_guid(s).map(Value::Guid).ok_or_else(|| invalid_format(s, target)),
            (Value::String(s), Type::DateTime) => literal::parse_date_time(s).map(Value::DateTime).ok_or_else(|| invalid_format(s, target)),
            (Value::String(s), Type::DateTimeOffset) => {
                literal::parse_date_time_offset(s).map(Value::DateTimeOffset).ok_or_else(|| invalid_format(s, target))
            }
            (Value::String(s), Type::Date) => literal::parse_date(s).map(Value::Date).ok_or_else(|| invalid_format(s, target)),
            (Value::String(s), Type::Time) => literal::parse_time(s).map(Value::Time).ok_or_else(|| invalid_format(s, target)),

            // Everything scalar has an invariant text form
            (Value::List(_) | Value::Object(_), Type::String) => Err(incompatible(self, target)),
            (other, Type::String) => Ok(Value::String(other.to_string())),

            (Value::List(items), Type::List(element)) => Ok(Value::List(items.iter().map(|item| item.cast_to(element)).collect::<Result<_, _>>()?)),

            // All other combinations are incompatible
            _ => Err(incompatible(self, target)),
        }
    }

    /// Try to cast this value to the specified target type, returning None if the cast fails
    pub fn try_cast_to(&self, target: &Type) -> Option<Value> { self.cast_to(target).ok() }
}
