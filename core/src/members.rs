//! Members and methods that builtin types expose without reflection: `string.Length`, `list.Count`,
//! `DateTime.Year`, `string.Contains(..)`, `list.Any(..)` and so on.

use crate::error::{QueryError, TypeConversionError};
use crate::types::Type;
use crate::value::Value;
use chrono::{Datelike, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinMember {
    Length,
    Count,
    HasValue,
    Value,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Date,
    DateTime,
    UtcDateTime,
}

impl BuiltinMember {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Length => "Length",
            Self::Count => "Count",
            Self::HasValue => "HasValue",
            Self::Value => "Value",
            Self::Year => "Year",
            Self::Month => "Month",
            Self::Day => "Day",
            Self::Hour => "Hour",
            Self::Minute => "Minute",
            Self::Second => "Second",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::UtcDateTime => "UtcDateTime",
        }
    }

    fn candidates(ty: &Type) -> &'static [BuiltinMember] {
        use BuiltinMember::*;
        match ty {
            Type::Nullable(_) => &[HasValue, Value],
            Type::String => &[Length],
            Type::List(_) => &[Count, Length],
            Type::DateTime => &[Year, Month, Day, Hour, Minute, Second, Date],
            Type::DateTimeOffset => &[Year, Month, Day, Hour, Minute, Second, DateTime, UtcDateTime],
            Type::Date => &[Year, Month, Day],
            Type::Time => &[Hour, Minute, Second],
            _ => &[],
        }
    }

    /// Resolve a member of a builtin type, exact case first. Returns the member and its result type.
    pub fn resolve(ty: &Type, name: &str) -> Option<(BuiltinMember, Type)> {
        let candidates = Self::candidates(ty);
        let member = candidates
            .iter()
            .find(|m| m.name() == name)
            .or_else(|| candidates.iter().find(|m| m.name().eq_ignore_ascii_case(name)))
            .copied()?;
        let result = match (member, ty) {
            (Self::HasValue, _) => Type::Bool,
            (Self::Value, Type::Nullable(inner)) => (**inner).clone(),
            (Self::Date, _) | (Self::DateTime, _) | (Self::UtcDateTime, _) => Type::DateTime,
            _ => Type::I32,
        };
        Some((member, result))
    }

    /// Read the member from a value. Null receivers yield null, except `HasValue`.
    pub fn read(&self, target: &Value) -> Result<Value, QueryError> {
        use chrono::NaiveDateTime;
        let parts = |d: &NaiveDateTime| -> Value {
            match self {
                Self::Year => Value::I32(d.year()),
                Self::Month => Value::I32(d.month() as i32),
                Self::Day => Value::I32(d.day() as i32),
                Self::Hour => Value::I32(d.hour() as i32),
                Self::Minute => Value::I32(d.minute() as i32),
                Self::Second => Value::I32(d.second() as i32),
                _ => Value::DateTime(d.date().and_time(chrono::NaiveTime::default())),
            }
        };
        Ok(match (self, target) {
            (Self::HasValue, v) => Value::Bool(!v.is_null()),
            (_, Value::Null) => Value::Null,
            (Self::Value, v) => v.clone(),
            (Self::Length, Value::String(s)) => Value::I32(s.chars().count() as i32),
            (Self::Count | Self::Length, Value::List(items)) => Value::I32(items.len() as i32),
            (Self::DateTime, Value::DateTimeOffset(d)) => Value::DateTime(d.naive_local()),
            (Self::UtcDateTime, Value::DateTimeOffset(d)) => Value::DateTime(d.naive_utc()),
            (_, Value::DateTime(d)) => parts(d),
            (_, Value::DateTimeOffset(d)) => parts(&d.naive_local()),
            (Self::Year, Value::Date(d)) => Value::I32(d.year()),
            (Self::Month, Value::Date(d)) => Value::I32(d.month() as i32),
            (Self::Day, Value::Date(d)) => Value::I32(d.day() as i32),
            (Self::Hour, Value::Time(t)) => Value::I32(t.hour() as i32),
            (Self::Minute, Value::Time(t)) => Value::I32(t.minute() as i32),
            (Self::Second, Value::Time(t)) => Value::I32(t.second() as i32),
            (member, other) => {
                let to = format!("a type with member {}", member.name());
                return Err(TypeConversionError::IncompatibleTypes { from: other.type_name(), to }.into());
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringMethod {
    Contains,
    StartsWith,
    EndsWith,
    ToLower,
    ToUpper,
    Trim,
}

impl StringMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contains => "Contains",
            Self::StartsWith => "StartsWith",
            Self::EndsWith => "EndsWith",
            Self::ToLower => "ToLower",
            Self::ToUpper => "ToUpper",
            Self::Trim => "Trim",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Contains" => Self::Contains,
            "StartsWith" => Self::StartsWith,
            "EndsWith" => Self::EndsWith,
            "ToLower" | "ToLowerInvariant" => Self::ToLower,
            "ToUpper" | "ToUpperInvariant" => Self::ToUpper,
            "Trim" => Self::Trim,
            _ => return None,
        })
    }

    /// Number of string arguments the method takes
    pub fn arity(&self) -> usize {
        match self {
            Self::Contains | Self::StartsWith | Self::EndsWith => 1,
            Self::ToLower | Self::ToUpper | Self::Trim => 0,
        }
    }

    pub fn result_type(&self) -> Type {
        match self {
            Self::Contains | Self::StartsWith | Self::EndsWith => Type::Bool,
            Self::ToLower | Self::ToUpper | Self::Trim => Type::String,
        }
    }

    /// Null receivers make predicates false and transformations null
    pub fn apply(&self, target: &Value, arg: Option<&Value>) -> Value {
        let (Value::String(s), arg) = (target, arg) else {
            return match self.result_type() {
                Type::Bool => Value::Bool(false),
                _ => Value::Null,
            };
        };
        match (self, arg) {
            (Self::ToLower, _) => Value::String(s.to_lowercase()),
            (Self::ToUpper, _) => Value::String(s.to_uppercase()),
            (Self::Trim, _) => Value::String(s.trim().to_string()),
            (Self::Contains, Some(Value::String(needle))) => Value::Bool(s.contains(needle.as_str())),
            (Self::StartsWith, Some(Value::String(prefix))) => Value::Bool(s.starts_with(prefix.as_str())),
            (Self::EndsWith, Some(Value::String(suffix))) => Value::Bool(s.ends_with(suffix.as_str())),
            _ => Value::Bool(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceMethod {
    Any,
    All,
    Count,
    Contains,
    Intersect,
    Except,
}

impl SequenceMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "Any",
            Self::All => "All",
            Self::Count => "Count",
            Self::Contains => "Contains",
            Self::Intersect => "Intersect",
            Self::Except => "Except",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Any" => Self::Any,
            "All" => Self::All,
            "Count" => Self::Count,
            "Contains" => Self::Contains,
            "Intersect" => Self::Intersect,
            "Except" => Self::Except,
            _ => return None,
        })
    }

    /// Whether the (single) argument is a lambda over the element type
    pub fn takes_predicate(&self) -> bool { matches!(self, Self::Any | Self::All | Self::Count) }
}

/// Set operations keep the first occurrence of each element, in receiver order
pub(crate) fn intersect(left: &[Value], right: &[Value], keep: bool) -> Result<Vec<Value>, TypeConversionError> {
    let mut result: Vec<Value> = Vec::new();
    for item in left {
        let mut found = false;
        for other in right {
            if item.loose_eq(other)? {
                found = true;
                break;
            }
        }
        if found != keep {
            continue;
        }
        let mut duplicate = false;
        for existing in &result {
            if existing.loose_eq(item)? {
                duplicate = true;
                break;
            }
        }
        if !duplicate {
            result.push(item.clone());
        }
    }
    Ok(result)
}
