//! Static type descriptors.
//!
//! `Type` stands in for runtime reflection: object types carry an ordered field table which the binder and
//! the property-path resolver consult once per (text, type) pair, after which compiled artifacts only hold
//! canonical field names.

use std::fmt::{self, Display};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Dynamically typed; checks are deferred to evaluation
    Any,
    Bool,
    I32,
    I64,
    F32,
    F64,
    String,
    Guid,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
    Enum(Arc<EnumType>),
    Nullable(Box<Type>),
    List(Box<Type>),
    Object(Arc<ObjectType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumType {
    pub fn new<N: Into<String>>(name: impl Into<String>, members: impl IntoIterator<Item = (N, i64)>) -> Self {
        Self { name: name.into(), members: members.into_iter().map(|(n, v)| (n.into(), v)).collect() }
    }

    /// Member value by name, exact match first then case-insensitive
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.members.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> { self.members.iter().find(|(_, v)| *v == value).map(|(n, _)| n.as_str()) }

    /// The unqualified name, `Status` for `MyApp.Status`
    pub fn short_name(&self) -> &str { self.name.rsplit('.').next().unwrap_or(&self.name) }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectType {
    pub name: String,
    fields: Vec<Field>,
}

impl ObjectType {
    pub fn builder(name: impl Into<String>) -> ObjectTypeBuilder { ObjectTypeBuilder { name: name.into(), fields: Vec::new() } }

    pub fn fields(&self) -> &[Field] { &self.fields }

    pub fn field(&self, name: &str) -> Option<&Field> { self.fields.iter().find(|f| f.name == name) }

    pub fn field_index(&self, name: &str) -> Option<usize> { self.fields.iter().position(|f| f.name == name) }

    /// Exact-case lookup, then a single case-insensitive fallback. An ambiguous fallback
    /// (two fields differing only by case) resolves to nothing.
    pub fn resolve_field(&self, name: &str) -> Option<&Field> {
        if let Some(field) = self.field(name) {
            return Some(field);
        }
        let mut matches = self.fields.iter().filter(|f| f.name.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some(field), None) => Some(field),
            _ => None,
        }
    }
}

pub struct ObjectTypeBuilder {
    name: String,
    fields: Vec<Field>,
}

impl ObjectTypeBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        // last definition wins, keeping the original position
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(existing) => existing.ty = ty,
            None => self.fields.push(Field { name, ty }),
        }
        self
    }

    pub fn build(self) -> Arc<ObjectType> { Arc::new(ObjectType { name: self.name, fields: self.fields }) }

    pub fn into_type(self) -> Type { Type::Object(self.build()) }
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        match inner {
            Type::Nullable(_) => inner,
            other => Type::Nullable(Box::new(other)),
        }
    }

    pub fn list(element: Type) -> Type { Type::List(Box::new(element)) }

    pub fn enumeration(ty: EnumType) -> Type { Type::Enum(Arc::new(ty)) }

    /// The type with any `Nullable` wrapper removed
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Whether a null can be stored in a slot of this type
    pub fn accepts_null(&self) -> bool {
        matches!(self, Type::Any | Type::Nullable(_) | Type::String | Type::List(_) | Type::Object(_))
    }

    pub fn is_numeric(&self) -> bool { matches!(self.underlying(), Type::I32 | Type::I64 | Type::F32 | Type::F64) }

    pub fn is_integer(&self) -> bool { matches!(self.underlying(), Type::I32 | Type::I64) }

    pub fn is_string(&self) -> bool { matches!(self.underlying(), Type::String) }

    pub fn is_bool(&self) -> bool { matches!(self.underlying(), Type::Bool) }

    /// Whether `<`, `>` and friends are defined between two values of this type
    pub fn is_orderable(&self) -> bool {
        matches!(
            self.underlying(),
            Type::Any
                | Type::I32
                | Type::I64
                | Type::F32
                | Type::F64
                | Type::String
                | Type::Guid
                | Type::DateTime
                | Type::DateTimeOffset
                | Type::Date
                | Type::Time
                | Type::Enum(_)
        )
    }

    /// Arrays and generic sequences are enumerable; strings and scalars are not.
    pub fn is_enumerable(&self) -> bool { matches!(self.underlying(), Type::List(_)) }

    pub fn element_type(&self) -> Option<&Type> {
        match self.underlying() {
            Type::List(element) => Some(element),
            _ => None,
        }
    }

    /// Position in the numeric promotion ladder (int < long < float < double)
    pub(crate) fn numeric_rank(&self) -> Option<u8> {
        match self.underlying() {
            Type::I32 => Some(1),
            Type::I64 => Some(2),
            Type::F32 => Some(3),
            Type::F64 => Some(4),
            _ => None,
        }
    }

    /// The wider of two numeric types, nullable when either side is
    pub(crate) fn promote(a: &Type, b: &Type) -> Option<Type> {
        let (ra, rb) = (a.numeric_rank()?, b.numeric_rank()?);
        let wider = if ra >= rb { a.underlying().clone() } else { b.underlying().clone() };
        Some(if matches!(a, Type::Nullable(_)) || matches!(b, Type::Nullable(_)) { Type::nullable(wider) } else { wider })
    }

    /// Resolve a builtin type keyword or framework name (`int`, `Int32`, `System.DateTime`, ...)
    pub fn from_builtin_name(name: &str) -> Option<Type> {
        Some(match name.strip_prefix("System.").unwrap_or(name) {
            "int" | "Int32" => Type::I32,
            "long" | "Int64" => Type::I64,
            "float" | "Single" => Type::F32,
            "double" | "Double" | "decimal" | "Decimal" => Type::F64,
            "bool" | "Boolean" => Type::Bool,
            "string" | "String" => Type::String,
            "object" | "Object" => Type::Any,
            "Guid" => Type::Guid,
            "DateTime" => Type::DateTime,
            "DateTimeOffset" => Type::DateTimeOffset,
            "DateOnly" => Type::Date,
            "TimeOnly" => Type::Time,
            _ => return None,
        })
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "object"),
            Type::Bool => write!(f, "bool"),
            Type::I32 => write!(f, "int"),
            Type::I64 => write!(f, "long"),
            Type::F32 => write!(f, "float"),
            Type::F64 => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Guid => write!(f, "Guid"),
            Type::DateTime => write!(f, "DateTime"),
            Type::DateTimeOffset => write!(f, "DateTimeOffset"),
            Type::Date => write!(f, "DateOnly"),
            Type::Time => write!(f, "TimeOnly"),
            Type::Enum(e) => write!(f, "{}", e.name),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::List(element) => write!(f, "{}[]", element),
            Type::Object(o) => write!(f, "{}", o.name),
        }
    }
}
