//! Property paths such as `Name`, `Address.City`, `Values[1]` or `Obj.Values[2]`.
//!
//! A path is resolved once against a [`Type`] into an [`Accessor`] that only holds canonical field names and
//! indices. Unknown segments fail at resolution; an out-of-range index only fails when the accessor runs.

use crate::error::{PropertyResolutionError, QueryError, RangeError};
use crate::members::BuiltinMember;
use crate::reflect::{FromValue, Reflect};
use crate::types::Type;
use crate::value::Value;
use sieveql::ast::{Expr, Literal};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Member(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    text: String,
    segments: Vec<Segment>,
}

impl PropertyPath {
    pub fn parse(text: &str) -> Result<Self, PropertyResolutionError> {
        let malformed = |reason| PropertyResolutionError::Malformed { path: text.to_string(), reason };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty path"));
        }

        let mut segments = Vec::new();
        let mut chars = trimmed.chars().peekable();
        // whether the next token must be a member name (start of path or after '.')
        let mut expect_member = true;
        while let Some(&c) = chars.peek() {
            match c {
                '[' => {
                    if expect_member && !segments.is_empty() {
                        return Err(malformed("empty member name"));
                    }
                    chars.next();
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if d == ']' {
                            break;
                        }
                        digits.push(d);
                        chars.next();
                    }
                    if chars.next() != Some(']') {
                        return Err(malformed("unterminated index"));
                    }
                    let index = digits.trim().parse::<usize>().map_err(|_| malformed("index must be a non-negative integer"))?;
                    segments.push(Segment::Index(index));
                    expect_member = false;
                }
                '.' => {
                    if expect_member {
                        return Err(malformed("empty member name"));
                    }
                    chars.next();
                    expect_member = true;
                }
                c if c.is_alphanumeric() || c == '_' => {
                    if !expect_member {
                        return Err(malformed("expected '.' or '[' between members"));
                    }
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !(n.is_alphanumeric() || n == '_') {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if name.starts_with(|c: char| c.is_ascii_digit()) {
                        return Err(malformed("member names cannot start with a digit"));
                    }
                    segments.push(Segment::Member(name));
                    expect_member = false;
                }
                _ => return Err(malformed("unexpected character")),
            }
        }
        if expect_member {
            return Err(malformed("path ends with '.'"));
        }
        Ok(Self { text: trimmed.to_string(), segments })
    }

    pub fn as_str(&self) -> &str { &self.text }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    /// Resolve each segment against the source type. Object members use exact-case lookup with a single
    /// case-insensitive fallback; builtin members (`Length`, `Count`, ...) are resolved the same way.
    pub fn resolve(&self, source: &Type) -> Result<Accessor, PropertyResolutionError> {
        let mut current = source.clone();
        let mut steps = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Member(name) => {
                    let (step, ty) = resolve_member(&current, name).ok_or_else(|| PropertyResolutionError::NotFound {
                        path: self.text.clone(),
                        segment: name.clone(),
                        type_name: current.to_string(),
                    })?;
                    steps.push(step);
                    current = ty;
                }
                Segment::Index(index) => {
                    let element = match current.underlying() {
                        Type::Any => Type::Any,
                        other => other.element_type().cloned().ok_or_else(|| PropertyResolutionError::NotIndexable {
                            path: self.text.clone(),
                            type_name: current.to_string(),
                        })?,
                    };
                    steps.push(Step::Index(*index));
                    current = element;
                }
            }
        }
        Ok(Accessor { path: self.text.clone(), steps, result_type: current })
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.text) }
}

/// One member lookup. `Any`-typed receivers defer the lookup to evaluation.
pub(crate) fn resolve_member(ty: &Type, name: &str) -> Option<(Step, Type)> {
    match ty.underlying() {
        Type::Object(object) => object.resolve_field(name).map(|field| (Step::Field(field.name.clone()), field.ty.clone())),
        Type::Any => Some((Step::Dynamic(name.to_string()), Type::Any)),
        underlying => BuiltinMember::resolve(ty, name)
            .or_else(|| BuiltinMember::resolve(underlying, name).map(|(member, result)| (member, lift(ty, result))))
            .map(|(member, result)| (Step::Builtin(member), result)),
    }
}

/// A member of a nullable receiver is itself nullable
fn lift(receiver: &Type, result: Type) -> Type {
    match receiver {
        Type::Nullable(_) => Type::nullable(result),
        _ => result,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Canonical field name on an object type
    Field(String),
    /// Member looked up at evaluation time
    Dynamic(String),
    Builtin(BuiltinMember),
    Index(usize),
}

impl Step {
    fn name(&self) -> String {
        match self {
            Step::Field(name) | Step::Dynamic(name) => name.clone(),
            Step::Builtin(member) => member.name().to_string(),
            Step::Index(index) => format!("[{index}]"),
        }
    }

    pub(crate) fn apply(&self, value: &Value, path: &str) -> Result<Value, QueryError> {
        match (self, value) {
            (Step::Builtin(member), value) => member.read(value),
            (_, Value::Null) => Ok(Value::Null),
            (Step::Field(_) | Step::Dynamic(_), Value::Object(object)) => self.apply_object(object.as_ref(), path),
            (Step::Dynamic(name), other) => match BuiltinMember::resolve(&other.runtime_type(), name) {
                Some((member, _)) => member.read(other),
                None => Err(not_found(path, name, other.type_name()).into()),
            },
            (Step::Index(index), Value::List(items)) => {
                items.get(*index).cloned().ok_or_else(|| RangeError::IndexOutOfRange { index: *index as i64, len: items.len() }.into())
            }
            (Step::Index(_), other) => Err(PropertyResolutionError::NotIndexable { path: path.to_string(), type_name: other.type_name() }.into()),
            (Step::Field(name), other) => Err(not_found(path, name, other.type_name()).into()),
        }
    }

    pub(crate) fn apply_object(&self, object: &dyn Reflect, path: &str) -> Result<Value, QueryError> {
        match self {
            Step::Field(name) => object.field(name).ok_or_else(|| not_found(path, name, object.type_info().to_string()).into()),
            Step::Dynamic(name) => {
                let ty = object.type_info();
                let canonical = match &ty {
                    Type::Object(object_ty) => object_ty.resolve_field(name).map(|f| f.name.clone()),
                    _ => None,
                };
                canonical.and_then(|n| object.field(&n)).ok_or_else(|| not_found(path, name, ty.to_string()).into())
            }
            _ => self.apply(&object.to_value(), path),
        }
    }
}

fn not_found(path: &str, segment: &str, type_name: String) -> PropertyResolutionError {
    PropertyResolutionError::NotFound { path: path.to_string(), segment: segment.to_string(), type_name }
}

/// A resolved property path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accessor {
    path: String,
    steps: Vec<Step>,
    result_type: Type,
}

impl Accessor {
    pub fn path(&self) -> &str { &self.path }

    pub fn steps(&self) -> &[Step] { &self.steps }

    pub fn result_type(&self) -> &Type { &self.result_type }

    /// Read the value at this path. A null anywhere along the way yields null.
    pub fn get(&self, source: &dyn Reflect) -> Result<Value, QueryError> {
        let mut steps = self.steps.iter();
        let mut current = match steps.next() {
            None => return Ok(source.to_value()),
            Some(first @ (Step::Field(_) | Step::Dynamic(_))) => first.apply_object(source, &self.path)?,
            Some(first) => first.apply(&source.to_value(), &self.path)?,
        };
        for step in steps {
            current = step.apply(&current, &self.path)?;
        }
        Ok(current)
    }

    /// Same as [`Accessor::get`] for a source that is already a value (e.g. a list for `[2]`)
    pub fn get_value(&self, source: &Value) -> Result<Value, QueryError> {
        self.steps.iter().try_fold(source.clone(), |current, step| step.apply(&current, &self.path))
    }

    /// The member-access expression this path denotes, rooted at `target`
    pub fn to_expr(&self, target: Expr) -> Expr {
        self.steps.iter().fold(target, |expr, step| match step {
            Step::Index(index) => Expr::index(expr, Expr::Literal(index_literal(*index))),
            other => Expr::member(expr, other.name()),
        })
    }
}

fn index_literal(index: usize) -> Literal {
    match i32::try_from(index) {
        Ok(i) => Literal::I32(i),
        Err(_) => Literal::I64(index as i64),
    }
}

/// A statically typed accessor: `Getter<Person, String>` for `"Address.City"`.
pub struct Getter<S, R> {
    accessor: Arc<Accessor>,
    _marker: PhantomData<fn(&S) -> R>,
}

impl<S, R> Clone for Getter<S, R> {
    fn clone(&self) -> Self { Self { accessor: self.accessor.clone(), _marker: PhantomData } }
}

impl<S: Reflect, R: FromValue> Getter<S, R> {
    pub(crate) fn new(accessor: Arc<Accessor>) -> Self { Self { accessor, _marker: PhantomData } }

    pub fn accessor(&self) -> &Accessor { &self.accessor }

    pub fn get(&self, source: &S) -> Result<R, QueryError> { Ok(R::from_value(self.accessor.get(source)?)?) }
}

impl<S, R> fmt::Debug for Getter<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("Getter").field(&self.accessor.path).finish() }
}
