use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An expression tree. Immutable once built; the binder in `sieve-core` produces a rewritten copy
/// rather than mutating a parsed tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// A bare identifier. After binding this only ever names a lambda parameter.
    Parameter(String),
    Member {
        target: Box<Expr>,
        name: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        target: CallTarget,
        method: String,
        args: Vec<Expr>,
    },
    Lambda {
        parameter: String,
        body: Box<Expr>,
    },
    NewArray {
        element_type: Option<TypeName>,
        elements: Vec<Expr>,
    },
    Cast {
        ty: TypeName,
        expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    Instance(Box<Expr>),
    /// A static receiver such as `DateTime` in `DateTime.Parse(..)`
    Static(String),
}

/// A textual type reference as written in a cast or array literal, e.g. `MyApp.Status` or `int?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeName {
    pub name: String,
    pub nullable: bool,
}

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into(), nullable: false } }

    /// Parse `Name` / `Name?` as produced by the grammar.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match text.strip_suffix('?') {
            Some(name) => Self { name: name.trim().to_string(), nullable: true },
            None => Self { name: text.to_string(), nullable: false },
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.nullable {
            write!(f, "{}?", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Guid(Uuid),
    DateTime {
        value: NaiveDateTime,
        /// Raw `DateTimeStyles` flags supplied to `DateTime.Parse`, kept for round-tripping
        styles: Option<i32>,
    },
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
    /// An enum member, identified by its underlying integer
    Enum {
        type_name: String,
        value: i64,
    },
}

impl Literal {
    pub fn is_numeric(&self) -> bool { matches!(self, Literal::I32(_) | Literal::I64(_) | Literal::F32(_) | Literal::F64(_)) }

    /// Arithmetic negation of a numeric literal. `None` for non-numeric or overflowing values.
    pub fn negate(&self) -> Option<Literal> {
        match self {
            Literal::I32(i) => i.checked_neg().map(Literal::I32),
            Literal::I64(i) => i.checked_neg().map(Literal::I64),
            Literal::F32(f) => Some(Literal::F32(-f)),
            Literal::F64(f) => Some(Literal::F64(-f)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Coalesce,           // ??
    Or,                 // ||
    And,                // &&
    Equal,              // ==
    NotEqual,           // != or <>
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    Add,                // +
    Subtract,           // -
    Multiply,           // *
    Divide,             // /
    Modulo,             // %
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Coalesce => "??",
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanOrEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanOrEqual
        )
    }

    pub fn is_logical(&self) -> bool { matches!(self, BinaryOperator::And | BinaryOperator::Or) }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,    // !
    Negate, // -
}

impl Expr {
    pub fn literal(literal: impl Into<Literal>) -> Self { Expr::Literal(literal.into()) }

    pub fn parameter(name: impl Into<String>) -> Self { Expr::Parameter(name.into()) }

    pub fn member(target: Expr, name: impl Into<String>) -> Self { Expr::Member { target: Box::new(target), name: name.into() } }

    pub fn index(target: Expr, index: Expr) -> Self { Expr::Index { target: Box::new(target), index: Box::new(index) } }

    pub fn binary(operator: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary { operator, left: Box::new(left), right: Box::new(right) }
    }

    pub fn not(operand: Expr) -> Self { Expr::Unary { operator: UnaryOperator::Not, operand: Box::new(operand) } }

    pub fn call(target: Expr, method: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call { target: CallTarget::Instance(Box::new(target)), method: method.into(), args }
    }

    pub fn lambda(parameter: impl Into<String>, body: Expr) -> Self { Expr::Lambda { parameter: parameter.into(), body: Box::new(body) } }

    pub fn array(elements: Vec<Expr>) -> Self { Expr::NewArray { element_type: None, elements } }

    /// Fold a list of expressions with a logical operator. `None` for an empty list.
    pub fn fold(operator: BinaryOperator, exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(|left, right| Expr::binary(operator, left, right))
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Bool(b) }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self { Literal::I32(i) }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self { Literal::I64(i) }
}

impl From<f32> for Literal {
    fn from(f: f32) -> Self { Literal::F32(f) }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self { Literal::F64(f) }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_string()) }
}

impl From<String> for Literal {
    fn from(s: String) -> Self { Literal::String(s) }
}

impl From<Uuid> for Literal {
    fn from(id: Uuid) -> Self { Literal::Guid(id) }
}

impl From<NaiveDateTime> for Literal {
    fn from(value: NaiveDateTime) -> Self { Literal::DateTime { value, styles: None } }
}

impl From<NaiveDate> for Literal {
    fn from(d: NaiveDate) -> Self { Literal::Date(d) }
}

impl From<NaiveTime> for Literal {
    fn from(t: NaiveTime) -> Self { Literal::Time(t) }
}

impl From<DateTime<FixedOffset>> for Literal {
    fn from(dt: DateTime<FixedOffset>) -> Self { Literal::DateTimeOffset(dt) }
}
