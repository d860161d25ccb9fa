//! Binding of parsed expressions against a parameter type.
//!
//! The binder walks a `sieveql` expression once, resolving identifiers, members and methods against [`Type`]
//! descriptors, and produces two things: a typed [`Node`] tree that the evaluator runs, and a canonical
//! [`Expr`] in which implicit members are made explicit (`Age` becomes `it.Age`), member names carry their
//! declared case and enum constants are typed.

use crate::error::{ParseError, QueryError};
use crate::eval::Scope;
use crate::locator::TypeLocator;
use crate::members::{SequenceMethod, StringMethod};
use crate::path::{resolve_member, Step};
use crate::reflect::Reflect;
use crate::types::Type;
use crate::value::Value;
use sieveql::ast::{BinaryOperator, CallTarget, Expr, Literal, TypeName, UnaryOperator};
use sieveql::literal::LiteralFactory;
use std::fmt;
use tracing::debug;

/// A bound expression, ready for evaluation.
#[derive(Debug, Clone)]
pub enum Node {
    Constant(Value),
    /// Position of the parameter in the scope stack; 0 is the root parameter
    Parameter(usize),
    Member {
        target: Box<Node>,
        step: Step,
    },
    Index {
        target: Box<Node>,
        index: Box<Node>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    Not(Box<Node>),
    Negate(Box<Node>),
    Conditional {
        test: Box<Node>,
        then: Box<Node>,
        otherwise: Box<Node>,
    },
    String {
        method: StringMethod,
        target: Box<Node>,
        arg: Option<Box<Node>>,
    },
    Sequence {
        method: SequenceMethod,
        target: Box<Node>,
        arg: Option<SequenceArg>,
    },
    Parse {
        factory: LiteralFactory,
        text: Box<Node>,
    },
    Array(Vec<Node>),
    Convert {
        target: Box<Node>,
        ty: Type,
    },
}

#[derive(Debug, Clone)]
pub enum SequenceArg {
    Value(Box<Node>),
    /// Lambda body evaluated with each element pushed as a new parameter
    Predicate(Box<Node>),
}

impl Node {
    fn is_null(&self) -> bool { matches!(self, Node::Constant(Value::Null)) }
}

struct Bound {
    node: Node,
    ty: Type,
    expr: Expr,
}

impl Bound {
    fn constant(value: Value, expr: Expr) -> Self {
        let ty = value.runtime_type();
        Self { node: Node::Constant(value), ty, expr }
    }
}

fn error(message: impl Into<String>) -> ParseError { ParseError::new(message) }

pub struct Binder<'a> {
    locator: Option<&'a dyn TypeLocator>,
    scopes: Vec<(String, Type)>,
}

impl<'a> Binder<'a> {
    pub fn new(locator: Option<&'a dyn TypeLocator>) -> Self { Self { locator, scopes: Vec::new() } }

    fn locate(&self, name: &str) -> Option<Type> { Type::from_builtin_name(name).or_else(|| self.locator.and_then(|l| l.locate(name))) }

    fn parameter(&self, name: &str) -> Option<(usize, &Type)> {
        self.scopes.iter().enumerate().rev().find(|(_, (n, _))| n == name).map(|(i, (_, ty))| (i, ty))
    }

    /// `Name` as shorthand for `param.Name`, innermost parameter first
    fn implicit_member(&self, name: &str) -> Option<Bound> {
        for (depth, (parameter, ty)) in self.scopes.iter().enumerate().rev() {
            if matches!(ty.underlying(), Type::Any) {
                continue;
            }
            if let Some((step, member_ty)) = resolve_member(ty, name) {
                let canonical = step_name(&step, name);
                return Some(Bound {
                    node: Node::Member { target: Box::new(Node::Parameter(depth)), step },
                    ty: member_ty,
                    expr: Expr::member(Expr::parameter(parameter.clone()), canonical),
                });
            }
        }
        None
    }

    /// `Ns.Status.Active` as an enum member, through the type locator
    fn enum_member(&self, dotted: &str) -> Option<Bound> {
        let (type_name, member) = dotted.rsplit_once('.')?;
        let Type::Enum(ty) = self.locator?.locate(type_name)? else { return None };
        let value = ty.value_of(member)?;
        let expr = Expr::Literal(Literal::Enum { type_name: ty.name.clone(), value });
        Some(Bound { node: Node::Constant(Value::Enum { ty: ty.clone(), value }), ty: Type::Enum(ty), expr })
    }

    /// Bind a root expression as a single-parameter lambda. Bare bodies get `default_parameter`.
    pub fn bind_lambda(&mut self, expr: &Expr, parameter_type: &Type, default_parameter: &str) -> Result<(String, Node, Type, Expr), ParseError> {
        let (parameter, body) = match expr {
            Expr::Lambda { parameter, body } => (parameter.clone(), body.as_ref()),
            other => (default_parameter.to_string(), other),
        };
        self.scopes.push((parameter.clone(), parameter_type.clone()));
        let bound = self.bind(body);
        self.scopes.pop();
        let bound = bound?;
        let canonical = Expr::lambda(parameter.clone(), bound.expr);
        Ok((parameter, bound.node, bound.ty, canonical))
    }

    fn bind(&mut self, expr: &Expr) -> Result<Bound, ParseError> {
        match expr {
            Expr::Literal(literal) => Ok(self.bind_literal(literal)),
            Expr::Parameter(name) => self.bind_identifier(name),
            Expr::Member { target, name } => self.bind_member(expr, target, name),
            Expr::Index { target, index } => {
                let target = self.bind(target)?;
                let index = self.bind(index)?;
                if !index.ty.is_integer() && !matches!(index.ty, Type::Any) {
                    return Err(error(format!("Index must be an integer, got {}", index.ty)));
                }
                let element = match target.ty.underlying() {
                    Type::Any => Type::Any,
                    other => other.element_type().cloned().ok_or_else(|| error(format!("Cannot apply indexing to type '{}'", target.ty)))?,
                };
                Ok(Bound {
                    node: Node::Index { target: Box::new(target.node), index: Box::new(index.node) },
                    ty: element,
                    expr: Expr::index(target.expr, index.expr),
                })
            }
            Expr::Binary { operator, left, right } => {
                let left = self.bind(left)?;
                let right = self.bind(right)?;
                bind_binary(*operator, left, right)
            }
            Expr::Unary { operator, operand } => {
                let operand = self.bind(operand)?;
                match operator {
                    UnaryOperator::Not => {
                        expect_bool(&operand, "operator '!'")?;
                        Ok(Bound { node: Node::Not(Box::new(operand.node)), ty: operand.ty, expr: Expr::not(operand.expr) })
                    }
                    UnaryOperator::Negate => {
                        if !operand.ty.is_numeric() && !matches!(operand.ty, Type::Any) {
                            return Err(error(format!("Operator '-' cannot be applied to operand of type '{}'", operand.ty)));
                        }
                        let expr = Expr::Unary { operator: UnaryOperator::Negate, operand: Box::new(operand.expr) };
                        Ok(Bound { node: Node::Negate(Box::new(operand.node)), ty: operand.ty, expr })
                    }
                }
            }
            Expr::Conditional { test, then, otherwise } => {
                let test = self.bind(test)?;
                expect_bool(&test, "a conditional test")?;
                let then = self.bind(then)?;
                let otherwise = self.bind(otherwise)?;
                let ty = unify(&then, &otherwise)
                    .ok_or_else(|| error(format!("Conditional branches have incompatible types '{}' and '{}'", then.ty, otherwise.ty)))?;
                Ok(Bound {
                    node: Node::Conditional { test: Box::new(test.node), then: Box::new(then.node), otherwise: Box::new(otherwise.node) },
                    ty,
                    expr: Expr::Conditional { test: Box::new(test.expr), then: Box::new(then.expr), otherwise: Box::new(otherwise.expr) },
                })
            }
            Expr::Call { target: CallTarget::Static(name), method, args } => self.bind_static_call(name, method, args),
            Expr::Call { target: CallTarget::Instance(target), method, args } => {
                let target = self.bind(target)?;
                self.bind_method(target, method, args)
            }
            Expr::Lambda { .. } => Err(error("Lambda expressions are only supported as the root or as a sequence method argument")),
            Expr::NewArray { element_type, elements } => self.bind_array(element_type.as_ref(), elements),
            Expr::Cast { ty, expr } => self.bind_cast(ty, expr),
        }
    }

    fn bind_literal(&self, literal: &Literal) -> Bound {
        if let Literal::Enum { type_name, value } = literal {
            if let Some(Type::Enum(ty)) = self.locator.and_then(|l| l.locate(type_name)) {
                return Bound {
                    node: Node::Constant(Value::Enum { ty: ty.clone(), value: *value }),
                    ty: Type::Enum(ty),
                    expr: Expr::Literal(literal.clone()),
                };
            }
        }
        Bound::constant(Value::from_literal(literal), Expr::Literal(literal.clone()))
    }

    fn bind_identifier(&self, name: &str) -> Result<Bound, ParseError> {
        if let Some((depth, ty)) = self.parameter(name) {
            return Ok(Bound { node: Node::Parameter(depth), ty: ty.clone(), expr: Expr::parameter(name) });
        }
        self.implicit_member(name).ok_or_else(|| error(format!("Unknown identifier '{name}'")))
    }

    fn bind_member(&mut self, whole: &Expr, target: &Expr, name: &str) -> Result<Bound, ParseError> {
        // A dotted chain whose root is neither a parameter nor an implicit member can only name an enum member
        if let Some(root) = root_identifier(target) {
            if self.parameter(root).is_none() && self.implicit_member(root).is_none() {
                let dotted = dotted_name(whole).unwrap_or_default();
                return self.enum_member(&dotted).ok_or_else(|| error(format!("Unknown identifier '{dotted}'")));
            }
        }

        let target = self.bind(target)?;
        let (step, ty) = resolve_member(&target.ty, name)
            .ok_or_else(|| error(format!("No property or field '{}' exists in type '{}'", name, target.ty)))?;
        let canonical = step_name(&step, name);
        Ok(Bound { node: Node::Member { target: Box::new(target.node), step }, ty, expr: Expr::member(target.expr, canonical) })
    }

    fn bind_static_call(&mut self, receiver: &str, method: &str, args: &[Expr]) -> Result<Bound, ParseError> {
        let factory = LiteralFactory::from_name(receiver)
            .filter(|_| method == "Parse")
            .ok_or_else(|| error(format!("Unsupported static method '{receiver}.{method}'")))?;
        let (text, rest) = args.split_first().ok_or_else(|| error(format!("{receiver}.Parse requires an argument")))?;
        let text = self.bind(text)?;
        if !text.ty.is_string() && !matches!(text.ty, Type::Any) {
            return Err(error(format!("{receiver}.Parse expects a string, got '{}'", text.ty)));
        }
        let ty = match factory {
            LiteralFactory::DateTime => Type::DateTime,
            LiteralFactory::DateTimeOffset => Type::DateTimeOffset,
            LiteralFactory::DateOnly => Type::Date,
            LiteralFactory::TimeOnly => Type::Time,
            LiteralFactory::Guid => Type::Guid,
        };
        let mut canonical_args = vec![text.expr];
        canonical_args.extend(rest.iter().cloned());
        Ok(Bound {
            // styles stay in the canonical text only; parsing is the same with or without them
            node: Node::Parse { factory, text: Box::new(text.node) },
            ty: Type::nullable(ty),
            expr: Expr::Call { target: CallTarget::Static(factory.name().to_string()), method: method.to_string(), args: canonical_args },
        })
    }

    fn bind_method(&mut self, target: Bound, method: &str, args: &[Expr]) -> Result<Bound, ParseError> {
        let receiver = target.ty.underlying().clone();
        let string_method = StringMethod::from_name(method);
        let sequence_method = SequenceMethod::from_name(method);

        let as_string = match (&receiver, string_method, sequence_method) {
            (Type::String, Some(_), _) => true,
            // `Contains` on an untyped receiver dispatches at evaluation time through the sequence form
            (Type::Any, Some(_), None) => true,
            _ => false,
        };
        if let (true, Some(string_method)) = (as_string, string_method) {
            if args.len() != string_method.arity() {
                return Err(error(format!("Method '{method}' takes {} argument(s)", string_method.arity())));
            }
            let arg = match args.first() {
                Some(arg) => {
                    let arg = self.bind(arg)?;
                    if !arg.ty.is_string() && !matches!(arg.ty, Type::Any) && !arg.node.is_null() {
                        return Err(error(format!("Method '{method}' expects a string argument, got '{}'", arg.ty)));
                    }
                    Some(arg)
                }
                None => None,
            };
            let (arg_node, arg_expr) = match arg {
                Some(arg) => (Some(Box::new(arg.node)), vec![arg.expr]),
                None => (None, vec![]),
            };
            return Ok(Bound {
                node: Node::String { method: string_method, target: Box::new(target.node), arg: arg_node },
                ty: string_method.result_type(),
                expr: Expr::call(target.expr, string_method.name(), arg_expr),
            });
        }

        let element = match &receiver {
            Type::Any => Some(Type::Any),
            other => other.element_type().cloned(),
        };
        match (element, sequence_method) {
            (Some(element), Some(sequence_method)) => self.bind_sequence(target, element, sequence_method, args),
            _ => Err(error(format!("No applicable method '{}' exists in type '{}'", method, target.ty))),
        }
    }

    fn bind_sequence(&mut self, target: Bound, element: Type, method: SequenceMethod, args: &[Expr]) -> Result<Bound, ParseError> {
        let name = method.name();
        let (node, ty, canonical_args, target) = match (method, args) {
            (SequenceMethod::Any | SequenceMethod::Count, []) => {
                let ty = if method == SequenceMethod::Count { Type::I32 } else { Type::Bool };
                (None, ty, vec![], target)
            }
            (SequenceMethod::Any | SequenceMethod::All | SequenceMethod::Count, [Expr::Lambda { parameter, body }]) => {
                self.scopes.push((parameter.clone(), element));
                let body = self.bind(body);
                self.scopes.pop();
                let body = body?;
                expect_bool(&body, &format!("the predicate of '{name}'"))?;
                let ty = if method == SequenceMethod::Count { Type::I32 } else { Type::Bool };
                (Some(SequenceArg::Predicate(Box::new(body.node))), ty, vec![Expr::lambda(parameter.clone(), body.expr)], target)
            }
            (SequenceMethod::Contains, [value]) => {
                let value = self.bind(value)?;
                // constants take the type of the other side, whichever side the constant is on
                let value = coerce_constant(value, &element)?;
                let target = coerce_constant(target, &Type::list(value.ty.clone()))?;
                let element = target.ty.element_type().cloned().unwrap_or(Type::Any);
                if !value.node.is_null() && !comparable(&element, &value.ty) {
                    return Err(error(format!("Cannot search a sequence of '{}' for a value of type '{}'", element, value.ty)));
                }
                (Some(SequenceArg::Value(Box::new(value.node))), Type::Bool, vec![value.expr], target)
            }
            (SequenceMethod::Intersect | SequenceMethod::Except, [other]) => {
                let other = self.bind(other)?;
                let Some(other_element) = (match other.ty.underlying() {
                    Type::Any => Some(Type::Any),
                    ty => ty.element_type().cloned(),
                }) else {
                    return Err(error(format!("Method '{name}' expects a sequence, got '{}'", other.ty)));
                };
                let other = coerce_constant(other, &Type::list(element.clone()))?;
                let target = coerce_constant(target, &Type::list(other_element.clone()))?;
                let element = target.ty.element_type().cloned().unwrap_or(Type::Any);
                if !comparable(&element, other.ty.element_type().unwrap_or(&Type::Any)) {
                    return Err(error(format!("Method '{name}' cannot combine sequences of '{}' and '{}'", element, other_element)));
                }
                (Some(SequenceArg::Value(Box::new(other.node))), Type::list(element), vec![other.expr], target)
            }
            _ => return Err(error(format!("Invalid arguments for sequence method '{name}'"))),
        };
        Ok(Bound {
            node: Node::Sequence { method, target: Box::new(target.node), arg: node },
            ty,
            expr: Expr::call(target.expr, name, canonical_args),
        })
    }

    fn bind_array(&mut self, element_type: Option<&TypeName>, elements: &[Expr]) -> Result<Bound, ParseError> {
        let declared = match element_type {
            Some(name) => Some(self.resolve_type_name(name)?),
            None => None,
        };
        let mut bound = Vec::with_capacity(elements.len());
        for element in elements {
            let element = self.bind(element)?;
            bound.push(match &declared {
                Some(ty) => coerce_constant(element, ty)?,
                None => element,
            });
        }

        let element = match declared {
            Some(ty) => ty,
            None => {
                let mut element: Option<Type> = None;
                let mut has_null = false;
                for b in &bound {
                    if b.node.is_null() {
                        has_null = true;
                        continue;
                    }
                    element = Some(match element {
                        None => b.ty.clone(),
                        Some(acc) => unify_types(&acc, &b.ty).ok_or_else(|| error("No best type found for implicitly-typed array"))?,
                    });
                }
                let element = element.unwrap_or(Type::Any);
                if has_null {
                    null_of(&element)
                } else {
                    element
                }
            }
        };

        let expr = Expr::NewArray { element_type: element_type.cloned(), elements: bound.iter().map(|b| b.expr.clone()).collect() };
        let constants: Option<Vec<Value>> = bound
            .iter()
            .map(|b| match &b.node {
                Node::Constant(value) => Some(value.clone()),
                _ => None,
            })
            .collect();
        let node = match constants {
            Some(values) => Node::Constant(Value::List(values)),
            None => Node::Array(bound.into_iter().map(|b| b.node).collect()),
        };
        Ok(Bound { node, ty: Type::list(element), expr })
    }

    fn resolve_type_name(&self, name: &TypeName) -> Result<Type, ParseError> {
        let ty = self.locate(&name.name).ok_or_else(|| error(format!("Unknown type '{}'", name.name)))?;
        Ok(if name.nullable { Type::nullable(ty) } else { ty })
    }

    fn bind_cast(&mut self, name: &TypeName, operand: &Expr) -> Result<Bound, ParseError> {
        let operand = self.bind(operand)?;
        if let Some(builtin) = Type::from_builtin_name(&name.name) {
            let ty = if name.nullable { Type::nullable(builtin) } else { builtin };
            return match operand.node {
                Node::Constant(value) => {
                    let converted = value.cast_to(&ty).map_err(|e| error(format!("Cannot convert constant to '{}': {}", name, e)))?;
                    let expr = converted.to_expr().unwrap_or(operand.expr);
                    Ok(Bound { node: Node::Constant(converted), ty, expr })
                }
                node => Ok(Bound {
                    node: Node::Convert { target: Box::new(node), ty: ty.clone() },
                    ty,
                    expr: Expr::Cast { ty: name.clone(), expr: Box::new(operand.expr) },
                }),
            };
        }

        let located = self.locator.and_then(|l| l.locate(&name.name)).ok_or_else(|| error(format!("Unknown type '{}'", name.name)))?;
        let Type::Enum(enum_ty) = &located else {
            return Err(error(format!("Type '{}' is not an enum and cannot be the target of a numeric cast", name.name)));
        };
        let value = match &operand.node {
            Node::Constant(value) => value.as_i64(),
            _ => None,
        }
        .ok_or_else(|| error(format!("Only integer constants can be cast to enum type '{}'", name.name)))?;
        let ty = if name.nullable { Type::nullable(located.clone()) } else { located.clone() };
        Ok(Bound {
            node: Node::Constant(Value::Enum { ty: enum_ty.clone(), value }),
            ty,
            expr: Expr::Literal(Literal::Enum { type_name: enum_ty.name.clone(), value }),
        })
    }
}

fn step_name(step: &Step, written: &str) -> String {
    match step {
        Step::Field(name) => name.clone(),
        Step::Builtin(member) => member.name().to_string(),
        _ => written.to_string(),
    }
}

fn root_identifier(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Parameter(name) => Some(name),
        Expr::Member { target, .. } => root_identifier(target),
        _ => None,
    }
}

fn dotted_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Parameter(name) => Some(name.clone()),
        Expr::Member { target, name } => dotted_name(target).map(|prefix| format!("{prefix}.{name}")),
        _ => None,
    }
}

fn expect_bool(bound: &Bound, context: &str) -> Result<(), ParseError> {
    if bound.ty.is_bool() || matches!(bound.ty, Type::Any) {
        Ok(())
    } else {
        Err(error(format!("Expected a boolean expression for {context}, got '{}'", bound.ty)))
    }
}

/// Whether `==` and ordering are defined between values of the two types
fn comparable(left: &Type, right: &Type) -> bool {
    match (left.underlying(), right.underlying()) {
        (Type::Any, _) | (_, Type::Any) => true,
        (Type::Enum(a), Type::Enum(b)) => a.name == b.name,
        (Type::Enum(_), other) | (other, Type::Enum(_)) => other.is_integer(),
        (Type::DateTime, Type::DateTimeOffset) | (Type::DateTimeOffset, Type::DateTime) => true,
        (Type::List(a), Type::List(b)) => comparable(a, b),
        (a, b) => a == b || (a.is_numeric() && b.is_numeric()),
    }
}

fn unify_types(a: &Type, b: &Type) -> Option<Type> {
    if a == b {
        return Some(a.clone());
    }
    if a.underlying() == b.underlying() {
        return Some(Type::nullable(a.underlying().clone()));
    }
    if let Some(promoted) = Type::promote(a, b) {
        return Some(promoted);
    }
    match (a, b) {
        (Type::Any, _) | (_, Type::Any) => Some(Type::Any),
        _ => None,
    }
}

/// Common type of two branches; a null branch makes the other nullable
fn unify(a: &Bound, b: &Bound) -> Option<Type> {
    match (a.node.is_null(), b.node.is_null()) {
        (true, true) => Some(Type::Any),
        (true, false) => Some(null_of(&b.ty)),
        (false, true) => Some(null_of(&a.ty)),
        (false, false) => unify_types(&a.ty, &b.ty),
    }
}

fn null_of(ty: &Type) -> Type {
    if ty.accepts_null() {
        ty.clone()
    } else {
        Type::nullable(ty.clone())
    }
}

/// Convert a constant operand to the type of the other side where the language converts implicitly:
/// integers and names to enums, doubles to floats, and text to dates and guids. Constant lists convert elementwise.
fn coerce_constant(bound: Bound, target: &Type) -> Result<Bound, ParseError> {
    let Node::Constant(value) = &bound.node else { return Ok(bound) };
    let wanted = target.underlying();
    let applies = match (value, wanted) {
        (Value::Null, _) => false,
        (Value::List(items), Type::List(element)) => items.iter().any(|item| needs_coercion(item, element.underlying())),
        (value, wanted) => needs_coercion(value, wanted),
    };
    if !applies {
        return Ok(bound);
    }
    let converted = value.cast_to(wanted).map_err(|e| error(format!("Cannot convert constant to '{}': {}", wanted, e)))?;
    let expr = converted.to_expr().unwrap_or(bound.expr);
    Ok(Bound { node: Node::Constant(converted), ty: wanted.clone(), expr })
}

fn needs_coercion(value: &Value, wanted: &Type) -> bool {
    match (value, wanted) {
        (Value::Enum { .. }, Type::Enum(_)) => false,
        (Value::I32(_) | Value::I64(_) | Value::String(_), Type::Enum(_)) => true,
        (Value::String(_), Type::Guid | Type::DateTime | Type::DateTimeOffset | Type::Date | Type::Time) => true,
        // `85.3` against a float member means the float nearest to it
        (Value::F64(n), Type::F32) => n.is_finite() && n.abs() <= f32::MAX as f64,
        _ => false,
    }
}

fn bind_binary(operator: BinaryOperator, left: Bound, right: Bound) -> Result<Bound, ParseError> {
    let symbol = operator.symbol();
    let incompatible =
        |l: &Bound, r: &Bound| error(format!("Operator '{}' incompatible with operand types '{}' and '{}'", symbol, l.ty, r.ty));

    let (left, right, ty) = match operator {
        BinaryOperator::And | BinaryOperator::Or => {
            expect_bool(&left, &format!("the left operand of '{symbol}'"))?;
            expect_bool(&right, &format!("the right operand of '{symbol}'"))?;
            (left, right, Type::Bool)
        }
        BinaryOperator::Coalesce => {
            let ty = unify_types(left.ty.underlying(), &right.ty)
                .or_else(|| right.node.is_null().then(|| left.ty.clone()))
                .ok_or_else(|| incompatible(&left, &right))?;
            (left, right, ty)
        }
        op if op.is_comparison() => {
            let left = coerce_constant(left, &right.ty)?;
            let right = coerce_constant(right, &left.ty)?;
            let equality = matches!(op, BinaryOperator::Equal | BinaryOperator::NotEqual);
            if !(left.node.is_null() || right.node.is_null()) {
                if !comparable(&left.ty, &right.ty) {
                    return Err(incompatible(&left, &right));
                }
                if !equality && (!left.ty.is_orderable() || !right.ty.is_orderable()) {
                    return Err(incompatible(&left, &right));
                }
            }
            (left, right, Type::Bool)
        }
        _ => {
            let any = matches!(left.ty, Type::Any) || matches!(right.ty, Type::Any);
            let ty = if operator == BinaryOperator::Add && (left.ty.is_string() || right.ty.is_string()) {
                Type::String
            } else if let Some(promoted) = Type::promote(&left.ty, &right.ty) {
                promoted
            } else if any {
                Type::Any
            } else {
                return Err(incompatible(&left, &right));
            };
            (left, right, ty)
        }
    };
    Ok(Bound {
        node: Node::Binary { operator, left: Box::new(left.node), right: Box::new(right.node) },
        ty,
        expr: Expr::binary(operator, left.expr, right.expr),
    })
}

/// A compiled single-parameter lambda: `it => body`.
#[derive(Clone)]
pub struct CompiledLambda {
    parameter: String,
    parameter_type: Type,
    result_type: Type,
    expr: Expr,
    node: Node,
}

impl CompiledLambda {
    pub fn compile(expr: &Expr, parameter_type: &Type, default_parameter: &str, locator: Option<&dyn TypeLocator>) -> Result<Self, ParseError> {
        let (parameter, node, result_type, expr) = Binder::new(locator).bind_lambda(expr, parameter_type, default_parameter)?;
        debug!("compiled lambda over {}: {}", parameter_type, sieveql::serialize(&expr));
        Ok(Self { parameter, parameter_type: parameter_type.clone(), result_type, expr, node })
    }

    /// Compile as a predicate: the body must be boolean
    pub fn predicate(expr: &Expr, parameter_type: &Type, default_parameter: &str, locator: Option<&dyn TypeLocator>) -> Result<Self, ParseError> {
        let compiled = Self::compile(expr, parameter_type, default_parameter, locator)?;
        if !compiled.result_type.is_bool() && !matches!(compiled.result_type, Type::Any) {
            return Err(error(format!("Expression of type '{}' is not a predicate", compiled.result_type)));
        }
        Ok(compiled)
    }

    pub fn parameter(&self) -> &str { &self.parameter }

    pub fn parameter_type(&self) -> &Type { &self.parameter_type }

    pub fn result_type(&self) -> &Type { &self.result_type }

    /// The canonical lambda expression, suitable for [`sieveql::serialize`]
    pub fn expr(&self) -> &Expr { &self.expr }

    pub fn node(&self) -> &Node { &self.node }

    pub fn evaluate(&self, source: &dyn Reflect) -> Result<Value, QueryError> { Scope::borrowed(source).eval(&self.node) }

    pub fn evaluate_value(&self, source: &Value) -> Result<Value, QueryError> { Scope::owned(source.clone()).eval(&self.node) }

    /// Evaluate as a predicate; a null result does not match
    pub fn test(&self, source: &dyn Reflect) -> Result<bool, QueryError> { crate::eval::truthy(self.evaluate(source)?) }
}

impl fmt::Debug for CompiledLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "CompiledLambda({})", sieveql::serialize(&self.expr)) }
}

impl fmt::Display for CompiledLambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", sieveql::serialize(&self.expr)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::TypeMap;
    use crate::types::{EnumType, ObjectType};
    use sieveql::parse_expression;

    fn person() -> Type {
        ObjectType::builder("Person")
            .field("Name", Type::String)
            .field("Age", Type::I32)
            .field("Score", Type::nullable(Type::F64))
            .field("Status", status())
            .field("Tags", Type::list(Type::String))
            .into_type()
    }

    fn status() -> Type { Type::enumeration(EnumType::new("MyApp.Status", [("Active", 1), ("Retired", 2)])) }

    fn compile(text: &str) -> Result<CompiledLambda, ParseError> {
        let locator = TypeMap::new().with(status());
        CompiledLambda::compile(&parse_expression(text)?, &person(), "it", Some(&locator))
    }

    fn canonical(text: &str) -> String { compile(text).unwrap().to_string() }

    #[test]
    fn test_implicit_members_become_explicit() {
        assert_eq!(canonical("Age > 18"), "it => (it.Age > 18)");
        assert_eq!(canonical("p => p.name == \"foo\""), "p => (p.Name == \"foo\")");
        assert_eq!(canonical("Tags.Any(t => t.StartsWith(\"a\"))"), "it => it.Tags.Any(t => t.StartsWith(\"a\"))");
    }

    #[test]
    fn test_enum_resolution() {
        assert_eq!(canonical("Status == MyApp.Status.Retired"), "it => (it.Status == 2)");
        assert_eq!(canonical("Status == (MyApp.Status)1"), "it => (it.Status == 1)");
        assert_eq!(canonical("Status == \"Active\""), "it => (it.Status == 1)");
        let err = compile("Status == (Other.Kind)1").unwrap_err();
        assert!(err.message.contains("Unknown type"), "{}", err);
    }

    #[test]
    fn test_type_errors() {
        assert!(compile("Name > 5").is_err());
        assert!(compile("Age && true").is_err());
        assert!(compile("Missing == 1").unwrap_err().message.contains("Unknown identifier"));
        assert!(compile("Name.Frobnicate()").is_err());
        assert!(compile("Age == (t => t)").is_err());
        assert!(compile("(byte)300 == Age").is_err());
    }

    #[test]
    fn test_numeric_widening_is_allowed() {
        assert_eq!(canonical("Score > 50"), "it => (it.Score > 50)");
        assert_eq!(canonical("Age == 5L"), "it => (it.Age == 5L)");
        assert_eq!(canonical("(long)5 + Age > 6"), "it => ((5L + it.Age) > 6)");
    }

    #[test]
    fn test_predicates_must_be_boolean() {
        let locator = TypeMap::new();
        let expr = parse_expression("Age + 1").unwrap();
        assert!(CompiledLambda::predicate(&expr, &person(), "it", Some(&locator)).is_err());
        assert_eq!(compile("Age + 1").unwrap().result_type(), &Type::I32);
    }
}
