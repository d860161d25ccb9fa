use crate::ast::{CallTarget, Expr, Literal, UnaryOperator};
use crate::literal;

/// Render an expression tree as canonical expression text.
///
/// Every binary, unary and conditional node is parenthesized, so the output never depends on operator
/// precedence, and feeding the output back through `parse_expression` yields an equivalent tree.
pub fn serialize(expr: &Expr) -> String {
    let mut buffer = String::new();
    write_expr(expr, &mut buffer);
    buffer
}

fn write_expr(expr: &Expr, buffer: &mut String) {
    match expr {
        Expr::Literal(lit) => write_literal(lit, buffer),
        Expr::Parameter(name) => buffer.push_str(name),
        Expr::Member { target, name } => {
            write_receiver(target, buffer);
            buffer.push('.');
            buffer.push_str(name);
        }
        Expr::Index { target, index } => {
            write_receiver(target, buffer);
            buffer.push('[');
            write_expr(index, buffer);
            buffer.push(']');
        }
        Expr::Binary { operator, left, right } => {
            buffer.push('(');
            write_expr(left, buffer);
            buffer.push(' ');
            buffer.push_str(operator.symbol());
            buffer.push(' ');
            write_expr(right, buffer);
            buffer.push(')');
        }
        Expr::Unary { operator, operand } => {
            buffer.push_str(match operator {
                UnaryOperator::Not => "(!(",
                UnaryOperator::Negate => "(-(",
            });
            write_expr(operand, buffer);
            buffer.push_str("))");
        }
        Expr::Conditional { test, then, otherwise } => {
            buffer.push('(');
            write_expr(test, buffer);
            buffer.push_str(" ? ");
            write_expr(then, buffer);
            buffer.push_str(" : ");
            write_expr(otherwise, buffer);
            buffer.push(')');
        }
        Expr::Call { target, method, args } => {
            match target {
                CallTarget::Instance(receiver) => write_receiver(receiver, buffer),
                CallTarget::Static(name) => buffer.push_str(name),
            }
            buffer.push('.');
            buffer.push_str(method);
            write_arguments(args, buffer);
        }
        Expr::Lambda { parameter, body } => {
            buffer.push_str(parameter);
            buffer.push_str(" => ");
            write_expr(body, buffer);
        }
        Expr::NewArray { element_type, elements } => {
            buffer.push_str("new ");
            // the element type only matters when there is nothing to infer it from
            if let (Some(ty), true) = (element_type, elements.is_empty()) {
                buffer.push_str(&ty.to_string());
            }
            buffer.push_str("[] { ");
            for (i, element) in elements.iter().enumerate() {
                if i > 0 {
                    buffer.push_str(", ");
                }
                write_expr(element, buffer);
            }
            if !elements.is_empty() {
                buffer.push(' ');
            }
            buffer.push('}');
        }
        Expr::Cast { ty, expr } => {
            buffer.push('(');
            buffer.push_str(&ty.to_string());
            buffer.push(')');
            write_receiver(expr, buffer);
        }
    }
}

/// Array literals and negative numbers get an extra pair of parentheses when something is chained onto them.
fn write_receiver(expr: &Expr, buffer: &mut String) {
    let wrap = match expr {
        Expr::NewArray { .. } | Expr::Lambda { .. } => true,
        Expr::Literal(lit) => is_negative(lit),
        _ => false,
    };
    if wrap {
        buffer.push('(');
        write_expr(expr, buffer);
        buffer.push(')');
    } else {
        write_expr(expr, buffer);
    }
}

fn write_arguments(args: &[Expr], buffer: &mut String) {
    buffer.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            buffer.push_str(", ");
        }
        write_expr(arg, buffer);
    }
    buffer.push(')');
}

fn is_negative(lit: &Literal) -> bool {
    match lit {
        Literal::I32(i) => *i < 0,
        Literal::I64(i) => *i < 0 && *i != i64::MIN,
        Literal::F32(f) => f.is_sign_negative(),
        Literal::F64(f) => f.is_sign_negative(),
        Literal::Enum { value, .. } => *value < 0,
        _ => false,
    }
}

fn write_literal(lit: &Literal, buffer: &mut String) {
    match lit {
        Literal::Null => buffer.push_str("null"),
        Literal::Bool(b) => buffer.push_str(if *b { "true" } else { "false" }),
        Literal::I32(i) => buffer.push_str(&i.to_string()),
        // the magnitude of i64::MIN does not fit in a long, so it cannot be written as a negated literal
        Literal::I64(i64::MIN) => buffer.push_str("(-9223372036854775807 - 1L)"),
        Literal::I64(i) => {
            buffer.push_str(&i.to_string());
            // small longs need the suffix to stay longs
            if i32::try_from(*i).is_ok() {
                buffer.push('L');
            }
        }
        Literal::F32(f) => write_float(f.to_string(), buffer),
        Literal::F64(f) => write_float(f.to_string(), buffer),
        Literal::String(s) => write_string(s, buffer),
        Literal::Enum { value, .. } => buffer.push_str(&value.to_string()),
        Literal::Guid(guid) => write_factory("Guid", &literal::format_guid(guid), buffer),
        Literal::DateTime { value, styles } => {
            buffer.push_str("DateTime.Parse(");
            write_string(&literal::format_date_time(value), buffer);
            if let Some(flags) = styles {
                buffer.push_str(", CultureInfo.InvariantCulture, (DateTimeStyles)");
                buffer.push_str(&flags.to_string());
            }
            buffer.push(')');
        }
        Literal::DateTimeOffset(value) => write_factory("DateTimeOffset", &literal::format_date_time_offset(value), buffer),
        Literal::Date(value) => write_factory("DateOnly", &literal::format_date(value), buffer),
        Literal::Time(value) => write_factory("TimeOnly", &literal::format_time(value), buffer),
    }
}

/// Rust's float Display is already the shortest round-trippable form; integral values keep a `.0`
/// so they are not read back as integers.
fn write_float(text: String, buffer: &mut String) {
    let integral = text.bytes().all(|b| b.is_ascii_digit() || b == b'-');
    buffer.push_str(&text);
    if integral {
        buffer.push_str(".0");
    }
}

fn write_factory(type_name: &str, text: &str, buffer: &mut String) {
    buffer.push_str(type_name);
    buffer.push_str(".Parse(");
    write_string(text, buffer);
    buffer.push(')');
}

fn write_string(s: &str, buffer: &mut String) {
    buffer.push('"');
    for c in s.chars() {
        match c {
            '"' => buffer.push_str("\\\""),
            '\\' => buffer.push_str("\\\\"),
            '\n' => buffer.push_str("\\n"),
            '\r' => buffer.push_str("\\r"),
            '\t' => buffer.push_str("\\t"),
            '\0' => buffer.push_str("\\0"),
            c if c.is_control() => buffer.push_str(&format!("\\u{:04x}", c as u32)),
            c => buffer.push(c),
        }
    }
    buffer.push('"');
}
