//! Expression interpreter.

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use reflet_carton::Value;

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::errors::ExpressionError;
use crate::parser::parse_expression;

/// The names visible to an expression at one tree position: the store's
/// data keys overlaid with the loop-binding aliases in scope there.
/// Aliases shadow same-named data keys.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub data: &'a Value,
    pub locals: &'a FxHashMap<CompactString, Value>,
}

impl<'a> Scope<'a> {
    pub fn new(data: &'a Value, locals: &'a FxHashMap<CompactString, Value>) -> Self {
        Self { data, locals }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| self.data.get_key(name))
    }
}

/// Resolve `expression` against `scope`.
pub fn evaluate(scope: Scope<'_>, expression: &str) -> Result<Value, ExpressionError> {
    let expr = parse_expression(expression)?;
    evaluate_expr(scope, &expr)
}

/// Resolve `expression`, invoking the result when it is callable: a bare
/// reference to a function is called with no arguments, and a
/// `name(a, b)` form calls through the interpreter's call path (which
/// fails with `NotCallable` when the callee is not a function).
pub fn evaluate_callable(scope: Scope<'_>, expression: &str) -> Result<Value, ExpressionError> {
    let value = evaluate(scope, expression)?;
    match value {
        Value::Func(f) => Ok(f.call(&[])),
        other => Ok(other),
    }
}

/// Interpret an already-parsed expression.
pub fn evaluate_expr(scope: Scope<'_>, expr: &Expr) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => scope
            .lookup(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownIdentifier(name.clone())),
        Expr::Member(base, key) => member(scope, base, key),
        Expr::Index(base, index) => {
            let key = evaluate_expr(scope, index)?.render_text();
            member(scope, base, &key)
        }
        Expr::Call(callee, args) => {
            let target = evaluate_expr(scope, callee)?;
            let Value::Func(f) = target else {
                let name = callee.root_ident().unwrap_or("expression");
                return Err(ExpressionError::NotCallable(name.to_string()));
            };
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate_expr(scope, arg)?);
            }
            Ok(f.call(&evaluated))
        }
        Expr::Unary(op, operand) => {
            let value = evaluate_expr(scope, operand)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Neg => Value::Number(-value.as_number().unwrap_or(f64::NAN)),
            })
        }
        Expr::Binary(op, lhs, rhs) => binary(scope, *op, lhs, rhs),
        Expr::Ternary(cond, then, otherwise) => {
            if evaluate_expr(scope, cond)?.is_truthy() {
                evaluate_expr(scope, then)
            } else {
                evaluate_expr(scope, otherwise)
            }
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate_expr(scope, item)?);
            }
            Ok(Value::Array(out))
        }
    }
}

fn member(scope: Scope<'_>, base: &Expr, key: &str) -> Result<Value, ExpressionError> {
    let container = evaluate_expr(scope, base)?;
    match &container {
        Value::Undefined | Value::Null => Err(ExpressionError::NotAnObject {
            key: key.to_string(),
            kind: if matches!(container, Value::Null) {
                "null"
            } else {
                "undefined"
            },
        }),
        Value::Array(items) if key == "length" => Ok(Value::Number(items.len() as f64)),
        Value::Str(s) if key == "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => Ok(other.get_key(key).cloned().unwrap_or_default()),
    }
}

fn binary(scope: Scope<'_>, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, ExpressionError> {
    // Logical operators short-circuit and return an operand value
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let left = evaluate_expr(scope, lhs)?;
        return match op {
            BinaryOp::And if !left.is_truthy() => Ok(left),
            BinaryOp::Or if left.is_truthy() => Ok(left),
            _ => evaluate_expr(scope, rhs),
        };
    }

    let left = evaluate_expr(scope, lhs)?;
    let right = evaluate_expr(scope, rhs)?;
    Ok(match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Value::Str(format!("{}{}", left.render_text(), right.render_text()))
            }
            _ => Value::Number(
                left.as_number().unwrap_or(f64::NAN) + right.as_number().unwrap_or(f64::NAN),
            ),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = (
                left.as_number().unwrap_or(f64::NAN),
                right.as_number().unwrap_or(f64::NAN),
            );
            Value::Number(match op {
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            })
        }
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            Value::Bool(compare(op, &left, &right))
        }
        BinaryOp::Eq => Value::Bool(loose_eq(&left, &right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(&left, &right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNotEq => Value::Bool(left != right),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    })
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            _ => a >= b,
        };
    }
    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return false;
    };
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        _ => a >= b,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
        (Value::Number(_) | Value::Bool(_) | Value::Str(_), _)
        | (_, Value::Number(_) | Value::Bool(_) | Value::Str(_)) => {
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_fixture() -> (Value, FxHashMap<CompactString, Value>) {
        let mut data = Value::object();
        data.set_key("count", Value::Number(2.0));
        data.set_key("name", Value::Str("ada".into()));
        data.set_key(
            "items",
            Value::Array(vec![
                Value::Number(10.0),
                Value::Number(20.0),
                Value::Number(30.0),
            ]),
        );
        let mut user = Value::object();
        user.set_key("admin", Value::Bool(true));
        data.set_key("user", user);
        data.set_key(
            "double",
            Value::func(|args| {
                Value::Number(args.first().and_then(Value::as_number).unwrap_or(0.0) * 2.0)
            }),
        );
        (data, FxHashMap::default())
    }

    #[test]
    fn resolves_members_indexes_and_calls() {
        let (data, locals) = scope_fixture();
        let scope = Scope::new(&data, &locals);
        assert_eq!(
            evaluate(scope, "items[1] + count").unwrap(),
            Value::Number(22.0)
        );
        assert_eq!(
            evaluate(scope, "user.admin ? 'yes' : 'no'").unwrap(),
            Value::Str("yes".into())
        );
        assert_eq!(evaluate(scope, "double(21)").unwrap(), Value::Number(42.0));
        assert_eq!(evaluate(scope, "items.length").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn locals_shadow_data_keys() {
        let (data, mut locals) = scope_fixture();
        locals.insert("count".into(), Value::Number(99.0));
        let scope = Scope::new(&data, &locals);
        assert_eq!(evaluate(scope, "count").unwrap(), Value::Number(99.0));
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let (data, locals) = scope_fixture();
        let scope = Scope::new(&data, &locals);
        assert!(matches!(
            evaluate(scope, "missing + 1"),
            Err(ExpressionError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn callable_resolution_invokes_bare_references() {
        let (mut data, locals) = scope_fixture();
        data.set_key("greet", Value::func(|_| Value::Str("hi".into())));
        let scope = Scope::new(&data, &locals);
        assert_eq!(
            evaluate_callable(scope, "greet").unwrap(),
            Value::Str("hi".into())
        );
        assert_eq!(
            evaluate_callable(scope, "count").unwrap(),
            Value::Number(2.0)
        );
        assert!(matches!(
            evaluate_callable(scope, "count(1)"),
            Err(ExpressionError::NotCallable(_))
        ));
    }

    #[test]
    fn equality_modes() {
        let (data, locals) = scope_fixture();
        let scope = Scope::new(&data, &locals);
        assert_eq!(evaluate(scope, "'2' == 2").unwrap(), Value::Bool(true));
        assert_eq!(evaluate(scope, "'2' === 2").unwrap(), Value::Bool(false));
        assert_eq!(
            evaluate(scope, "null == undefined").unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            evaluate(scope, "null === undefined").unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn logical_operators_return_operands() {
        let (data, locals) = scope_fixture();
        let scope = Scope::new(&data, &locals);
        assert_eq!(
            evaluate(scope, "name && count").unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            evaluate(scope, "'' || 'fallback'").unwrap(),
            Value::Str("fallback".into())
        );
    }
}
