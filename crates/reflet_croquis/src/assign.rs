//! Statement execution with scope write-back.
//!
//! Two-way binding runs expression text like `done = !done` or
//! `user.tags[1] = 'x'` as a statement: every top-level scope key is
//! available as a writable local, and locals whose final value changed
//! are reported back for the caller to write into the owning store.

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use reflet_carton::Value;

use crate::ast::{Expr, Stmt};
use crate::errors::ExpressionError;
use crate::eval::{evaluate_expr, Scope};
use crate::parser::parse_statement;

/// A parsed statement ready to execute against a writable environment.
#[derive(Debug, Clone)]
pub struct Assignment {
    stmt: Stmt,
    source: String,
}

/// Parse `expression` as a statement. Malformed syntax is an error here,
/// before anything executes.
pub fn compile_assignment(expression: &str) -> Result<Assignment, ExpressionError> {
    Ok(Assignment {
        stmt: parse_statement(expression)?,
        source: expression.to_string(),
    })
}

impl Assignment {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The root scope key the statement writes through, if any.
    pub fn target_root(&self) -> Option<&str> {
        match &self.stmt {
            Stmt::Assign(target, _) => target.root_ident(),
            Stmt::Expr(_) => None,
        }
    }

    /// Execute against `env` and return the top-level keys whose value
    /// changed. A bare expression statement still evaluates (its calls
    /// may have effects) but changes nothing.
    pub fn run(
        &self,
        env: &mut FxHashMap<CompactString, Value>,
    ) -> Result<Vec<CompactString>, ExpressionError> {
        let undef = Value::Undefined;
        match &self.stmt {
            Stmt::Expr(expr) => {
                evaluate_expr(Scope::new(&undef, env), expr)?;
                Ok(Vec::new())
            }
            Stmt::Assign(target, rhs) => {
                let value = evaluate_expr(Scope::new(&undef, env), rhs)?;
                let path = resolve_target(env, target)?;
                let before = env.get(&path.root).cloned();
                write_env(env, &path, value)?;
                if env.get(&path.root) != before.as_ref() {
                    Ok(vec![path.root])
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }
}

/// Write `value` through an identifier / member / index chain given as
/// expression text, without parsing a right-hand side. This is the
/// primitive the two-way-binding write-back builds on: the bound value is
/// already a `Value`, so embedding it in statement text (and the quoting
/// bugs that invites) is never necessary.
pub fn assign_value(
    env: &mut FxHashMap<CompactString, Value>,
    target: &str,
    value: Value,
) -> Result<Vec<CompactString>, ExpressionError> {
    let expr = crate::parser::parse_expression(target)?;
    let path = resolve_target(env, &expr)?;
    let before = env.get(&path.root).cloned();
    write_env(env, &path, value)?;
    if env.get(&path.root) != before.as_ref() {
        Ok(vec![path.root])
    } else {
        Ok(Vec::new())
    }
}

struct TargetPath {
    root: CompactString,
    segments: Vec<String>,
}

/// Flatten an identifier / member / index chain into a root key plus
/// string segments, evaluating index expressions against `env`.
fn resolve_target(
    env: &FxHashMap<CompactString, Value>,
    target: &Expr,
) -> Result<TargetPath, ExpressionError> {
    let undef = Value::Undefined;
    let mut segments = Vec::new();
    let mut cur = target;
    loop {
        match cur {
            Expr::Ident(name) => {
                if !env.contains_key(name) {
                    return Err(ExpressionError::UnknownIdentifier(name.clone()));
                }
                segments.reverse();
                return Ok(TargetPath {
                    root: name.clone(),
                    segments,
                });
            }
            Expr::Member(base, key) => {
                segments.push(key.to_string());
                cur = base.as_ref();
            }
            Expr::Index(base, index) => {
                let key = evaluate_expr(Scope::new(&undef, env), index)?.render_text();
                segments.push(key);
                cur = base.as_ref();
            }
            _ => return Err(ExpressionError::InvalidAssignTarget),
        }
    }
}

fn write_env(
    env: &mut FxHashMap<CompactString, Value>,
    path: &TargetPath,
    value: Value,
) -> Result<(), ExpressionError> {
    let root = env
        .get_mut(&path.root)
        .ok_or_else(|| ExpressionError::UnknownIdentifier(path.root.clone()))?;
    let Some((leaf, container_path)) = path.segments.split_last() else {
        *root = value;
        return Ok(());
    };
    let container =
        root.get_path_mut(container_path)
            .ok_or_else(|| ExpressionError::NotAnObject {
                key: leaf.clone(),
                kind: "undefined",
            })?;
    if !container.set_key(leaf, value) {
        return Err(ExpressionError::NotAnObject {
            key: leaf.clone(),
            kind: "primitive",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_fixture() -> FxHashMap<CompactString, Value> {
        let mut env = FxHashMap::default();
        env.insert(CompactString::from("done"), Value::Bool(false));
        let mut user = Value::object();
        user.set_key(
            "tags",
            Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]),
        );
        env.insert(CompactString::from("user"), user);
        env
    }

    #[test]
    fn toggles_a_root_key() {
        let mut env = env_fixture();
        let assignment = compile_assignment("done = !done").unwrap();
        let changed = assignment.run(&mut env).unwrap();
        assert_eq!(changed, vec![CompactString::from("done")]);
        assert_eq!(env.get("done"), Some(&Value::Bool(true)));
    }

    #[test]
    fn writes_through_nested_paths() {
        let mut env = env_fixture();
        let assignment = compile_assignment("user.tags[1] = 'z'").unwrap();
        let changed = assignment.run(&mut env).unwrap();
        assert_eq!(changed, vec![CompactString::from("user")]);
        assert_eq!(
            env.get("user").unwrap().get_path(&["tags", "1"]),
            Some(&Value::Str("z".into()))
        );
    }

    #[test]
    fn unchanged_write_reports_nothing() {
        let mut env = env_fixture();
        let assignment = compile_assignment("done = false").unwrap();
        assert!(assignment.run(&mut env).unwrap().is_empty());
    }

    #[test]
    fn assign_value_writes_without_rhs_parsing() {
        let mut env = env_fixture();
        let changed = assign_value(&mut env, "user.tags[0]", Value::Str("it's".into())).unwrap();
        assert_eq!(changed, vec![CompactString::from("user")]);
        assert_eq!(
            env.get("user").unwrap().get_path(&["tags", "0"]),
            Some(&Value::Str("it's".into()))
        );
    }

    #[test]
    fn unknown_target_root_is_an_error() {
        let mut env = env_fixture();
        let assignment = compile_assignment("missing = 1").unwrap();
        assert!(matches!(
            assignment.run(&mut env),
            Err(ExpressionError::UnknownIdentifier(_))
        ));
    }
}
