//! Tree-walking evaluator.

use super::{
    Context, ExprError, builtins,
    context::SCOPE_NAME,
    parser::{AssignOp, BinaryOp, Expr, LogicalOp, UnaryOp},
    value::Value,
};
use std::cmp::Ordering;

/// Largest gap allowed when assigning past the end of an array.
const MAX_ARRAY_GROWTH: usize = 1024;

impl Context {
    /// Evaluate a parsed expression.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => match self.get(name) {
                Some(value) => Ok(value.clone()),
                None if name == SCOPE_NAME => Ok(Value::Object(self.scope().clone())),
                None => Err(ExprError::Reference(name.clone())),
            },
            Expr::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Object(entries) => {
                let mut map = super::Object::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.evaluate(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.chain(expr)?.unwrap_or_default()),
            Expr::Unary { op, operand } => self.unary(*op, operand),
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary(*op, left, right))
            }
            Expr::Logical { op, left, right } => {
                let left = self.evaluate(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                    LogicalOp::Nullish => !left.is_nullish(),
                };
                if short_circuit { Ok(left) } else { self.evaluate(right) }
            }
            Expr::Conditional { test, consequent, alternate } => {
                if self.evaluate(test)?.is_truthy() {
                    self.evaluate(consequent)
                } else {
                    self.evaluate(alternate)
                }
            }
            Expr::Assign { op, target, value } => self.assign(*op, target, value),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Value, ExprError> {
        // `typeof missing` is "undefined", not a ReferenceError
        if op == UnaryOp::TypeOf
            && let Expr::Ident(name) = operand
            && self.get(name).is_none()
            && name != SCOPE_NAME
        {
            return Ok("undefined".into());
        }

        let value = self.evaluate(operand)?;
        Ok(match op {
            UnaryOp::Not => (!value.is_truthy()).into(),
            UnaryOp::Neg => (-value.to_number()).into(),
            UnaryOp::Plus => value.to_number().into(),
            UnaryOp::TypeOf => value.type_of().into(),
        })
    }

    /// Evaluate a member/call chain. `None` means an optional link hit a
    /// nullish value and the rest of the chain was skipped.
    fn chain(&mut self, expr: &Expr) -> Result<Option<Value>, ExprError> {
        match expr {
            Expr::Member { object, property, optional } => {
                let Some(target) = self.chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.evaluate(property)?.to_display();
                read_property(&target, &key, object).map(Some)
            }
            Expr::Call { callee, args } => match callee.as_ref() {
                Expr::Member { object, property, optional } => {
                    let Some(target) = self.chain(object)? else {
                        return Ok(None);
                    };
                    if *optional && target.is_nullish() {
                        return Ok(None);
                    }
                    let name = self.evaluate(property)?.to_display();
                    let args = self.arguments(args)?;
                    call_member(&target, &name, &args, object).map(Some)
                }
                other => {
                    let Some(callee_value) = self.chain(other)? else {
                        return Ok(None);
                    };
                    let args = self.arguments(args)?;
                    match callee_value {
                        Value::Function(f) => f(&args).map(Some),
                        _ => Err(ExprError::type_error(format!(
                            "{} is not a function",
                            label(other)
                        ))),
                    }
                }
            },
            other => self.evaluate(other).map(Some),
        }
    }

    fn arguments(&mut self, args: &[Expr]) -> Result<Vec<Value>, ExprError> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    fn assign(&mut self, op: AssignOp, target: &Expr, value: &Expr) -> Result<Value, ExprError> {
        let (root, keys) = self.assign_path(target)?;
        let rhs = self.evaluate(value)?;
        let new_value = match op {
            AssignOp::Set => rhs,
            AssignOp::Add => binary(BinaryOp::Add, self.evaluate(target)?, rhs),
            AssignOp::Sub => binary(BinaryOp::Sub, self.evaluate(target)?, rhs),
        };

        if keys.is_empty() {
            self.set(root, new_value.clone());
            return Ok(new_value);
        }

        if !self.scope().contains_key(&root) {
            return Err(if self.builtins().contains(&root) {
                ExprError::type_error(format!("cannot modify builtin `{root}`"))
            } else {
                ExprError::Reference(root)
            });
        }

        let mut slot = self
            .scope_mut()
            .get_mut(&root)
            .ok_or_else(|| ExprError::Reference(root.clone()))?;
        for key in keys {
            slot = match slot {
                Value::Object(map) => map.entry(key).or_default(),
                Value::Array(items) => {
                    let index = key.parse::<usize>().map_err(|_| {
                        ExprError::type_error(format!("invalid array index `{key}`"))
                    })?;
                    if index > items.len() + MAX_ARRAY_GROWTH {
                        return Err(ExprError::type_error(format!(
                            "array index {index} out of range"
                        )));
                    }
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    &mut items[index]
                }
                other => {
                    return Err(ExprError::type_error(format!(
                        "cannot set properties of {} (setting '{key}')",
                        other.to_display()
                    )));
                }
            };
        }
        *slot = new_value.clone();
        Ok(new_value)
    }

    /// Root name and property keys of an assignment target, evaluated left to right.
    fn assign_path(&mut self, target: &Expr) -> Result<(String, Vec<String>), ExprError> {
        match target {
            Expr::Ident(name) => Ok((name.clone(), Vec::new())),
            Expr::Member { object, property, .. } => {
                let (root, mut keys) = self.assign_path(object)?;
                keys.push(self.evaluate(property)?.to_display());
                Ok((root, keys))
            }
            other => Err(ExprError::type_error(format!(
                "invalid assignment target `{}`",
                label(other)
            ))),
        }
    }
}

fn read_property(target: &Value, key: &str, object: &Expr) -> Result<Value, ExprError> {
    match target {
        Value::Undefined | Value::Null => Err(ExprError::type_error(format!(
            "cannot read properties of {} (reading '{key}') in `{}`",
            target.to_display(),
            label(object)
        ))),
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or_default()),
        other => Ok(builtins::property(other, key)),
    }
}

fn call_member(target: &Value, name: &str, args: &[Value], object: &Expr) -> Result<Value, ExprError> {
    match target {
        Value::Object(map) => match map.get(name) {
            Some(Value::Function(f)) => f(args),
            _ => Err(ExprError::type_error(format!(
                "{}.{name} is not a function",
                label(object)
            ))),
        },
        other => builtins::call_method(other, name, args).unwrap_or_else(|| {
            if other.is_nullish() {
                read_property(other, name, object)
            } else {
                Err(ExprError::type_error(format!(
                    "{}.{name} is not a function",
                    label(object)
                )))
            }
        }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));
    match op {
        BinaryOp::Add => {
            let textual = |v: &Value| !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_));
            if textual(&left) || textual(&right) {
                Value::String(left.to_display() + &right.to_display())
            } else {
                num(|a, b| a + b)
            }
        }
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Lt => compare(&left, &right).is_some_and(Ordering::is_lt).into(),
        BinaryOp::Gt => compare(&left, &right).is_some_and(Ordering::is_gt).into(),
        BinaryOp::Le => compare(&left, &right).is_some_and(Ordering::is_le).into(),
        BinaryOp::Ge => compare(&left, &right).is_some_and(Ordering::is_ge).into(),
        BinaryOp::Eq => left.loose_equals(&right).into(),
        BinaryOp::Ne => (!left.loose_equals(&right)).into(),
        BinaryOp::StrictEq => left.strict_equals(&right).into(),
        BinaryOp::StrictNe => (!left.strict_equals(&right)).into(),
    }
}

/// Relational ordering: strings compare lexically, everything else numerically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

/// Short source-like rendering of an expression for error messages.
fn label(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member { object, property, optional } => {
            let dot = if *optional { "?." } else { "." };
            match property.as_ref() {
                Expr::Literal(Value::String(key)) => format!("{}{dot}{key}", label(object)),
                _ => format!("{}[...]", label(object)),
            }
        }
        Expr::Call { callee, .. } => format!("{}(...)", label(callee)),
        Expr::Literal(value) => format!("{value:?}"),
        _ => "expression".into(),
    }
}

// ============================================================================
// Tests
// ============================================================================
