//! Evaluation scope.

use super::{
    Builtins, ExprError,
    parser::{LoopBinding, Pattern, parse},
    value::{Object, Value},
};
use std::sync::Arc;

/// Name under which an expression can read its whole scope, unless shadowed.
pub const SCOPE_NAME: &str = "locals";

/// Names visible to an expression: mutable page data plus shared builtins.
///
/// A context is deliberately not `Clone`: copies for loop bodies go through
/// [`Context::sandbox`], which keeps only plain data.
pub struct Context {
    scope: Object,
    builtins: Arc<Builtins>,
}

impl Context {
    pub fn new(scope: Object, builtins: Arc<Builtins>) -> Self {
        Self { scope, builtins }
    }

    /// Context with the standard builtins and an empty scope.
    pub fn standard() -> Self {
        Self::new(Object::new(), Arc::new(Builtins::standard()))
    }

    /// Look up a name; scope entries shadow builtins.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scope.get(name).or_else(|| self.builtins.get(name))
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.scope.insert(name.into(), value);
    }

    #[inline]
    pub fn scope(&self) -> &Object {
        &self.scope
    }

    #[inline]
    pub(super) fn scope_mut(&mut self) -> &mut Object {
        &mut self.scope
    }

    #[inline]
    pub(super) fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Parse and evaluate `source` against this context.
    pub fn eval(&mut self, source: &str) -> Result<Value, ExprError> {
        let expr = parse(source)?;
        self.evaluate(&expr)
    }

    /// Independent deep copy of the plain data in scope.
    ///
    /// Function values are dropped (see [`Value::detached`]); builtins stay
    /// shared. Writes inside the copy never reach `self`.
    pub fn sandbox(&self) -> Self {
        Self {
            scope: self
                .scope
                .iter()
                .filter_map(|(k, v)| v.detached().map(|v| (k.clone(), v)))
                .collect(),
            builtins: Arc::clone(&self.builtins),
        }
    }

    /// Bind `value` to the names in `pattern`.
    pub fn bind(&mut self, pattern: &Pattern, value: Value) -> Result<(), ExprError> {
        match pattern {
            Pattern::Ident(name) => self.set(name.as_str(), value),
            Pattern::Array(names) => {
                let items = into_items(value)?;
                for (i, name) in names.iter().enumerate() {
                    if let Some(name) = name {
                        self.set(name.as_str(), items.get(i).cloned().unwrap_or_default());
                    }
                }
            }
            Pattern::Object(names) => {
                if value.is_nullish() {
                    return Err(ExprError::type_error(format!(
                        "cannot destructure {}",
                        value.to_display()
                    )));
                }
                for name in names {
                    let field = match &value {
                        Value::Object(map) => map.get(name).cloned().unwrap_or_default(),
                        other => super::builtins::property(other, name),
                    };
                    self.set(name.as_str(), field);
                }
            }
        }
        Ok(())
    }

    /// Evaluate the iterable of a loop binding to its list of items.
    pub fn iterate(&mut self, binding: &LoopBinding) -> Result<Vec<Value>, ExprError> {
        let iterable = self.evaluate(&binding.iterable)?;
        into_items(iterable)
    }
}

/// Items of an iterable value: arrays yield elements, strings yield characters.
fn into_items(value: Value) -> Result<Vec<Value>, ExprError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::String(s) => Ok(s.chars().map(|c| c.to_string().into()).collect()),
        other => Err(ExprError::type_error(format!(
            "{} is not iterable",
            other.type_of()
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_binding;

    #[test]
    fn test_sandbox_isolates_writes() {
        let mut ctx = Context::standard();
        ctx.set("page", Value::object([("title", Value::from("Home"))]));

        let mut inner = ctx.sandbox();
        inner.eval("page.title = 'Changed'").unwrap();
        inner.eval("extra = 1").unwrap();

        assert_eq!(ctx.eval("page.title").unwrap(), Value::from("Home"));
        assert!(ctx.get("extra").is_none());
        assert_eq!(inner.eval("page.title").unwrap(), Value::from("Changed"));
    }

    #[test]
    fn test_sandbox_drops_functions_keeps_builtins() {
        let mut ctx = Context::standard();
        ctx.set("helper", Value::function(|_| Ok(Value::from("hi"))));
        assert_eq!(ctx.eval("helper()").unwrap(), Value::from("hi"));

        let mut inner = ctx.sandbox();
        assert!(inner.get("helper").is_none());
        assert_eq!(inner.eval("String(1 + 1)").unwrap(), Value::from("2"));
    }

    #[test]
    fn test_bind_patterns() {
        let mut ctx = Context::standard();
        ctx.bind(
            &Pattern::Array(vec![None, Some("b".into())]),
            Value::from(vec!["x", "y"]),
        )
        .unwrap();
        assert_eq!(ctx.get("b"), Some(&Value::from("y")));

        ctx.bind(
            &Pattern::Object(vec!["name".into(), "missing".into()]),
            Value::object([("name", Value::from("n"))]),
        )
        .unwrap();
        assert_eq!(ctx.get("name"), Some(&Value::from("n")));
        assert_eq!(ctx.get("missing"), Some(&Value::Undefined));

        assert!(ctx.bind(&Pattern::Object(vec!["a".into()]), Value::Null).is_err());
    }

    #[test]
    fn test_iterate() {
        let mut ctx = Context::standard();
        ctx.set("posts", Value::from(vec!["a", "b"]));
        let binding = parse_binding("post of posts").unwrap();
        assert_eq!(ctx.iterate(&binding).unwrap().len(), 2);

        let chars = parse_binding("c of 'hey'").unwrap();
        assert_eq!(ctx.iterate(&chars).unwrap().len(), 3);

        let number = parse_binding("x of 5").unwrap();
        assert!(matches!(ctx.iterate(&number), Err(ExprError::Type(_))));

        let missing = parse_binding("x of nope").unwrap();
        assert!(matches!(ctx.iterate(&missing), Err(ExprError::Reference(_))));
    }
}
