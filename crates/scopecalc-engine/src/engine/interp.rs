//! Tree-walking interpreter over [`Expr`] trees.
//!
//! Identifiers resolve against an [`EvaluationContext`]; `@module.fn(...)`
//! calls dispatch into a [`ModuleSet`]. A called function sees only its own
//! parameters (plus the module set), never the caller's bindings.

use std::collections::BTreeMap;

use super::Value;
use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::error::EvalError;
use super::format::format_number;
use super::module::{Callable, CompiledModule, FunctionModule};

/// Nested module calls allowed before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 64;

/// Nested evaluation steps allowed, counted across function calls.
pub const MAX_EVAL_DEPTH: usize = 512;

/// One link of a left-nested operator chain.
enum Link<'e> {
    Binary(BinaryOp, &'e Expr),
    Logical(LogicalOp, &'e Expr),
}

/// Insertion-ordered identifier bindings.
///
/// Rebinding a name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationContext {
    entries: Vec<(String, Value)>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn bind(&mut self, name: &str, value: Value) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every compiled module of one evaluation pass, keyed by module name.
#[derive(Clone, Debug, Default)]
pub struct ModuleSet {
    modules: BTreeMap<String, CompiledModule>,
}

impl ModuleSet {
    /// Compile each module once. When two modules share a name, the later one wins.
    pub fn compile(modules: &[FunctionModule]) -> Self {
        let mut set = ModuleSet::default();
        for module in modules {
            let compiled = module.compile();
            log::debug!(
                "compiled module {} ({} functions, {} skipped)",
                module.name,
                compiled.functions.len(),
                compiled.diagnostics.len()
            );
            set.modules.insert(module.name.clone(), compiled);
        }
        set
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CompiledModule> {
        self.modules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

/// Evaluates expressions against a module set.
pub struct Interpreter<'a> {
    modules: &'a ModuleSet,
}

impl<'a> Interpreter<'a> {
    pub fn new(modules: &'a ModuleSet) -> Self {
        Interpreter { modules }
    }

    /// Evaluate a top-level expression.
    pub fn evaluate(&self, expr: &Expr, context: &EvaluationContext) -> Result<Value, EvalError> {
        let value = self.eval(expr, context, 0, 0)?;
        finite(value)
    }

    /// Call `module.function` with already evaluated arguments.
    pub fn call(&self, module: &str, function: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        self.invoke(module, function, args, 0, 0)
    }

    fn eval(
        &self,
        expr: &Expr,
        context: &EvaluationContext,
        calls: usize,
        nesting: usize,
    ) -> Result<Value, EvalError> {
        if nesting >= MAX_EVAL_DEPTH {
            return Err(EvalError::TooDeep(MAX_EVAL_DEPTH));
        }
        let nesting = nesting + 1;
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Identifier(name) => context
                .get(name)
                .cloned()
                .ok_or_else(|| EvalError::UndefinedLocal(name.clone())),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand, context, calls, nesting)?;
                unary(*op, value)
            }
            Expr::Binary { .. } | Expr::Logical { .. } => self.chain(expr, context, calls, nesting),
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition, context, calls, nesting)?.is_truthy() {
                    self.eval(then_branch, context, calls, nesting)
                } else {
                    self.eval(else_branch, context, calls, nesting)
                }
            }
            Expr::ModuleCall {
                module,
                function,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, context, calls, nesting))
                    .collect::<Result<Vec<_>, _>>()?;
                self.invoke(module, function, args, calls, nesting)
            }
        }
    }

    /// Evaluate a left-nested run of binary and logical operators in one loop,
    /// so `1 + 2 + ... + n` does not recurse once per term.
    fn chain(
        &self,
        expr: &Expr,
        context: &EvaluationContext,
        calls: usize,
        nesting: usize,
    ) -> Result<Value, EvalError> {
        let mut links = Vec::new();
        let mut leftmost = expr;
        loop {
            match leftmost {
                Expr::Binary { op, left, right } => {
                    links.push(Link::Binary(*op, right));
                    leftmost = left;
                }
                Expr::Logical { op, left, right } => {
                    links.push(Link::Logical(*op, right));
                    leftmost = left;
                }
                _ => break,
            }
        }

        let mut acc = self.eval(leftmost, context, calls, nesting)?;
        for link in links.into_iter().rev() {
            acc = match link {
                Link::Binary(op, right) => {
                    let right = self.eval(right, context, calls, nesting)?;
                    binary(op, acc, right)?
                }
                Link::Logical(op, right) => match (op, acc.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => acc,
                    _ => self.eval(right, context, calls, nesting)?,
                },
            };
        }
        Ok(acc)
    }

    fn invoke(
        &self,
        module: &str,
        function: &str,
        args: Vec<Value>,
        calls: usize,
        nesting: usize,
    ) -> Result<Value, EvalError> {
        if calls >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth(MAX_CALL_DEPTH));
        }
        let namespace = self
            .modules
            .get(module)
            .ok_or_else(|| EvalError::UnknownModule(module.to_string()))?;
        let callable = namespace
            .functions
            .get(function)
            .ok_or_else(|| EvalError::UnknownFunction {
                module: module.to_string(),
                function: function.to_string(),
            })?;

        let locals = bind_arguments(module, callable, args)?;
        self.eval(&callable.body, &locals, calls + 1, nesting)
            .map_err(|err| match err {
                EvalError::InFunction { .. } | EvalError::CallDepth(_) | EvalError::TooDeep(_) => err,
                other => EvalError::InFunction {
                    module: module.to_string(),
                    function: function.to_string(),
                    source: Box::new(other),
                },
            })
    }
}

fn bind_arguments(
    module: &str,
    callable: &Callable,
    args: Vec<Value>,
) -> Result<EvaluationContext, EvalError> {
    if args.len() != callable.parameters.len() {
        return Err(EvalError::Arity {
            module: module.to_string(),
            function: callable.name.clone(),
            expected: callable.parameters.len(),
            got: args.len(),
        });
    }
    let mut locals = EvaluationContext::new();
    for (param, value) in callable.parameters.iter().zip(args) {
        locals.bind(param, value);
    }
    Ok(locals)
}

fn finite(value: Value) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) if !n.is_finite() => Err(EvalError::NonFinite),
        other => Ok(other),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvalError> {
    match (op, &value) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOp::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
        _ => Err(EvalError::UnaryTypeMismatch {
            op: op.symbol(),
            operand: value.type_name(),
        }),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    let mismatch = |left: &Value, right: &Value| EvalError::TypeMismatch {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match op {
        BinaryOp::Equal => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => return Ok(Value::Bool(left != right)),
        BinaryOp::Add => {
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                return Ok(Value::String(format!("{}{}", to_text(&left), to_text(&right))));
            }
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => return Err(mismatch(&left, &right)),
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            return Ok(Value::Bool(result));
        }
        _ => {}
    }

    let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
        return Err(mismatch(&left, &right));
    };
    let (a, b) = (*a, *b);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Modulo => a % b,
        _ => a.powf(b),
    };
    finite(Value::Number(result))
}

/// String form used by concatenation.
fn to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::parse_expression;

    fn eval_with(source: &str, context: &EvaluationContext, modules: &ModuleSet) -> Result<Value, EvalError> {
        let expr = parse_expression(source).unwrap();
        Interpreter::new(modules).evaluate(&expr, context)
    }

    fn eval(source: &str) -> Result<Value, EvalError> {
        eval_with(source, &EvaluationContext::new(), &ModuleSet::default())
    }

    fn modules(source: &str) -> ModuleSet {
        ModuleSet::compile(&[FunctionModule::new("m-1", "m", source)])
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("2 ** 10").unwrap(), Value::Number(1024.0));
        assert_eq!(eval("-2 ** 2").unwrap(), Value::Number(-4.0));
        assert_eq!(eval("7 % 3").unwrap(), Value::Number(1.0));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Number(-1.0));
        assert_eq!(eval("10 / 4").unwrap(), Value::Number(2.5));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 % 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("10 ** 400"), Err(EvalError::NonFinite));
    }

    #[test]
    fn test_strings_concatenate() {
        assert_eq!(eval("'a' + 1").unwrap(), Value::from("a1"));
        assert_eq!(eval("2.5 + \"x\"").unwrap(), Value::from("2.5x"));
        assert_eq!(eval("'v' + true + null").unwrap(), Value::from("vtruenull"));
    }

    #[test]
    fn test_type_mismatches() {
        assert!(matches!(eval("'a' * 2"), Err(EvalError::TypeMismatch { op: "*", .. })));
        assert!(matches!(eval("true - 1"), Err(EvalError::TypeMismatch { .. })));
        assert!(matches!(eval("-'a'"), Err(EvalError::UnaryTypeMismatch { .. })));
        assert!(matches!(eval("1 < 'a'"), Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_comparison_and_logic() {
        assert_eq!(eval("1 < 2 && 'b' > 'a'").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 === '1'").unwrap(), Value::Bool(false));
        assert_eq!(eval("null == undefined").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 || 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval("0 && 1 / 0").unwrap(), Value::Number(0.0));
        assert_eq!(eval("!0").unwrap(), Value::Bool(true));
        assert_eq!(eval("3 > 2 ? 'yes' : 'no'").unwrap(), Value::from("yes"));
    }

    #[test]
    fn test_identifiers_resolve_from_context() {
        let mut context = EvaluationContext::new();
        context.bind("a", Value::Number(2.0));
        assert_eq!(
            eval_with("a * 3", &context, &ModuleSet::default()).unwrap(),
            Value::Number(6.0)
        );
        assert_eq!(
            eval_with("b", &context, &ModuleSet::default()),
            Err(EvalError::UndefinedLocal("b".into()))
        );
    }

    #[test]
    fn test_context_rebinding_keeps_position() {
        let mut context = EvaluationContext::new();
        context.bind("a", Value::Number(1.0));
        context.bind("b", Value::Number(2.0));
        context.bind("a", Value::Number(3.0));
        let names: Vec<&str> = context.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(context.get("a"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_module_calls() {
        let set = modules("function add(x, y) { return x + y; }");
        let context = EvaluationContext::new();
        assert_eq!(eval_with("@m.add(2, 3)", &context, &set).unwrap(), Value::Number(5.0));
        assert!(matches!(
            eval_with("@m.add(1)", &context, &set),
            Err(EvalError::Arity { expected: 2, got: 1, .. })
        ));
        assert!(matches!(
            eval_with("@m.sub(1, 2)", &context, &set),
            Err(EvalError::UnknownFunction { .. })
        ));
        assert_eq!(
            eval_with("@x.add(1, 2)", &context, &set),
            Err(EvalError::UnknownModule("x".into()))
        );
    }

    #[test]
    fn test_functions_cannot_see_caller_bindings() {
        let set = modules("function leak() { return secret; }");
        let mut context = EvaluationContext::new();
        context.bind("secret", Value::Number(42.0));
        let err = eval_with("@m.leak()", &context, &set).unwrap_err();
        assert_eq!(err.to_string(), "Error in m.leak: secret is not defined");
    }

    #[test]
    fn test_functions_can_call_other_modules() {
        let set = ModuleSet::compile(&[
            FunctionModule::new("1", "base", "function sq(x) { return x * x; }"),
            FunctionModule::new("2", "geo", "function area(r) { return 3 * @base.sq(r); }"),
        ]);
        let value = Interpreter::new(&set).call("geo", "area", vec![Value::Number(2.0)]).unwrap();
        assert_eq!(value, Value::Number(12.0));
    }

    #[test]
    fn test_recursion_is_bounded() {
        let set = modules("function fact(n) { return n <= 1 ? 1 : n * @m.fact(n - 1); }\nfunction forever(n) { return @m.forever(n); }");
        let context = EvaluationContext::new();
        assert_eq!(eval_with("@m.fact(5)", &context, &set).unwrap(), Value::Number(120.0));
        assert_eq!(
            eval_with("@m.forever(1)", &context, &set),
            Err(EvalError::CallDepth(MAX_CALL_DEPTH))
        );
    }

    #[test]
    fn test_long_operator_chains_evaluate() {
        let sum = format!("{}1", "1 + ".repeat(999));
        assert_eq!(eval(&sum).unwrap(), Value::Number(1000.0));
        let any = format!("{}1", "0 || ".repeat(500));
        assert_eq!(eval(&any).unwrap(), Value::Number(1.0));
        assert_eq!(eval("1 - 2 - 3").unwrap(), Value::Number(-4.0));
        assert_eq!(eval("2 * 3 + 4 * 5 - 6 / 2").unwrap(), Value::Number(23.0));
    }

    #[test]
    fn test_evaluation_depth_is_bounded_across_calls() {
        // Thirty negations around each recursive call.
        let source = format!(
            "function deep(x, n) {{ return n <= 0 ? x : {}@m.deep(x, n - 1); }}",
            "- ".repeat(30)
        );
        let set = modules(&source);
        let context = EvaluationContext::new();
        assert_eq!(eval_with("@m.deep(1, 2)", &context, &set).unwrap(), Value::Number(1.0));
        assert_eq!(
            eval_with("@m.deep(1, 20)", &context, &set),
            Err(EvalError::TooDeep(MAX_EVAL_DEPTH))
        );
    }
}
