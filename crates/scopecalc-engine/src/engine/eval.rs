//! Whole-scope evaluation.
//!
//! Lines are evaluated once, top to bottom. A line may only use bindings
//! made by earlier lines; anything else is reported as undefined, or as a
//! circular reference when the missing name belongs to a dependency cycle.
//! Errors stay on their line and never stop the pass.

use log::{debug, trace};
use std::collections::HashMap;

use super::cycle::{all_cycles, build_graph};
use super::deps::extract_dependencies;
use super::error::LineError;
use super::interp::{EvaluationContext, Interpreter, ModuleSet};
use super::line::parse_line;
use super::module::FunctionModule;
use super::parser::parse_expression;
use super::{Line, Value};

/// Evaluate every line against the given modules.
///
/// Returns the lines in the same order with `index`, `bound_name`,
/// `depends_on`, `value` and `error` refreshed. Never fails.
pub fn evaluate_all(lines: &[Line], modules: &[FunctionModule]) -> Vec<Line> {
    let module_set = ModuleSet::compile(modules);
    evaluate_with_modules(lines, &module_set)
}

/// Evaluate every line against an already compiled module set.
pub fn evaluate_with_modules(lines: &[Line], modules: &ModuleSet) -> Vec<Line> {
    debug!("evaluating {} lines", lines.len());
    let cycles = cycle_membership(lines);
    let interpreter = Interpreter::new(modules);
    let mut context = EvaluationContext::new();

    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let evaluated = evaluate_line(idx, line, &interpreter, modules, &mut context, &cycles);
            trace!(
                "line {}: value={:?} error={:?}",
                idx, evaluated.value, evaluated.error
            );
            evaluated
        })
        .collect()
}

fn evaluate_line(
    idx: usize,
    line: &Line,
    interpreter: &Interpreter<'_>,
    modules: &ModuleSet,
    context: &mut EvaluationContext,
    cycles: &HashMap<usize, Vec<String>>,
) -> Line {
    let parsed = parse_line(&line.raw_expression);
    let mut out = Line {
        index: idx,
        bound_name: parsed.bound_name.map(str::to_string),
        raw_expression: line.raw_expression.clone(),
        depends_on: Vec::new(),
        value: Value::Null,
        error: None,
    };

    if parsed.expression.is_empty() {
        return out;
    }

    out.depends_on = extract_dependencies(parsed.expression);
    match resolve(parsed.expression, &out.depends_on, idx, interpreter, modules, context, cycles) {
        Ok(value) => {
            if let Some(name) = parsed.bound_name {
                context.bind(name, value.clone());
            }
            out.value = value;
        }
        Err(err) => out.error = Some(err.to_string()),
    }
    out
}

fn resolve(
    expression: &str,
    depends_on: &[String],
    idx: usize,
    interpreter: &Interpreter<'_>,
    modules: &ModuleSet,
    context: &EvaluationContext,
    cycles: &HashMap<usize, Vec<String>>,
) -> Result<Value, LineError> {
    let undefined: Vec<String> = depends_on
        .iter()
        .filter(|dep| !context.contains(dep) && !modules.contains(dep))
        .cloned()
        .collect();

    if !undefined.is_empty() {
        if let Some(path) = cycles.get(&idx)
            && undefined.iter().any(|name| path.contains(name))
        {
            let off_cycle = undefined
                .into_iter()
                .filter(|name| !path.contains(name))
                .collect();
            return Err(LineError::CircularReference {
                path: path.clone(),
                undefined: off_cycle,
            });
        }
        return Err(LineError::UndefinedReference(undefined));
    }

    let expr = parse_expression(expression)?;
    Ok(interpreter.evaluate(&expr, context)?)
}

/// Map each line on a dependency cycle to the cycle's binding names,
/// rotated to start (and end) at that line.
fn cycle_membership(lines: &[Line]) -> HashMap<usize, Vec<String>> {
    let mut membership = HashMap::new();
    let graph = build_graph(lines);
    let name_of = |idx: usize| {
        lines
            .get(idx)
            .and_then(|line| parse_line(&line.raw_expression).bound_name)
            .unwrap_or_default()
            .to_string()
    };

    for path in all_cycles(&graph) {
        let nodes = &path[..path.len().saturating_sub(1)];
        for (offset, &node) in nodes.iter().enumerate() {
            if membership.contains_key(&node) {
                continue;
            }
            let mut names: Vec<String> = nodes[offset..]
                .iter()
                .chain(&nodes[..offset])
                .map(|&n| name_of(n))
                .collect();
            names.push(name_of(node));
            membership.insert(node, names);
        }
    }

    membership
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(texts: &[&str]) -> Vec<Line> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Line::from_text(i, t))
            .collect()
    }

    #[test]
    fn test_cycle_names_start_at_each_member() {
        let membership = cycle_membership(&lines(&["a = b", "b = c", "c = a"]));
        assert_eq!(membership[&0], vec!["a", "b", "c", "a"]);
        assert_eq!(membership[&1], vec!["b", "c", "a", "b"]);
        assert_eq!(membership[&2], vec!["c", "a", "b", "c"]);
    }

    #[test]
    fn test_blank_lines_are_cleared() {
        let mut input = lines(&["   "]);
        input[0].value = Value::Number(3.0);
        input[0].error = Some("stale".into());
        let out = evaluate_all(&input, &[]);
        assert_eq!(out[0].value, Value::Null);
        assert_eq!(out[0].error, None);
        assert!(out[0].depends_on.is_empty());
    }

    #[test]
    fn test_syntax_errors_are_line_errors() {
        let out = evaluate_all(&lines(&["x = 1 +", "y = 2"]), &[]);
        let err = out[0].error.as_deref().unwrap();
        assert!(err.starts_with("Syntax error:"), "{}", err);
        assert_eq!(out[1].value, Value::Number(2.0));
    }

    #[test]
    fn test_stale_cached_dependencies_are_ignored() {
        let mut input = lines(&["a = 1", "a + 1"]);
        input[1].depends_on = vec!["ghost".into()];
        let out = evaluate_all(&input, &[]);
        assert_eq!(out[1].depends_on, vec!["a"]);
        assert_eq!(out[1].value, Value::Number(2.0));
    }
}
