//! Scope evaluation engine API.
//!
//! This module provides the pure computation core of the calculator:
//!
//! - [`Line`], [`parse_line`] - Line storage and `name = expression` splitting
//! - [`extract_dependencies`] - Names an expression needs resolved first
//! - [`build_graph`], [`detect_cycle`] - Circular reference detection
//! - [`FunctionModule`], [`compile`] - User function modules
//! - [`parse_expression`], [`Interpreter`] - Expression parsing and evaluation
//! - [`evaluate_all`] - One full evaluation pass over a scope
//! - [`format_value`] - Format values for display

mod ast;
mod cycle;
mod deps;
mod error;
mod eval;
mod format;
mod interp;
mod lexer;
mod line;
mod module;
mod parser;
mod value;

pub use ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
pub use cycle::{DependencyGraph, all_cycles, build_graph, cycle_path, detect_cycle};
pub use deps::{KEYWORDS, extract_dependencies, extract_module_references, is_keyword};
pub use error::{EvalError, LineError, ParseError};
pub use eval::{evaluate_all, evaluate_with_modules};
pub use format::{format_number, format_value};
pub use interp::{EvaluationContext, Interpreter, MAX_CALL_DEPTH, MAX_EVAL_DEPTH, ModuleSet};
pub use line::{Line, ParsedLine, is_valid_identifier, parse_line};
pub use module::{
    Callable, CompileDiagnostic, CompiledModule, DEFAULT_COLOR_TAG, FunctionModule, Namespace,
    compile,
};
pub use parser::{MAX_NESTING, MAX_OPERATORS, parse_expression, parse_function_body};
pub use value::Value;
