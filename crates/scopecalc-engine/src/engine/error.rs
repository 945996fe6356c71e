//! Error types for parsing and evaluating expressions.

use thiserror::Error;

/// Lexing or parsing failure, with the byte offset where it happened.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at position {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        ParseError {
            message: message.into(),
            offset,
        }
    }
}

/// Failure while evaluating a parsed expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{0} is not defined")]
    UndefinedLocal(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("{module}.{function} is not a function")]
    UnknownFunction { module: String, function: String },

    #[error("{module}.{function} expects {expected} argument(s), got {got}")]
    Arity {
        module: String,
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Cannot apply unary '{op}' to {operand}")]
    UnaryTypeMismatch {
        op: &'static str,
        operand: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Result is not a finite number")]
    NonFinite,

    #[error("Maximum call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("Expression nested more than {0} levels deep")]
    TooDeep(usize),

    #[error("Error in {module}.{function}: {source}")]
    InFunction {
        module: String,
        function: String,
        #[source]
        source: Box<EvalError>,
    },
}

/// Why a line has no value. The display text is what the line's `error` holds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineError {
    #[error("Undefined: {}", .0.join(", "))]
    UndefinedReference(Vec<String>),

    /// A missing name lies on a dependency cycle. Missing names off the
    /// cycle are listed after it.
    #[error("Circular reference: {}{}", .path.join(" -> "), undefined_suffix(.undefined))]
    CircularReference {
        path: Vec<String>,
        undefined: Vec<String>,
    },

    #[error("Syntax error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Runtime(#[from] EvalError),
}

fn undefined_suffix(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("; Undefined: {}", names.join(", "))
    }
}
