//! Function modules and their best-effort compiler.
//!
//! A module's source holds any number of definitions of the form
//! `function name(a, b) { return a + b; }`. Each definition is compiled on
//! its own; a malformed one is left out of the namespace and reported as a
//! [`CompileDiagnostic`] instead of failing the whole module.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ast::Expr;
use super::line::is_valid_identifier;
use super::parser::parse_function_body;

pub const DEFAULT_COLOR_TAG: &str = "blue";

/// A globally registered, named group of user functions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionModule {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "code")]
    pub source_code: String,
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default = "default_color_tag")]
    pub color_tag: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_color_tag() -> String {
    DEFAULT_COLOR_TAG.to_string()
}

impl FunctionModule {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source_code: impl Into<String>) -> Self {
        FunctionModule {
            id: id.into(),
            name: name.into(),
            source_code: source_code.into(),
            is_saved: false,
            color_tag: default_color_tag(),
            created_at: Utc::now(),
        }
    }

    /// Compile this module's source.
    pub fn compile(&self) -> CompiledModule {
        compile(&self.source_code)
    }
}

/// One compiled user function.
#[derive(Clone, Debug, PartialEq)]
pub struct Callable {
    pub name: String,
    pub parameters: Vec<String>,
    pub body_source: String,
    pub body: Expr,
}

impl Callable {
    /// `name(a, b)`, for listings.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(", "))
    }
}

/// Why a function definition was left out of its module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub function: Option<String>,
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "{} (function {}, position {})", self.message, name, self.offset),
            None => write!(f, "{} (position {})", self.message, self.offset),
        }
    }
}

/// Namespace of callables keyed by function name.
pub type Namespace = BTreeMap<String, Callable>;

/// Result of compiling one module source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompiledModule {
    pub functions: Namespace,
    pub diagnostics: Vec<CompileDiagnostic>,
}

/// Compile module source into a namespace. Never fails as a whole.
pub fn compile(source: &str) -> CompiledModule {
    let mut compiled = CompiledModule::default();
    let mut pos = 0;

    while let Some(start) = find_function_keyword(source, pos) {
        let after_keyword = start + "function".len();
        match parse_definition(source, after_keyword) {
            Ok((callable, end)) => {
                if compiled.functions.contains_key(&callable.name) {
                    debug!("function {} redefined; keeping the later definition", callable.name);
                }
                compiled.functions.insert(callable.name.clone(), callable);
                pos = end;
            }
            Err(diagnostic) => {
                debug!("skipping function definition: {}", diagnostic);
                compiled.diagnostics.push(diagnostic);
                pos = after_keyword;
            }
        }
    }

    compiled
}

/// Find the next `function` keyword at or after `from`, outside strings and comments.
fn find_function_keyword(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_string(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'f' if source[i..].starts_with("function")
                && (i == 0 || !is_ident_byte(bytes[i - 1]))
                && !bytes.get(i + "function".len()).is_some_and(|b| is_ident_byte(*b)) =>
            {
                return Some(i);
            }
            b if is_ident_byte(b) => {
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Parse `name(params) { body }` starting right after the `function` keyword.
/// Returns the callable and the offset just past the closing brace.
fn parse_definition(source: &str, mut pos: usize) -> Result<(Callable, usize), CompileDiagnostic> {
    let bytes = source.as_bytes();
    let fail = |function: Option<&str>, offset: usize, message: &str| CompileDiagnostic {
        function: function.map(str::to_string),
        offset,
        message: message.to_string(),
    };

    pos = skip_whitespace(bytes, pos);
    let name_start = pos;
    while pos < bytes.len() && is_ident_byte(bytes[pos]) {
        pos += 1;
    }
    let name = &source[name_start..pos];
    if !is_valid_identifier(name) {
        return Err(fail(None, name_start, "Expected function name"));
    }

    pos = skip_whitespace(bytes, pos);
    if bytes.get(pos) != Some(&b'(') {
        return Err(fail(Some(name), pos, "Expected '(' after function name"));
    }
    let params_start = pos + 1;
    let Some(params_len) = source[params_start..].find(')') else {
        return Err(fail(Some(name), pos, "Unterminated parameter list"));
    };
    let params_end = params_start + params_len;

    let mut parameters: Vec<String> = Vec::new();
    for param in source[params_start..params_end].split(',') {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        if !is_valid_identifier(param) {
            return Err(fail(Some(name), params_start, "Invalid parameter name"));
        }
        if parameters.iter().any(|p| p == param) {
            return Err(fail(Some(name), params_start, "Duplicate parameter name"));
        }
        parameters.push(param.to_string());
    }

    pos = skip_whitespace(bytes, params_end + 1);
    if bytes.get(pos) != Some(&b'{') {
        return Err(fail(Some(name), pos, "Expected '{' before function body"));
    }
    let body_start = pos + 1;
    let Some(body_end) = find_matching_brace(bytes, body_start) else {
        return Err(fail(Some(name), pos, "Unterminated function body"));
    };

    let body_source = source[body_start..body_end].trim().to_string();
    let body = parse_function_body(&body_source).map_err(|e| CompileDiagnostic {
        function: Some(name.to_string()),
        offset: body_start,
        message: format!("Invalid function body: {}", e),
    })?;

    Ok((
        Callable {
            name: name.to_string(),
            parameters,
            body_source,
            body,
        },
        body_end + 1,
    ))
}

/// Offset of the `}` closing a block whose `{` sits just before `from`.
fn find_matching_brace(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = skip_line_comment(bytes, i);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}
