//! Dependency extraction from expression text.
//!
//! Finds the names an expression needs to be resolvable before it can be
//! evaluated. Two reference forms are recognized:
//!
//! - Module calls `@module.function(...)` contribute the module name only
//! - Bare identifiers contribute themselves, unless they are keywords
//!
//! Names inside string literals and comments are ignored.

use regex::Regex;
use std::sync::OnceLock;

/// Words that never count as dependencies.
pub const KEYWORDS: &[&str] = &[
    "if",
    "else",
    "for",
    "while",
    "function",
    "return",
    "true",
    "false",
    "null",
    "undefined",
    "const",
    "let",
    "var",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Extract the dependency names of an expression.
///
/// Module names come first, then free identifiers, each in order of first
/// appearance with duplicates removed.
pub fn extract_dependencies(expression: &str) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    let script = strip_literals(expression);

    let call_re = module_call_re();
    for caps in call_re.captures_iter(&script) {
        push_unique(&mut deps, &caps[1]);
    }

    // Replace module call heads so function names are not seen as identifiers.
    let without_calls = call_re.replace_all(&script, " ");

    for m in identifier_re().find_iter(&without_calls) {
        let word = m.as_str();
        if !is_keyword(word) {
            push_unique(&mut deps, word);
        }
    }

    deps
}

/// Extract only the module names referenced through `@module.function` calls.
pub fn extract_module_references(expression: &str) -> Vec<String> {
    let mut modules = Vec::new();
    let script = strip_literals(expression);
    for caps in module_call_re().captures_iter(&script) {
        push_unique(&mut modules, &caps[1]);
    }
    modules
}

fn push_unique(deps: &mut Vec<String>, name: &str) {
    if !deps.iter().any(|d| d == name) {
        deps.push(name.to_string());
    }
}

fn module_call_re() -> &'static Regex {
    static CALL_RE: OnceLock<Regex> = OnceLock::new();
    CALL_RE.get_or_init(|| {
        Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)\s*\.\s*([A-Za-z_][A-Za-z0-9_]*)")
            .expect("module call regex must compile")
    })
}

fn identifier_re() -> &'static Regex {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("identifier regex must compile")
    })
}

/// Blank out string literal contents and comments.
fn strip_literals(script: &str) -> String {
    let mut out = String::with_capacity(script.len());
    let mut chars = script.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
                out.push(ch);
                continue;
            }
            out.push(' ');
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            '/' if chars.peek() == Some(&'/') => {
                out.push(' ');
                for rest in chars.by_ref() {
                    if rest == '\n' {
                        out.push('\n');
                        break;
                    }
                    out.push(' ');
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(' ');
                let mut prev = '\0';
                for rest in chars.by_ref() {
                    out.push(' ');
                    if prev == '*' && rest == '/' {
                        break;
                    }
                    prev = rest;
                }
            }
            _ => out.push(ch),
        }
    }

    out
}
