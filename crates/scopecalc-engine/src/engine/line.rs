//! Line data structures and the line parser.
//!
//! A line is either a binding (`name = expression`) or a bare expression.
//! [`parse_line`] splits the raw text; semantic validity of the expression
//! is judged later by the evaluator.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::Value;
use super::deps::extract_dependencies;

/// Result of splitting a line's raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub bound_name: Option<&'a str>,
    pub expression: &'a str,
}

/// Split line text into an optional binding name and the expression text.
///
/// `a == b` is a comparison, not a binding of `a`.
pub fn parse_line(text: &str) -> ParsedLine<'_> {
    let trimmed = text.trim();
    if let Some(caps) = binding_re().captures(trimmed) {
        let (Some(name), Some(expr)) = (caps.get(1), caps.get(2)) else {
            return ParsedLine {
                bound_name: None,
                expression: trimmed,
            };
        };
        if !expr.as_str().starts_with('=') {
            return ParsedLine {
                bound_name: Some(name.as_str()),
                expression: expr.as_str().trim(),
            };
        }
    }
    ParsedLine {
        bound_name: None,
        expression: trimmed,
    }
}

/// Check whether `name` is a valid identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_re().is_match(name)
}

fn binding_re() -> &'static Regex {
    static BINDING_RE: OnceLock<Regex> = OnceLock::new();
    BINDING_RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.+)$").expect("binding regex must compile")
    })
}

fn identifier_re() -> &'static Regex {
    static IDENT_RE: OnceLock<Regex> = OnceLock::new();
    IDENT_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
    })
}

/// One line of a scope with its last computed value or error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[serde(default, alias = "lineIndex")]
    pub index: usize,
    #[serde(default, alias = "name")]
    pub bound_name: Option<String>,
    #[serde(default, alias = "expression")]
    pub raw_expression: String,
    /// Derived cache; always re-extracted before use.
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Line {
    /// Create a blank line at `index`.
    pub fn blank(index: usize) -> Line {
        Line {
            index,
            ..Line::default()
        }
    }

    /// Create a line from user text, deriving its binding and dependencies.
    /// Value and error stay empty until the next evaluation pass.
    pub fn from_text(index: usize, text: &str) -> Line {
        let mut line = Line::blank(index);
        line.set_text(text);
        line
    }

    /// Replace the line's text and refresh the derived fields.
    pub fn set_text(&mut self, text: &str) {
        let parsed = parse_line(text);
        self.bound_name = parsed.bound_name.map(str::to_string);
        self.depends_on = extract_dependencies(parsed.expression);
        self.raw_expression = text.trim().to_string();
    }

    /// The expression part of the line (everything after `name =`).
    pub fn expression(&self) -> &str {
        parse_line(&self.raw_expression).expression
    }

    pub fn is_blank(&self) -> bool {
        self.raw_expression.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bindings() {
        let parsed = parse_line("  total = a + b ");
        assert_eq!(parsed.bound_name, Some("total"));
        assert_eq!(parsed.expression, "a + b");

        let parsed = parse_line("_x1=2");
        assert_eq!(parsed.bound_name, Some("_x1"));
        assert_eq!(parsed.expression, "2");
    }

    #[test]
    fn test_parses_bare_expressions() {
        let parsed = parse_line(" 1 + 2 ");
        assert_eq!(parsed.bound_name, None);
        assert_eq!(parsed.expression, "1 + 2");

        assert_eq!(parse_line("").expression, "");
        assert_eq!(parse_line("x =").bound_name, None);
        assert_eq!(parse_line("1x = 2").bound_name, None);
    }

    #[test]
    fn test_equality_is_not_a_binding() {
        let parsed = parse_line("a == b");
        assert_eq!(parsed.bound_name, None);
        assert_eq!(parsed.expression, "a == b");

        let parsed = parse_line("a = b == c");
        assert_eq!(parsed.bound_name, Some("a"));
        assert_eq!(parsed.expression, "b == c");
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("math"));
        assert!(is_valid_identifier("_tmp2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn test_line_from_text_derives_fields() {
        let line = Line::from_text(3, "c = @m.add(a, 2)");
        assert_eq!(line.index, 3);
        assert_eq!(line.bound_name.as_deref(), Some("c"));
        assert_eq!(line.depends_on, vec!["m".to_string(), "a".to_string()]);
        assert_eq!(line.expression(), "@m.add(a, 2)");
        assert!(line.value.is_null());
    }

    #[test]
    fn test_accepts_legacy_field_names() {
        let json = r#"{"lineIndex":1,"name":"a","expression":"a = 2","value":2,"error":null,"dependsOn":[]}"#;
        let line: Line = serde_json::from_str(json).unwrap();
        assert_eq!(line.index, 1);
        assert_eq!(line.bound_name.as_deref(), Some("a"));
        assert_eq!(line.raw_expression, "a = 2");
        assert_eq!(line.value, Value::Number(2.0));
    }
}
