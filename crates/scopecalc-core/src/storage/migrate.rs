//! Migration of the legacy per-scope function schema.
//!
//! Old scope records embedded their functions directly:
//! `{"id": ..., "variables": [...], "functions": [{"name", "code", ...}]}`.
//! Each embedded function is lifted into a global [`FunctionModule`] and the
//! `functions` field is stripped from the scope.

use log::{info, warn};
use scopecalc_engine::engine::{DEFAULT_COLOR_TAG, FunctionModule, is_valid_identifier};
use serde::Deserialize;
use serde_json::Value as Json;

use crate::notebook::Scope;

const LEGACY_FUNCTIONS_FIELD: &str = "functions";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyFunction {
    name: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    is_saved: bool,
    #[serde(default)]
    color_tag: Option<String>,
}

/// Outcome of migrating the raw records.
#[derive(Debug, Default)]
pub struct Migrated {
    pub scopes: Vec<Scope>,
    pub modules: Vec<FunctionModule>,
    /// Whether anything was lifted, stripped or deduplicated.
    pub changed: bool,
}

/// Migrate raw scope records and merge lifted functions into `modules`.
///
/// Lifted modules get the id `legacy-<scopeId>-<functionName>`; modules are
/// deduplicated by id, so running this twice over the same input yields the
/// same module list.
pub fn migrate(raw_scopes: Vec<Json>, modules: Vec<FunctionModule>) -> Migrated {
    let mut migrated = Migrated::default();

    for module in modules {
        if migrated.modules.iter().any(|m| m.id == module.id) {
            warn!("dropping duplicate module record {}", module.id);
            migrated.changed = true;
            continue;
        }
        migrated.modules.push(module);
    }

    for mut raw in raw_scopes {
        if let Some(object) = raw.as_object_mut()
            && let Some(functions) = object.remove(LEGACY_FUNCTIONS_FIELD)
        {
            migrated.changed = true;
            let scope_id = object
                .get("id")
                .and_then(Json::as_str)
                .unwrap_or("scope")
                .to_string();
            lift_functions(&scope_id, functions, &mut migrated.modules);
        }

        match serde_json::from_value::<Scope>(raw) {
            Ok(mut scope) => {
                if scope.normalize() {
                    migrated.changed = true;
                }
                migrated.scopes.push(scope);
            }
            Err(err) => warn!("skipping unreadable scope record: {}", err),
        }
    }

    migrated
}

fn lift_functions(scope_id: &str, functions: Json, modules: &mut Vec<FunctionModule>) {
    let Json::Array(entries) = functions else {
        warn!("scope {}: legacy functions field is not a list", scope_id);
        return;
    };

    for entry in entries {
        let legacy: LegacyFunction = match serde_json::from_value(entry) {
            Ok(legacy) => legacy,
            Err(err) => {
                warn!("scope {}: skipping unreadable legacy function: {}", scope_id, err);
                continue;
            }
        };

        let id = format!("legacy-{}-{}", scope_id, legacy.name);
        if modules.iter().any(|m| m.id == id) {
            continue;
        }

        let name = unique_name(&sanitize_name(&legacy.name), modules);
        let mut module = FunctionModule::new(id, name, legacy.code);
        module.is_saved = legacy.is_saved;
        module.color_tag = legacy
            .color_tag
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_COLOR_TAG.to_string());
        info!("migrated legacy function {} into module {}", legacy.name, module.name);
        modules.push(module);
    }
}

/// Turn an arbitrary legacy name into a valid identifier.
fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push_str("module");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    debug_assert!(is_valid_identifier(&out));
    out
}

fn unique_name(base: &str, modules: &[FunctionModule]) -> String {
    let taken = |name: &str| modules.iter().any(|m| m.name == name);
    if !taken(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_scope() -> Json {
        json!({
            "id": "scope-1",
            "name": "Budget",
            "variables": [
                {"lineIndex": 0, "name": "a", "expression": "a = 2", "value": 2, "error": null, "dependsOn": []}
            ],
            "functions": [
                {"name": "tax", "code": "function rate(x) { return x * 0.2; }", "isSaved": true, "isCollapsed": false, "colorTag": "green"},
                {"name": "my funcs", "code": "function id(x) { return x; }", "isSaved": false, "isCollapsed": true, "colorTag": ""}
            ],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_lifts_embedded_functions_into_modules() {
        let migrated = migrate(vec![legacy_scope()], Vec::new());
        assert!(migrated.changed);
        assert_eq!(migrated.scopes.len(), 1);
        assert_eq!(migrated.scopes[0].lines[0].raw_expression, "a = 2");

        let names: Vec<&str> = migrated.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tax", "my_funcs"]);
        assert_eq!(migrated.modules[0].id, "legacy-scope-1-tax");
        assert_eq!(migrated.modules[0].color_tag, "green");
        assert!(migrated.modules[0].is_saved);
        assert_eq!(migrated.modules[1].color_tag, DEFAULT_COLOR_TAG);
    }

    #[test]
    fn test_stripped_scopes_serialize_without_functions() {
        let migrated = migrate(vec![legacy_scope()], Vec::new());
        let json = serde_json::to_value(&migrated.scopes).unwrap();
        assert!(json[0].get("functions").is_none());
        assert!(json[0].get("lines").is_some());
    }

    #[test]
    fn test_migrating_twice_does_not_duplicate_modules() {
        let first = migrate(vec![legacy_scope()], Vec::new());
        let second = migrate(vec![legacy_scope()], first.modules.clone());
        assert_eq!(second.modules.len(), 2);

        let reloaded = migrate(
            serde_json::to_value(&first.scopes)
                .unwrap()
                .as_array()
                .cloned()
                .unwrap(),
            first.modules.clone(),
        );
        assert!(!reloaded.changed);
        assert_eq!(reloaded.modules, first.modules);
    }

    #[test]
    fn test_lifted_names_avoid_existing_modules() {
        let existing = vec![FunctionModule::new("set-1", "tax", "")];
        let migrated = migrate(vec![legacy_scope()], existing);
        let names: Vec<&str> = migrated.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["tax", "tax_2", "my_funcs"]);
    }

    #[test]
    fn test_duplicate_module_ids_collapse() {
        let modules = vec![
            FunctionModule::new("set-1", "a", ""),
            FunctionModule::new("set-1", "a", ""),
        ];
        let migrated = migrate(Vec::new(), modules);
        assert_eq!(migrated.modules.len(), 1);
        assert!(migrated.changed);
    }

    #[test]
    fn test_sanitizes_names() {
        assert_eq!(sanitize_name("2 fast"), "_2_fast");
        assert_eq!(sanitize_name(""), "module");
        assert_eq!(sanitize_name("ok_name"), "ok_name");
    }
}
