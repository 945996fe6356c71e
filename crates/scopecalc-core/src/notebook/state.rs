use chrono::{DateTime, Utc};
use rand::Rng;
use scopecalc_engine::engine::{FunctionModule, Line};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Maximum number of undo snapshots kept per scope
pub(crate) const MAX_UNDO_STACK: usize = 100;

/// Color tags handed out to new modules, in rotation.
pub const DEFAULT_COLOR_TAGS: &[&str] = &["blue", "green", "purple", "orange", "pink"];

/// Source given to a newly created module. `{name}` is replaced by the module name.
pub const DEFAULT_MODULE_TEMPLATE: &str = "// Define your functions here\n// They will be accessible as @{name}.functionName()\n\nfunction min(a, b) {\n  return a < b ? a : b;\n}\n\nfunction max(a, b) {\n  return a > b ? a : b;\n}";

/// A named, ordered collection of lines forming one calculation sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "variables")]
    pub lines: Vec<Line>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Scope {
    /// Create a scope holding a single blank line.
    pub fn new(name: &str) -> Scope {
        let now = Utc::now();
        Scope {
            id: fresh_id("scope"),
            name: name.to_string(),
            lines: vec![Line::blank(0)],
            created_at: now,
            updated_at: now,
        }
    }

    /// Restore the line invariants: at least one line, indices 0..n.
    /// Returns whether anything had to change.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.lines.is_empty() {
            self.lines.push(Line::blank(0));
            changed = true;
        }
        for (idx, line) in self.lines.iter_mut().enumerate() {
            if line.index != idx {
                line.index = idx;
                changed = true;
            }
        }
        changed
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Generate an id of the form `<prefix>-<millis>-<random>`.
pub(crate) fn fresh_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{}-{}-{:08x}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Settings for newly created modules.
#[derive(Clone, Debug)]
pub struct ModuleDefaults {
    pub template: String,
    pub color_tags: Vec<String>,
}

impl Default for ModuleDefaults {
    fn default() -> Self {
        ModuleDefaults {
            template: DEFAULT_MODULE_TEMPLATE.to_string(),
            color_tags: DEFAULT_COLOR_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// UI-agnostic state of the whole calculator: every scope plus the global
/// module registry.
///
/// Every mutation re-runs evaluation for the scopes it can affect; module
/// changes re-run every scope.
#[derive(Clone, Debug, Default)]
pub struct Notebook {
    pub scopes: Vec<Scope>,
    pub modules: Vec<FunctionModule>,
    pub active_scope_id: Option<String>,
    /// Whether anything changed since the last save
    pub modified: bool,
    pub module_defaults: ModuleDefaults,
    /// Per-scope line snapshots taken before each line edit
    pub(crate) history: HashMap<String, Vec<Vec<Line>>>,
}

impl Notebook {
    /// Create an empty notebook.
    ///
    /// This constructor is side-effect free: it does not touch any store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a notebook from already loaded records and evaluate everything.
    pub fn from_parts(scopes: Vec<Scope>, modules: Vec<FunctionModule>) -> Self {
        let active_scope_id = scopes.first().map(|s| s.id.clone());
        let mut notebook = Notebook {
            scopes,
            modules,
            active_scope_id,
            ..Notebook::default()
        };
        for scope in &mut notebook.scopes {
            scope.normalize();
        }
        notebook.recompute_all();
        notebook.modified = false;
        notebook
    }

    pub fn with_module_defaults(mut self, defaults: ModuleDefaults) -> Self {
        self.module_defaults = defaults;
        self
    }

    pub fn scope(&self, id: &str) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.id == id)
    }

    /// Find a scope by name, ignoring case.
    pub fn scope_by_name(&self, name: &str) -> Option<&Scope> {
        self.scopes
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn active_scope(&self) -> Option<&Scope> {
        self.active_scope_id.as_deref().and_then(|id| self.scope(id))
    }

    pub fn module(&self, id: &str) -> Option<&FunctionModule> {
        self.modules.iter().find(|m| m.id == id)
    }

    pub fn module_by_name(&self, name: &str) -> Option<&FunctionModule> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Number of undo snapshots available for a scope.
    pub fn undo_depth(&self, scope_id: &str) -> usize {
        self.history.get(scope_id).map_or(0, Vec::len)
    }
}
