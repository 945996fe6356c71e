use super::Notebook;
use crate::error::Result;
use crate::storage::{KeyValueStore, Storage};
use log::debug;

impl Notebook {
    /// Load and migrate the stored records, then re-evaluate every scope.
    pub fn load<S: KeyValueStore>(storage: &mut Storage<S>) -> Result<Notebook> {
        let migrated = storage.load()?;
        debug!(
            "loaded {} scopes and {} modules",
            migrated.scopes.len(),
            migrated.modules.len()
        );
        Ok(Notebook::from_parts(migrated.scopes, migrated.modules))
    }

    /// Persist both records and clear the modified flag.
    pub fn save<S: KeyValueStore>(&mut self, storage: &mut Storage<S>) -> Result<()> {
        storage.save_scopes(&self.scopes)?;
        storage.save_modules(&self.modules)?;
        self.modified = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use scopecalc_engine::engine::Value;

    #[test]
    fn test_save_then_load_keeps_results() {
        let mut storage = Storage::new(MemoryStore::new());
        let mut notebook = Notebook::new();
        let scope = notebook.create_scope("Main").unwrap();
        let module = notebook.add_module("m").unwrap();
        notebook
            .update_module_source(&module, "function twice(x) { return x * 2; }")
            .unwrap();
        notebook.update_line(&scope, 0, "a = @m.twice(21)").unwrap();
        notebook.save(&mut storage).unwrap();
        assert!(!notebook.modified);

        let loaded = Notebook::load(&mut storage).unwrap();
        assert_eq!(loaded.scopes.len(), 1);
        assert_eq!(loaded.scopes[0].lines, notebook.scopes[0].lines);
        assert_eq!(loaded.modules, notebook.modules);
        assert_eq!(loaded.scope(&scope).unwrap().lines[0].value, Value::Number(42.0));
        assert_eq!(loaded.active_scope_id.as_deref(), Some(scope.as_str()));
    }

    #[test]
    fn test_stale_cached_results_are_recomputed() {
        let mut store = MemoryStore::new();
        store
            .set(
                crate::storage::SCOPES_KEY,
                r#"[{"id": "s1", "name": "S", "lines": [
                    {"index": 0, "boundName": "a", "rawExpression": "a = 3", "dependsOn": ["zzz"], "value": 99}
                ]}]"#,
            )
            .unwrap();
        let mut storage = Storage::new(store);
        let notebook = Notebook::load(&mut storage).unwrap();
        let line = &notebook.scope("s1").unwrap().lines[0];
        assert_eq!(line.value, Value::Number(3.0));
        assert!(line.depends_on.is_empty());
    }
}
