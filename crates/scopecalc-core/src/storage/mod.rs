//! Persistence of scopes and modules as JSON records in a key-value store.

mod migrate;
mod store;

pub use migrate::{Migrated, migrate};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use crate::error::{Result, ScopecalcError};
use crate::notebook::Scope;
use log::{debug, info, warn};
use scopecalc_engine::engine::FunctionModule;
use serde::Serialize;
use serde_json::Value as Json;

/// Key holding the list of scope records.
pub const SCOPES_KEY: &str = "calculator-v2-scopes";
/// Key holding the list of module records.
pub const MODULES_KEY: &str = "calculator-v2-function-sets";

/// Typed access to the two persisted records.
#[derive(Debug)]
pub struct Storage<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Storage { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Read both records and migrate them. When the migration changed
    /// anything, both records are written back in the current schema.
    pub fn load(&mut self) -> Result<Migrated> {
        let raw_scopes = self.read_list(SCOPES_KEY)?;
        let modules = self
            .read_list(MODULES_KEY)?
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<FunctionModule>(raw) {
                Ok(module) => Some(module),
                Err(err) => {
                    warn!("skipping unreadable module record: {}", err);
                    None
                }
            })
            .collect();

        let migrated = migrate(raw_scopes, modules);
        if migrated.changed {
            info!(
                "migrated stored records ({} scopes, {} modules); writing back",
                migrated.scopes.len(),
                migrated.modules.len()
            );
            self.save_scopes(&migrated.scopes)?;
            self.save_modules(&migrated.modules)?;
        }
        Ok(migrated)
    }

    pub fn save_scopes(&mut self, scopes: &[Scope]) -> Result<()> {
        self.write(SCOPES_KEY, scopes)
    }

    pub fn save_modules(&mut self, modules: &[FunctionModule]) -> Result<()> {
        self.write(MODULES_KEY, modules)
    }

    /// Remove both records.
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(SCOPES_KEY)?;
        self.store.remove(MODULES_KEY)
    }

    /// A missing, corrupt or non-list record reads as an empty list.
    fn read_list(&self, key: &str) -> Result<Vec<Json>> {
        let Some(text) = self.store.get(key)? else {
            debug!("{} not present", key);
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Json>(&text) {
            Ok(Json::Array(items)) => Ok(items),
            Ok(_) => {
                warn!("{} is not a list; treating it as empty", key);
                Ok(Vec::new())
            }
            Err(err) => {
                warn!("{} is corrupt ({}); treating it as empty", key, err);
                Ok(Vec::new())
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).map_err(|source| ScopecalcError::Json {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &text)
    }
}
