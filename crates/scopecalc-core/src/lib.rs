//! scopecalc_core - UI-agnostic notebook model, persistence and migration.
//!
//! A [`Notebook`] holds every scope plus the global function modules. Its
//! operations keep the evaluated results current; [`Storage`] persists the
//! records through any [`KeyValueStore`].

pub mod error;
pub mod notebook;
pub mod storage;

pub use error::{Result, ScopecalcError};
pub use notebook::{ModuleDefaults, Notebook, Scope};
pub use storage::{FileStore, KeyValueStore, MemoryStore, Storage};
