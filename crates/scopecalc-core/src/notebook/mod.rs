//! Notebook state: scopes, the global module registry and their operations.

mod io;
mod modules;
mod ops;
mod state;

pub use state::{DEFAULT_COLOR_TAGS, DEFAULT_MODULE_TEMPLATE, ModuleDefaults, Notebook, Scope};
