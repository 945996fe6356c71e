//! scopecalc_engine - Line parsing, dependency analysis, function modules and evaluation.

pub mod engine;
