//! Subcommand implementations.

use crate::config::{self, Config};
use crate::error::ArgError;
use anyhow::{Context as _, Result, anyhow};
use log::debug;
use scopecalc_core::{FileStore, Notebook, Scope, Storage};
use scopecalc_engine::engine::{FunctionModule, Line, evaluate_all, format_value, is_valid_identifier};
use std::fs;
use std::path::{Path, PathBuf};

/// A `-m NAME=FILE` argument.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleArg {
    pub name: String,
    pub path: PathBuf,
}

pub fn parse_module_arg(arg: &str) -> Result<ModuleArg, ArgError> {
    let Some((name, path)) = arg.split_once('=') else {
        return Err(ArgError::MissingSeparator(arg.to_string()));
    };
    let name = name.trim();
    if !is_valid_identifier(name) {
        return Err(ArgError::InvalidModuleName(name.to_string()));
    }
    Ok(ModuleArg {
        name: name.to_string(),
        path: PathBuf::from(path),
    })
}

/// Resolved settings shared by the store-backed commands.
pub struct Context {
    store_dir: Option<PathBuf>,
    config: Config,
}

impl Context {
    pub fn new(store_flag: Option<PathBuf>, config: Config) -> Self {
        let store_dir = store_flag
            .or_else(|| config.store_dir.clone())
            .or_else(config::default_store_dir);
        Context { store_dir, config }
    }

    fn storage(&self) -> Result<Storage<FileStore>> {
        let dir = self
            .store_dir
            .as_ref()
            .ok_or_else(|| anyhow!("no store directory; pass --store"))?;
        debug!("using store {}", dir.display());
        Ok(Storage::new(FileStore::new(dir)))
    }

    fn open(&self) -> Result<(Notebook, Storage<FileStore>)> {
        let mut storage = self.storage()?;
        let notebook = Notebook::load(&mut storage)
            .context("failed to load the store")?
            .with_module_defaults(self.config.module_defaults.clone());
        Ok((notebook, storage))
    }
}

fn render_line(line: &Line) -> String {
    match &line.error {
        Some(message) => format!("{}: error: {}", line.index, message),
        None => format!("{}: {}", line.index, format_value(&line.value))
            .trim_end()
            .to_string(),
    }
}

fn find_scope<'a>(notebook: &'a Notebook, name: Option<&str>) -> Result<&'a Scope> {
    match name {
        Some(name) => notebook
            .scope_by_name(name)
            .ok_or_else(|| anyhow!("no scope named '{}'", name)),
        None => notebook
            .active_scope()
            .ok_or_else(|| anyhow!("no scopes stored yet; create one with new-scope")),
    }
}

pub fn eval(texts: &[String], module_args: &[ModuleArg]) -> Result<()> {
    let mut modules = Vec::with_capacity(module_args.len());
    for arg in module_args {
        let source = fs::read_to_string(&arg.path)
            .with_context(|| format!("failed to read module file {}", arg.path.display()))?;
        modules.push(FunctionModule::new(format!("file-{}", arg.name), &arg.name, source));
    }

    let lines: Vec<Line> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| Line::from_text(i, text))
        .collect();
    for line in evaluate_all(&lines, &modules) {
        println!("{}", render_line(&line));
    }
    Ok(())
}

pub fn show(ctx: &Context, scope: Option<&str>) -> Result<()> {
    let (notebook, _) = ctx.open()?;
    let scope = find_scope(&notebook, scope)?;
    for line in &scope.lines {
        println!("{}", render_line(line));
    }
    Ok(())
}

pub fn scopes(ctx: &Context) -> Result<()> {
    let (notebook, _) = ctx.open()?;
    for scope in &notebook.scopes {
        println!("{} ({} lines)", scope.name, scope.lines.len());
    }
    Ok(())
}

pub fn modules(ctx: &Context) -> Result<()> {
    let (notebook, _) = ctx.open()?;
    for module in &notebook.modules {
        let compiled = module.compile();
        let saved = if module.is_saved { "" } else { " (unsaved)" };
        println!("@{} [{}]{}", module.name, module.color_tag, saved);
        for callable in compiled.functions.values() {
            println!("  {}", callable.signature());
        }
        for diagnostic in &compiled.diagnostics {
            println!("  ! {}", diagnostic);
        }
    }
    Ok(())
}

pub fn migrate(ctx: &Context) -> Result<()> {
    let mut storage = ctx.storage()?;
    let migrated = storage.load().context("failed to load the store")?;
    if migrated.changed {
        println!(
            "Migrated {} scopes and {} modules",
            migrated.scopes.len(),
            migrated.modules.len()
        );
    } else {
        println!("Nothing to migrate");
    }
    Ok(())
}

pub fn new_scope(ctx: &Context, name: &str) -> Result<()> {
    let (mut notebook, mut storage) = ctx.open()?;
    notebook.create_scope(name)?;
    notebook.save(&mut storage)?;
    Ok(())
}

pub fn append(ctx: &Context, scope: &str, text: &str) -> Result<()> {
    let (mut notebook, mut storage) = ctx.open()?;
    let id = find_scope(&notebook, Some(scope))?.id.clone();
    let blank_scope = notebook
        .scope(&id)
        .is_some_and(|s| s.lines.len() == 1 && s.lines[0].is_blank());
    let index = if blank_scope {
        notebook.update_line(&id, 0, text)?;
        0
    } else {
        notebook.add_line(&id, text, None)?
    };
    if let Some(line) = notebook.scope(&id).map(|s| &s.lines[index]) {
        println!("{}", render_line(line));
    }
    notebook.save(&mut storage)?;
    Ok(())
}

pub fn new_module(ctx: &Context, name: &str, file: Option<&Path>) -> Result<()> {
    let (mut notebook, mut storage) = ctx.open()?;
    let id = notebook.add_module(name)?;
    if let Some(path) = file {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read module file {}", path.display()))?;
        notebook.update_module_source(&id, &source)?;
    }
    notebook.save_module(&id)?;
    for diagnostic in notebook.module_diagnostics(&id)? {
        eprintln!("Warning: {}", diagnostic);
    }
    notebook.save(&mut storage)?;
    Ok(())
}
