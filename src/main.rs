//! Scopecalc - A notebook calculator with scoped lines and function modules

mod commands;
mod config;
mod error;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scopecalc", version)]
#[command(about = "Notebook calculator with scoped lines and user function modules")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory holding the stored scopes and modules
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Config file (default: config.toml in the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate lines as a scratch scope
    Eval {
        /// Lines, in order
        #[arg(required = true)]
        lines: Vec<String>,

        /// Load a module from a file (repeatable)
        #[arg(short, long = "module", value_name = "NAME=FILE", value_parser = commands::parse_module_arg)]
        modules: Vec<commands::ModuleArg>,
    },

    /// Print the evaluated lines of a stored scope
    Show {
        /// Scope name (default: the active scope)
        scope: Option<String>,
    },

    /// List stored scopes
    Scopes,

    /// List stored modules with their functions
    Modules,

    /// Migrate stored records to the current schema
    Migrate,

    /// Create a stored scope
    NewScope { name: String },

    /// Append a line to a stored scope
    Append { scope: String, text: String },

    /// Create a stored module from the template, or from a file
    NewModule {
        name: String,

        /// Use this file's contents as the module source
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (config, warnings) = config::load_config(cli.config.as_deref());
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
    let ctx = commands::Context::new(cli.store, config);

    match cli.command {
        Some(Command::Eval { lines, modules }) => commands::eval(&lines, &modules),
        Some(Command::Show { scope }) => commands::show(&ctx, scope.as_deref()),
        None => commands::show(&ctx, None),
        Some(Command::Scopes) => commands::scopes(&ctx),
        Some(Command::Modules) => commands::modules(&ctx),
        Some(Command::Migrate) => commands::migrate(&ctx),
        Some(Command::NewScope { name }) => commands::new_scope(&ctx, &name),
        Some(Command::Append { scope, text }) => commands::append(&ctx, &scope, &text),
        Some(Command::NewModule { name, file }) => {
            commands::new_module(&ctx, &name, file.as_deref())
        }
    }
}
