//! `config.toml` loading.

use directories::ProjectDirs;
use scopecalc_core::ModuleDefaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    store_dir: Option<PathBuf>,
    module_template: Option<String>,
    color_tags: Option<Vec<String>>,
}

/// Settings resolved from the config file, with defaults filled in.
#[derive(Debug, Default)]
pub struct Config {
    pub store_dir: Option<PathBuf>,
    pub module_defaults: ModuleDefaults,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "scopecalc")
}

fn user_config_path() -> Option<PathBuf> {
    let proj = project_dirs()?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

/// Platform data directory used when neither `--store` nor `store_dir` is given.
pub fn default_store_dir() -> Option<PathBuf> {
    project_dirs().map(|proj| proj.data_dir().to_path_buf())
}

/// Load the config from `explicit` or the user config dir.
///
/// Problems never fail the load; they come back as warnings and the
/// affected settings keep their defaults.
pub fn load_config(explicit: Option<&Path>) -> (Config, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = explicit.map(Path::to_path_buf).or_else(user_config_path) else {
        return (Config::default(), warnings);
    };

    if !path.exists() {
        if explicit.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Config::default(), warnings);
    }

    let file = match std::fs::metadata(&path) {
        Ok(meta) if meta.len() > MAX_CONFIG_FILE_BYTES => {
            warnings.push(format!(
                "Refusing to read {}: file too large ({} bytes, max {})",
                path.display(),
                meta.len(),
                MAX_CONFIG_FILE_BYTES
            ));
            None
        }
        Ok(_) => match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ConfigFile>(&content) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    warnings.push(format!("Failed to parse {}: {}", path.display(), err));
                    None
                }
            },
            Err(err) => {
                warnings.push(format!("Failed to read {}: {}", path.display(), err));
                None
            }
        },
        Err(err) => {
            warnings.push(format!(
                "Failed to read metadata for {}: {}",
                path.display(),
                err
            ));
            None
        }
    };

    let config = resolve(file.unwrap_or_default(), &mut warnings);
    (config, warnings)
}

fn resolve(file: ConfigFile, warnings: &mut Vec<String>) -> Config {
    let mut module_defaults = ModuleDefaults::default();
    if let Some(template) = file.module_template {
        module_defaults.template = template;
    }
    if let Some(tags) = file.color_tags {
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            warnings.push("color_tags is empty; using the built-in tags".to_string());
        } else {
            module_defaults.color_tags = tags;
        }
    }
    Config {
        store_dir: file.store_dir,
        module_defaults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_explicit_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(Some(&dir.path().join("nope.toml")));
        assert!(config.store_dir.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not found"));
    }

    #[test]
    fn test_reads_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "store_dir = \"/tmp/scopecalc\"\nmodule_template = \"// {name}\"\ncolor_tags = [\"pink\", \" \"]\n",
        )
        .unwrap();
        let (config, warnings) = load_config(Some(&path));
        assert!(warnings.is_empty());
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/scopecalc")));
        assert_eq!(config.module_defaults.template, "// {name}");
        assert_eq!(config.module_defaults.color_tags, vec!["pink".to_string()]);
    }

    #[test]
    fn test_unknown_fields_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "store_dir = \"/x\"\ntheme = \"dark\"\n").unwrap();
        let (config, warnings) = load_config(Some(&path));
        assert!(config.store_dir.is_none());
        assert!(warnings[0].starts_with("Failed to parse"));
    }

    #[test]
    fn test_empty_color_tags_keep_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "color_tags = []\n").unwrap();
        let (config, warnings) = load_config(Some(&path));
        assert_eq!(config.module_defaults.color_tags.len(), 5);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_oversized_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let big = format!("# {}\n", "x".repeat(MAX_CONFIG_FILE_BYTES as usize));
        fs::write(&path, big).unwrap();
        let (_, warnings) = load_config(Some(&path));
        assert!(warnings[0].starts_with("Refusing to read"));
    }
}
