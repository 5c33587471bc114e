use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::BaseDirs;
use waterfall_config::WaterfallFile;

const APPLICATION_DIR: &str = "waterfall-view";
const CONFIG_FILE: &str = "waterfall.toml";

/// Where the configuration came from, for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    UserDefault(PathBuf),
    BuiltIn,
}

pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.config_dir().join(APPLICATION_DIR).join(CONFIG_FILE))
}

/// Loads `explicit` if given (it must exist), else the per-user file if
/// present, else the built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<(WaterfallFile, ConfigSource)> {
    if let Some(path) = explicit {
        let file = read_config(path)?;
        return Ok((file, ConfigSource::Explicit(path.to_path_buf())));
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            let file = read_config(&path)?;
            Ok((file, ConfigSource::UserDefault(path)))
        }
        _ => Ok((WaterfallFile::default(), ConfigSource::BuiltIn)),
    }
}

fn read_config(path: &Path) -> Result<WaterfallFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    WaterfallFile::from_toml_str(&contents)
        .with_context(|| format!("failed to load config at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_path_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("waterfall.toml");
        fs::write(&path, "version = 1\n[display]\nrow_height = 4\n").unwrap();

        let (file, source) = load_config(Some(&path)).unwrap();
        assert_eq!(file.display.row_height, 4);
        assert_eq!(source, ConfigSource::Explicit(path));
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn invalid_file_reports_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "version = 7\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported config version 7"));
        assert!(err.to_string().contains("bad.toml"));
    }
}
