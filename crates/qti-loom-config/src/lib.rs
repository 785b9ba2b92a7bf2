use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory relative item paths are looked up in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_path: Option<PathBuf>,
    pub serialize: SerializeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializeSettings {
    /// Spaces per nesting level in regenerated markup.
    pub indent: usize,
}

impl Default for SerializeSettings {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            log::debug!("no config at {}", config_path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the items path
        config.items_path = config
            .items_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/qti-loom");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Where to find `path`: as given when it exists, otherwise under
    /// `items_path` when that is set.
    pub fn resolve_item(&self, path: &Path) -> PathBuf {
        if path.exists() || path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.items_path {
            Some(items) => items.join(path),
            None => path.to_path_buf(),
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/qti-loom/config.toml"));
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config.items_path, None);
        assert_eq!(config.serialize.indent, 2);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let original = Config {
            items_path: Some(PathBuf::from("/tmp/items")),
            serialize: SerializeSettings { indent: 4 },
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(&PathBuf::from("~/test/path")).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_config_with_env_var_in_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            "items_path = \"$QTI_LOOM_TEST_ROOT/items\"\n\n[serialize]\nindent = 3\n",
        )
        .unwrap();
        unsafe {
            env::set_var("QTI_LOOM_TEST_ROOT", "/custom/root");
        }

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(config.items_path, Some(PathBuf::from("/custom/root/items")));
        assert_eq!(config.serialize.indent, 3);

        unsafe {
            env::remove_var("QTI_LOOM_TEST_ROOT");
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "serialize = 7").unwrap();

        let result = Config::load_from_path(&config_file);

        assert!(matches!(result, Err(ConfigError::ConfigParseError { .. })));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            items_path: Some(PathBuf::from("/tmp/items")),
            serialize: SerializeSettings::default(),
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_resolve_item_prefers_existing_path() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("item.xml");
        std::fs::write(&existing, "<itemBody/>").unwrap();
        let config = Config {
            items_path: Some(PathBuf::from("/items")),
            ..Config::default()
        };

        assert_eq!(config.resolve_item(&existing), existing);
        assert_eq!(
            config.resolve_item(Path::new("missing/item.xml")),
            PathBuf::from("/items/missing/item.xml")
        );
        assert_eq!(
            Config::default().resolve_item(Path::new("missing/item.xml")),
            PathBuf::from("missing/item.xml")
        );
    }
}
