use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::presence::{DataSourceId, FormatSpec, PLACEHOLDER};

const CONFIG_FILE: &str = "config.json";

/// User-facing options, re-read on every presence refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceConfig {
    pub is_enabled: bool,
    /// Format for the details line, `%s` placeholders, up to 2
    pub details_format: String,
    /// Format for the state line, `%s` placeholders, up to 2
    pub state_format: String,
    /// Discord application id, needed for custom assets
    pub app_id: String,
    /// DIMENSION, USERNAME, HEALTH, HUNGER, SERVER or HELD_ITEM
    pub format_args: Vec<String>,
    pub large_text: String,
    pub small_text: String,
    /// Only change when using a custom application
    pub large_image: String,
    pub small_image: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            details_format: "%s | %s".to_string(),
            state_format: "%s | %s".to_string(),
            app_id: "928401525842259979".to_string(),
            format_args: [
                DataSourceId::Username,
                DataSourceId::Health,
                DataSourceId::Hunger,
                DataSourceId::Dimension,
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            large_text: "Playing minecraft".to_string(),
            small_text: "With YARPC".to_string(),
            large_image: String::new(),
            small_image: String::new(),
        }
    }
}

impl PresenceConfig {
    pub fn format_spec(&self) -> FormatSpec {
        FormatSpec::new(
            self.details_format.as_str(),
            self.state_format.as_str(),
            self.format_args.iter().map(String::as_str),
        )
    }

    pub fn app_id(&self) -> Result<i64, ConfigError> {
        self.app_id
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAppId(self.app_id.clone()))
    }

    /// Log entries that will be ignored at resolve time
    fn report_oddities(&self) {
        for arg in &self.format_args {
            if arg.parse::<DataSourceId>().is_err() {
                tracing::debug!("Ignoring unknown format argument {:?}", arg);
            }
        }
        for format in [&self.details_format, &self.state_format] {
            if format.matches(PLACEHOLDER).count() > 2 {
                tracing::debug!("Format {:?} has more than 2 placeholders", format);
            }
        }
    }
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yarpc")
        .join(CONFIG_FILE)
}

/// Shared, hot-reloadable configuration
#[derive(Clone)]
pub struct ConfigStore {
    current: Arc<RwLock<PresenceConfig>>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// In-memory store that is not backed by a file
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_config(&path)?;
        Ok(Self {
            current: Arc::new(RwLock::new(config)),
            path: Some(path),
        })
    }

    pub fn current(&self) -> PresenceConfig {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, config: PresenceConfig) {
        config.report_oddities();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Re-read the backing file; the previous config is kept on error
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let config = read_config(path)?;
        tracing::info!("Reloaded config from {}", path.display());
        self.replace(config);
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        tracing::debug!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.current())?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn read_config(path: &Path) -> Result<PresenceConfig, ConfigError> {
    tracing::debug!("Loading config from {}", path.display());
    if !path.exists() {
        return Ok(PresenceConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: PresenceConfig = serde_json::from_str(&contents)?;
    config.report_oddities();
    Ok(config)
}
