use crate::models::{HubConfig, PreprocessTable};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use std::fs;

/// Prefix of environment variables overriding `statushub.yaml`, e.g.
/// `STATUSHUB__MAPS_DIR` or `STATUSHUB__PREPROCESS__MODE`.
pub const ENV_PREFIX: &str = "STATUSHUB";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages:
/// - Hub config (`statushub.yaml`): directories, modes, modules, preprocess settings
/// - Vehicle and preprocess documents, read through [`load_yaml`](Self::load_yaml)
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    hub_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "conf")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            hub_config_path: config_dir.join("statushub.yaml"),
            config_dir,
        })
    }

    /// Load the hub configuration.
    ///
    /// Layers, lowest priority first: built-in defaults, `statushub.yaml`
    /// (optional), `STATUSHUB__*` environment variables.
    pub fn load_hub_config(&self) -> Result<HubConfig> {
        if !self.hub_config_path.exists() {
            tracing::warn!(
                "Hub config file not found at {}, using defaults",
                self.hub_config_path
            );
        }

        let config: HubConfig = config::Config::builder()
            .add_source(
                config::File::new(self.hub_config_path.as_str(), config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read hub config: {}", self.hub_config_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse hub config: {}", self.hub_config_path))?;

        tracing::info!("Loaded hub config from {}", self.hub_config_path);
        Ok(config)
    }

    /// Save the hub configuration file.
    pub fn save_hub_config(&self, config: &HubConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize hub config to YAML")?;

        fs::write(&self.hub_config_path, yaml_string)
            .with_context(|| format!("Failed to write hub config: {}", self.hub_config_path))?;

        tracing::info!("Saved hub config to {}", self.hub_config_path);
        Ok(())
    }

    /// Read and parse any YAML document.
    pub fn load_yaml<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
        let file_contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;

        serde_yaml_ng::from_str(&file_contents).with_context(|| format!("Failed to parse {}", path))
    }

    /// Load a preprocess table.
    pub fn load_preprocess_table(path: &Utf8Path) -> Result<PreprocessTable> {
        Self::load_yaml(path).with_context(|| {
            format!("Unable to parse preprocess configuration from file {}", path)
        })
    }

    /// Persist a preprocess table, creating parent directories as needed.
    pub fn save_preprocess_table(path: &Utf8Path, table: &PreprocessTable) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent))?;
        }

        let yaml_string = serde_yaml_ng::to_string(table)
            .context("Failed to serialize preprocess table to YAML")?;

        fs::write(path, yaml_string)
            .with_context(|| format!("Failed to write preprocess table: {}", path))?;

        tracing::info!("Saved preprocess table to {}", path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the hub configuration file path.
    pub fn hub_config_path(&self) -> &Utf8Path {
        &self.hub_config_path
    }
}
