//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/contextweave/config.toml)
//! 3. Project config (.contextweave/config.toml)
//! 4. Environment variables (CONTEXTWEAVE_* prefix, `__` between levels)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, WeaveError};

const ENV_PREFIX: &str = "CONTEXTWEAVE_";
const PROJECT_DIR: &str = ".contextweave";
const CONFIG_FILE: &str = "config.toml";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current directory:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_in(Path::new("."))
    }

    /// Load configuration with `root` as the project directory
    pub fn load_in(root: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Merge global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        // Merge project config
        let project_path = Self::project_config_path(root);
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // e.g. CONTEXTWEAVE_ENGINE__PAGE_SIZE -> engine.page_size
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| WeaveError::Config(format!("Configuration error: {}", e)))?;

        // Validate configuration after loading
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| WeaveError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/contextweave/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("contextweave"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Get path to project config file
    pub fn project_config_path(root: &Path) -> PathBuf {
        Self::project_dir(root).join(CONFIG_FILE)
    }

    /// Get project data directory
    pub fn project_dir(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(root: &Path) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path(root);
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Show current effective configuration
    pub fn show_config(config: &Config, as_json: bool) -> Result<()> {
        if as_json {
            println!("{}", serde_json::to_string_pretty(config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(config).map_err(|e| WeaveError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            WeaveError::Config("Cannot determine global config directory".to_string())
        })?;
        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join(CONFIG_FILE);
        Self::write_template(&config_path, Self::default_global_config(), force)?;
        Ok(config_path)
    }

    /// Initialize project configuration under `root`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir(root);
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join(CONFIG_FILE);
        Self::write_template(&config_path, Self::default_project_config(), force)?;
        Ok(config_path)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn write_template(path: &Path, content: String, force: bool) -> Result<()> {
        if !path.exists() || force {
            fs::write(path, content)?;
            info!("Created config: {}", path.display());
        } else {
            info!("Config exists: {}", path.display());
        }
        Ok(())
    }

    /// Generate default global config content (TOML)
    fn default_global_config() -> String {
        r#"# ContextWeave Global Configuration
# User-wide defaults. Project settings in .contextweave/config.toml override these.

version = "1.0"

[validation]
max_utilization_percentage = 80.0
cost_sensitivity = "high"
complexity = "moderate"

[compression]
quality_threshold = 60.0
"#
        .to_string()
    }

    /// Generate default project config content (TOML)
    fn default_project_config() -> String {
        r#"# ContextWeave Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[defaults]
enable_intelligent_prioritization = true
enable_content_summarization = true
enable_chunking = true
preserve_critical_context = true
include_stakeholders = true
include_compliance_data = true
# max_documents = 50
# clustering_strategy = "hierarchical"

[storage]
database_path = ".contextweave/documents.db"

# Declaring providers replaces the built-in table.
# [[providers]]
# provider = "ollama"
# model = "llama3.1:8b"
# context_window = 8192
# max_input_tokens = 8192
# max_output_tokens = 2048
# cost_per_1k_tokens = 0.0
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_in(temp_dir.path()).unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_init_project_template_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert!(path.exists());
        assert!(temp_dir.path().join(".contextweave/config.toml").exists());

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.defaults.preserve_critical_context);
        assert!(!config.providers.is_empty());
    }

    #[test]
    fn test_project_config_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".contextweave");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            r#"
[engine]
max_clusters = 5

[[providers]]
provider = "local"
model = "tiny"
context_window = 4096
max_input_tokens = 4096
max_output_tokens = 512
cost_per_1k_tokens = 0.0
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_in(temp_dir.path()).unwrap();
        assert_eq!(config.engine.max_clusters, 5);
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].model, "tiny");
    }

    #[test]
    fn test_invalid_project_config_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "[compression]\nquality_threshold = 150.0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(WeaveError::Config(_))
        ));
    }

    #[test]
    fn test_env_override() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: This test runs in isolation
        unsafe {
            std::env::set_var("CONTEXTWEAVE_ENGINE__PAGE_SIZE", "25");
        }
        let config = ConfigLoader::load_in(temp_dir.path());
        unsafe {
            std::env::remove_var("CONTEXTWEAVE_ENGINE__PAGE_SIZE");
        }
        assert_eq!(config.unwrap().engine.page_size, 25);
    }
}
