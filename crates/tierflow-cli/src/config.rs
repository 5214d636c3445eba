//! Layout tuning loaded from `config.toml`.
//!
//! The file carries two optional tables, `[layout]` for the layered layout
//! engine (layer height, sibling spacing, endpoint matching, debounce) and
//! `[coordinates]` for the screen mapping caches and retry budget. Missing
//! keys keep their defaults.
//!
//! ```toml
//! [layout]
//! base_height = 150.0
//!
//! [coordinates]
//! transform_cache_ms = 50
//! ```

use std::{fs, path::Path};

use directories::ProjectDirs;
use log::{debug, info};

use tierflow::config::AppConfig;

use crate::error::{CliError, ConfigError};

/// Resolves the layout engine configuration for one CLI run.
///
/// The first of these wins:
/// 1. `--config <path>`
/// 2. `tierflow/config.toml` under the working directory
/// 3. `config.toml` in the platform config directory for `tierflow`
/// 4. built-in engine defaults
///
/// # Errors
///
/// Fails when `--config` names a missing file, or when the chosen file is
/// not a valid `[layout]`/`[coordinates]` document.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, CliError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading layout configuration from explicit path");
        return load_config_file(path);
    }

    let local_config = Path::new("tierflow/config.toml");
    if local_config.exists() {
        info!(path = local_config.display().to_string(); "Loading configuration from local path");
        return load_config_file(local_config);
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "tierflow", "tierflow") {
        let system_config = proj_dirs.config_dir().join("config.toml");
        if system_config.exists() {
            info!(path = system_config.display().to_string(); "Loading configuration from system path");
            return load_config_file(system_config);
        }
        debug!(path = system_config.display().to_string(); "System configuration file not found");
    } else {
        debug!("Could not determine platform-specific config directory");
    }

    debug!("No configuration file found, using default configuration");
    Ok(AppConfig::default())
}

/// Parses one TOML file into engine settings
fn load_config_file(path: impl AsRef<Path>) -> Result<AppConfig, CliError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()).into());
    }

    let content = fs::read_to_string(path)?;
    let config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(config)
}
