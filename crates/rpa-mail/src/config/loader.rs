use std::path::Path;

use log::debug;

use crate::config::schema::Settings;
use crate::error::ConfigError;

/// Loads settings from a `.json`, `.yaml` or `.yml` file and validates them.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    debug!("Loading settings from {:?}", path);

    match extension.as_deref() {
        Some("json") => load_settings_from_json(&content),
        Some("yaml") | Some("yml") => load_settings_from_yaml(&content),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

pub fn load_settings_from_json(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn load_settings_from_yaml(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_yaml::from_str(content)?;
    settings.validate()?;
    Ok(settings)
}
