use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::accessor::{self, ConfigMap};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mailbox: MailboxSettings,
    #[serde(default)]
    pub attachments: AttachmentSettings,
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Where messages come from and where the orchestrator moves them to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxSettings {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub target_folder_success: Option<String>,
    #[serde(default)]
    pub target_folder_handover: Option<String>,
}

impl MailboxSettings {
    /// Reads the flat `MailboxAccount`, `MailboxFolder`, `TargetFolderSuccess`
    /// and `TargetFolderHandover` keys used by older orchestrator configs.
    ///
    /// Non-string values are rendered as text; `null` counts as absent.
    pub fn from_flat(config: &ConfigMap) -> Self {
        let text = |key: &str| match config.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };

        Self {
            account: text("MailboxAccount"),
            folder: text("MailboxFolder"),
            target_folder_success: text("TargetFolderSuccess"),
            target_folder_handover: text("TargetFolderHandover"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentSettings {
    /// Only keep attachments with this file extension.
    #[serde(default)]
    pub extension: Option<String>,
    /// Root directory for saved attachments. The default cache is used when unset.
    #[serde(default)]
    pub cache_root: Option<PathBuf>,
    /// Wipe the default cache before a batch is saved into it.
    #[serde(default = "default_true")]
    pub clean_default_cache: bool,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            extension: None,
            cache_root: None,
            clean_default_cache: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
}

impl RetrySettings {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or_default()
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            enabled: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> f64 {
    5.0
}

impl Settings {
    /// Builds settings from a raw `section -> key -> value` map.
    ///
    /// Sections are `Mailbox`, `Attachments` and `Retry` with PascalCase keys.
    /// Absent sections and keys fall back to defaults; present values must
    /// have a convertible type.
    pub fn from_raw(config: &ConfigMap) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let mailbox = MailboxSettings {
            account: optional(accessor::get_string(Some(config), "Mailbox", "Account"))?,
            folder: optional(accessor::get_string(Some(config), "Mailbox", "Folder"))?,
            target_folder_success: optional(accessor::get_string(
                Some(config),
                "Mailbox",
                "TargetFolderSuccess",
            ))?,
            target_folder_handover: optional(accessor::get_string(
                Some(config),
                "Mailbox",
                "TargetFolderHandover",
            ))?,
        };

        let attachments = AttachmentSettings {
            extension: optional(accessor::get_string(Some(config), "Attachments", "Extension"))?,
            cache_root: optional(accessor::get_string(Some(config), "Attachments", "CacheRoot"))?
                .map(PathBuf::from),
            clean_default_cache: optional(accessor::get_bool(
                Some(config),
                "Attachments",
                "CleanDefaultCache",
            ))?
            .unwrap_or(defaults.attachments.clean_default_cache),
        };

        let max_attempts = optional(accessor::get_int32(Some(config), "Retry", "MaxAttempts"))?;
        let max_attempts = match max_attempts {
            Some(n) => u32::try_from(n).map_err(|_| ConfigError::Validation {
                message: format!("Retry.MaxAttempts must not be negative, got {}", n),
            })?,
            None => defaults.retry.max_attempts,
        };

        let retry = RetrySettings {
            max_attempts,
            enabled: optional(accessor::get_bool(Some(config), "Retry", "Enabled"))?
                .unwrap_or(defaults.retry.enabled),
            timeout_secs: match config.get("Retry").and_then(Value::as_object) {
                Some(_) => accessor::get_duration_from_seconds(
                    Some(config),
                    "Retry",
                    "Timeout",
                    defaults.retry.timeout_secs,
                )?
                .as_secs_f64(),
                None => defaults.retry.timeout_secs,
            },
        };

        let settings = Settings {
            mailbox,
            attachments,
            retry,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }

        if !self.retry.timeout_secs.is_finite() || self.retry.timeout_secs < 0.0 {
            return Err(ConfigError::Validation {
                message: format!(
                    "retry.timeout_secs must be a non-negative number, got {}",
                    self.retry.timeout_secs
                ),
            });
        }

        if let Some(ext) = &self.attachments.extension {
            if ext.trim().trim_start_matches('.').is_empty() {
                return Err(ConfigError::Validation {
                    message: "attachments.extension must not be blank".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Turns a missing section or key into `None`; every other error stays an error.
fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::SectionMissing { .. }) | Err(ConfigError::KeyMissing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
