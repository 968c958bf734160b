use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpaMailError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Status error: {0}")]
    Status(#[from] StatusError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RpaMailError {
    /// Whether the orchestration layer may try the failed operation again.
    ///
    /// Only failures backed by an I/O error qualify; bad input stays bad.
    pub fn is_retryable(&self) -> bool {
        match self {
            RpaMailError::Config(ConfigError::ReadFile { .. }) => true,
            RpaMailError::Mail(MailError::ReadSource { .. } | MailError::ReadAttachment { .. }) => {
                true
            }
            RpaMailError::Storage(err) => !matches!(err, StorageError::InvalidArgument(_)),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration is missing")]
    NullConfig,

    #[error("Missing or invalid section: {section}")]
    SectionMissing { section: String },

    #[error("Missing key: {key} in section: {section}")]
    KeyMissing { section: String, key: String },

    #[error("Value for '{section}.{key}' cannot be read as {expected}: {found}")]
    TypeMismatch {
        section: String,
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Invalid errorType: {0}")]
    InvalidErrorType(String),
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to parse email: {0}")]
    Parse(String),

    #[error("Failed to read message source '{path}': {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read attachment '{name}': {source}")]
    ReadAttachment {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize mail: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve absolute path for '{path}': {source}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No free file name left for: {0}")]
    FileExists(PathBuf),
}

pub type Result<T> = std::result::Result<T, RpaMailError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_error() -> io::Error {
        io::Error::new(io::ErrorKind::PermissionDenied, "denied")
    }

    #[test]
    fn test_io_backed_errors_are_retryable() {
        let read = RpaMailError::from(ConfigError::ReadFile {
            path: PathBuf::from("settings.yaml"),
            source: io_error(),
        });
        assert!(read.is_retryable());

        let write = RpaMailError::from(StorageError::WriteFile {
            path: PathBuf::from("invoice.pdf"),
            source: io_error(),
        });
        assert!(write.is_retryable());

        let attachment = RpaMailError::from(MailError::ReadAttachment {
            name: "scan.pdf".to_string(),
            source: io_error(),
        });
        assert!(attachment.is_retryable());
    }

    #[test]
    fn test_input_errors_are_not_retryable() {
        assert!(!RpaMailError::from(ConfigError::NullConfig).is_retryable());
        assert!(!RpaMailError::from(MailError::Parse("bad".into())).is_retryable());
        assert!(!RpaMailError::from(StorageError::InvalidArgument("base".into())).is_retryable());
        assert!(
            !RpaMailError::from(StatusError::InvalidErrorType("fatal".into())).is_retryable()
        );
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::KeyMissing {
            section: "Retry".into(),
            key: "MaxAttempts".into(),
        };
        assert_eq!(err.to_string(), "Missing key: MaxAttempts in section: Retry");

        let wrapped = RpaMailError::from(err);
        assert!(wrapped.to_string().starts_with("Configuration error:"));
    }
}
