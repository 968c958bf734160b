pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod sanitize;
pub mod status;
pub mod storage;

pub use config::{load_settings, ConfigMap, MailboxSettings, Settings};
pub use error::{ConfigError, MailError, Result, RpaMailError, StatusError, StorageError};
pub use mail::{
    combined_checksum, normalize, Attachment, CloudMessage, Mail, MailAddress, MimeMessage,
    ProcessingStatus, SourceMessage,
};
pub use pipeline::{run_normalize, NormalizeReport, NormalizeRequest, Pipeline};
pub use status::{Status, StatusErrorType, StatusParams};
pub use storage::{save_all_attachments, save_attachments, AttachmentStore, CacheCleanup};
