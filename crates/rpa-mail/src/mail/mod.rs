//! Canonical mail records and the adapters that produce them.

pub mod checksum;
mod encoding;
pub mod model;
pub mod normalize;
pub mod source;

pub use checksum::{combined_checksum, is_checksum};
pub use model::{Attachment, Mail, MailAddress, ProcessingStatus};
pub use normalize::normalize;
pub use source::{CloudAttachment, CloudMessage, MimeMessage, SourceAttachment, SourceMessage};
