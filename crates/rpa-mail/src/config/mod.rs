pub mod accessor;
pub mod loader;
pub mod schema;

pub use accessor::{get_bool, get_duration_from_seconds, get_int32, get_string, ConfigMap};
pub use loader::{load_settings, load_settings_from_json, load_settings_from_yaml};
pub use schema::{AttachmentSettings, MailboxSettings, RetrySettings, Settings};
