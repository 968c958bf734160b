//! The normalize run behind the `rpa-mail normalize` command.
//!
//! Reads input files, normalizes them, optionally saves attachments and
//! wraps the outcome into a [`NormalizeReport`] with a status record.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{info, info_span, warn};

use crate::config::{load_settings, Settings};
use crate::error::{MailError, RpaMailError};
use crate::mail::{combined_checksum, normalize, CloudMessage, Mail, MimeMessage};
use crate::storage::{self, AttachmentStore, CacheCleanup};
use crate::status::Status;

/// Value of `Status::source` on every report.
pub const REPORT_SOURCE: &str = "rpa-mail normalize";

/// `Status::code` of a successful run.
pub const SUCCESS_CODE: &str = "NORMALIZED";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Raw RFC 5322 messages (`.eml`).
    #[default]
    Mime,
    /// JSON exports from the cloud mail API, one message or an array each.
    Cloud,
}

/// Where attachments go after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveTarget {
    #[default]
    Skip,
    /// Below this directory.
    Directory(PathBuf),
    /// Below `attachments.cache_root`, or the default cache when unset.
    Configured,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeRequest {
    pub source: SourceKind,
    /// Overrides `attachments.extension` from the settings.
    pub extension: Option<String>,
    pub save: SaveTarget,
    pub inputs: Vec<PathBuf>,
}

/// Mails produced by a successful run.
#[derive(Debug)]
pub struct NormalizeOutput {
    pub mails: Vec<Mail>,
    /// Set only when the default cache was wiped before saving.
    pub cleanup: Option<CacheCleanup>,
}

/// What the command prints: the status, the batch checksum and the mails.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub status: Status,
    pub combined_checksum: String,
    pub mails: Vec<Mail>,
}

impl NormalizeReport {
    /// Builds the report for a finished run. Failures become retryable or
    /// non-retryable statuses and leave the mail list empty.
    pub fn from_result(result: Result<NormalizeOutput, RpaMailError>, duration_ms: u64) -> Self {
        let (status, mails) = match result {
            Ok(output) => {
                let mut details = serde_json::Map::new();
                details.insert("mailCount".to_string(), json!(output.mails.len()));
                details.insert(
                    "attachmentCount".to_string(),
                    json!(output
                        .mails
                        .iter()
                        .map(|m| m.attachments.len())
                        .sum::<usize>()),
                );
                if let Some(cleanup) = &output.cleanup {
                    details.insert("cacheCleanup".to_string(), json!(describe_cleanup(cleanup)));
                }

                let status =
                    Status::success(Some(SUCCESS_CODE.to_string()), Some(details), duration_ms);
                (status, output.mails)
            }
            Err(err) => {
                warn!("Normalization failed: {}", err);
                let mut status = if err.is_retryable() {
                    Status::retryable_from_error(&err)
                } else {
                    Status::non_retryable_from_error(&err)
                };
                status.duration_ms = duration_ms;
                (status, Vec::new())
            }
        };

        Self {
            status: status.with_source(REPORT_SOURCE),
            combined_checksum: combined_checksum(&mails),
            mails,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Runs one normalize request with the settings at `config`, or defaults.
///
/// Never fails: problems loading settings or inputs end up in the status.
pub fn run_normalize(config: Option<&Path>, request: &NormalizeRequest) -> NormalizeReport {
    let started = Instant::now();

    let result = match config {
        Some(path) => load_settings(path).map_err(RpaMailError::from),
        None => Ok(Settings::default()),
    }
    .and_then(|settings| Pipeline::new(settings).process(request));

    NormalizeReport::from_result(result, started.elapsed().as_millis() as u64)
}

/// Normalization bound to one set of settings.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The request's extension filter, else the configured one.
    pub fn extension_filter<'a>(&'a self, request: &'a NormalizeRequest) -> Option<&'a str> {
        request
            .extension
            .as_deref()
            .or(self.settings.attachments.extension.as_deref())
    }

    pub fn process(&self, request: &NormalizeRequest) -> Result<NormalizeOutput, RpaMailError> {
        let extension = self.extension_filter(request);
        let _span = info_span!(
            "pipeline",
            inputs = request.inputs.len(),
            filter = extension.unwrap_or("")
        )
        .entered();

        let raw_inputs = request
            .inputs
            .iter()
            .map(|path| read_input(path))
            .collect::<Result<Vec<_>, _>>()?;

        let mailbox = &self.settings.mailbox;
        let mut mails = match request.source {
            SourceKind::Mime => {
                let messages = raw_inputs
                    .iter()
                    .map(|raw| MimeMessage::parse(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                normalize(&messages, mailbox, extension)?
            }
            SourceKind::Cloud => {
                let mut messages = Vec::new();
                for raw in &raw_inputs {
                    let text = String::from_utf8_lossy(raw);
                    messages.extend(CloudMessage::from_json_batch(&text)?);
                }
                normalize(&messages, mailbox, extension)?
            }
        };

        info!("Normalized {} mails", mails.len());

        let cleanup = match &request.save {
            SaveTarget::Skip => None,
            SaveTarget::Directory(dir) => {
                AttachmentStore::new(dir)?.save_all(&mut mails)?;
                None
            }
            SaveTarget::Configured => self.save_configured(&mut mails)?,
        };

        Ok(NormalizeOutput { mails, cleanup })
    }

    fn save_configured(&self, mails: &mut [Mail]) -> Result<Option<CacheCleanup>, RpaMailError> {
        let attachments = &self.settings.attachments;

        if let Some(root) = &attachments.cache_root {
            AttachmentStore::new(root)?.save_all(mails)?;
            return Ok(None);
        }

        if attachments.clean_default_cache {
            let report = storage::save_all_attachments(mails, None)?;
            return Ok(report.cleanup);
        }

        AttachmentStore::new(storage::default_cache_root())?.save_all(mails)?;
        Ok(None)
    }
}

pub fn describe_cleanup(cleanup: &CacheCleanup) -> String {
    match cleanup {
        CacheCleanup::Removed => "removed".to_string(),
        CacheCleanup::NotPresent => "not present".to_string(),
        CacheCleanup::Failed(e) => format!("failed: {}", e),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, MailError> {
    std::fs::read(path).map_err(|e| MailError::ReadSource {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AttachmentSettings;

    #[test]
    fn test_request_extension_overrides_settings() {
        let pipeline = Pipeline::new(Settings {
            attachments: AttachmentSettings {
                extension: Some("csv".to_string()),
                ..AttachmentSettings::default()
            },
            ..Settings::default()
        });

        let mut request = NormalizeRequest::default();
        assert_eq!(pipeline.extension_filter(&request), Some("csv"));

        request.extension = Some("pdf".to_string());
        assert_eq!(pipeline.extension_filter(&request), Some("pdf"));
    }

    #[test]
    fn test_describe_cleanup() {
        assert_eq!(describe_cleanup(&CacheCleanup::Removed), "removed");
        assert_eq!(describe_cleanup(&CacheCleanup::NotPresent), "not present");
        let failed = CacheCleanup::Failed(std::io::Error::other("busy"));
        assert_eq!(describe_cleanup(&failed), "failed: busy");
    }

    #[test]
    fn test_failure_report_has_no_mails() {
        let err = RpaMailError::from(MailError::Parse("garbled".to_string()));
        let report = NormalizeReport::from_result(Err(err), 7);

        assert!(!report.is_success());
        assert!(report.mails.is_empty());
        assert_eq!(report.status.duration_ms, 7);
        assert_eq!(report.status.source.as_deref(), Some(REPORT_SOURCE));
        assert_eq!(report.combined_checksum, combined_checksum(&Vec::<Mail>::new()));
    }
}
