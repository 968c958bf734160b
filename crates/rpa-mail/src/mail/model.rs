use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::MailError;

/// Number of body characters shown in the [`Mail`] summary.
const BODY_PREVIEW_CHARS: usize = 200;

/// A single mailbox address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailAddress {
    pub address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl MailAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: None,
        }
    }

    pub fn with_name(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            display_name: Some(display_name.into()),
        }
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => write!(f, "\"{}\" <{}>", name, self.address),
            _ => f.write_str(&self.address),
        }
    }
}

impl FromStr for MailAddress {
    type Err = MailError;

    /// Accepts `user@example.com`, `<user@example.com>` and
    /// `Name <user@example.com>` (the name may be quoted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (name, address) = match (s.rfind('<'), s.ends_with('>')) {
            (Some(open), true) => {
                let name = s[..open].trim().trim_matches('"').trim();
                let address = s[open + 1..s.len() - 1].trim();
                (Some(name).filter(|n| !n.is_empty()), address)
            }
            _ => (None, s),
        };

        if address.is_empty() || address.contains(char::is_whitespace) {
            return Err(MailError::Parse(format!("invalid mail address: {:?}", s)));
        }

        Ok(Self {
            address: address.to_string(),
            display_name: name.map(str::to_string),
        })
    }
}

/// An attachment whose content has been read fully into memory.
///
/// The JSON form also carries a derived `size`, which is ignored when read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(with = "super::encoding", default)]
    pub content_bytes: Vec<u8>,
    /// Set once the attachment has been written to disk.
    #[serde(default)]
    pub temp_file_path: Option<PathBuf>,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content_type: Option<String>,
        content_bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            content_bytes,
            temp_file_path: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.content_bytes.len() as u64
    }
}

impl Serialize for Attachment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Attachment", 5)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("contentType", &self.content_type)?;
        state.serialize_field("contentBytes", &super::encoding::encode(&self.content_bytes))?;
        state.serialize_field("size", &self.size())?;
        state.serialize_field("tempFilePath", &self.temp_file_path)?;
        state.end()
    }
}

/// Renders as `name (content/type, N bytes)`. This rendering feeds the
/// mail checksum, so it must stay stable.
impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} bytes)",
            self.name,
            self.content_type.as_deref().unwrap_or(""),
            self.size()
        )
    }
}

/// Where a mail stands in the orchestrator's workflow.
///
/// Transitions are owned by the orchestration layer and are not validated here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
    Escalated,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStatus::Pending => "Pending",
            ProcessingStatus::Processing => "Processing",
            ProcessingStatus::Completed => "Completed",
            ProcessingStatus::Failed => "Failed",
            ProcessingStatus::Skipped => "Skipped",
            ProcessingStatus::Escalated => "Escalated",
        };
        f.write_str(name)
    }
}

/// The canonical mail record every source is normalized into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Mail {
    pub message_id: Option<String>,
    pub subject: String,
    pub body: String,
    pub from: Option<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub attachments: Vec<Attachment>,

    pub mailbox_account: Option<String>,
    pub source_folder: Option<String>,
    pub current_folder: Option<String>,
    pub temp_processing_folder: Option<PathBuf>,
    pub target_folder_success: Option<String>,
    pub target_folder_handover: Option<String>,

    pub is_automatable: bool,
    pub is_potential_duplicate: bool,
    pub is_retry: bool,
    pub was_moved: bool,
    pub processing_status: ProcessingStatus,
    pub failure_reason: Option<String>,

    /// Content fingerprint taken at normalization time. Later edits to the
    /// record do not update it.
    pub checksum: Option<String>,
}

impl Mail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_json(&self, indented: bool) -> Result<String, MailError> {
        let json = if indented {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self, MailError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for Mail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== Mail ==")?;
        writeln!(f, "MessageId: {}", opt(&self.message_id))?;
        writeln!(f, "Subject: {}", self.subject)?;
        writeln!(
            f,
            "From: {}",
            self.from.as_ref().map(ToString::to_string).unwrap_or_default()
        )?;
        writeln!(f, "To: {}", join(&self.to, ", "))?;
        writeln!(f, "CC: {}", join(&self.cc, ", "))?;
        writeln!(f, "Body: {}", body_preview(&self.body))?;
        writeln!(f, "Attachments: {}", self.attachments.len())?;
        for att in &self.attachments {
            writeln!(
                f,
                "  - {} ({}, {} bytes)",
                att.name,
                att.content_type.as_deref().unwrap_or(""),
                att.size()
            )?;
            if let Some(path) = &att.temp_file_path {
                writeln!(f, "    Path: {}", path.display())?;
            }
        }

        writeln!(f, "--- Routing Info ---")?;
        writeln!(f, "MailboxAccount: {}", opt(&self.mailbox_account))?;
        writeln!(f, "SourceFolder: {}", opt(&self.source_folder))?;
        writeln!(f, "CurrentFolder: {}", opt(&self.current_folder))?;
        writeln!(
            f,
            "TempProcessingFolder: {}",
            self.temp_processing_folder
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )?;
        writeln!(f, "TargetFolderSuccess: {}", opt(&self.target_folder_success))?;
        writeln!(f, "TargetFolderHandover: {}", opt(&self.target_folder_handover))?;

        writeln!(f, "--- Processing Flags ---")?;
        writeln!(f, "IsAutomatable: {}", self.is_automatable)?;
        writeln!(f, "IsPotentialDuplicate: {}", self.is_potential_duplicate)?;
        writeln!(f, "IsRetry: {}", self.is_retry)?;
        writeln!(f, "WasMoved: {}", self.was_moved)?;
        writeln!(f, "ProcessingStatus: {}", self.processing_status)?;
        writeln!(f, "FailureReason: {}", opt(&self.failure_reason))?;

        writeln!(f, "Checksum: {}", opt(&self.checksum))
    }
}

pub(crate) fn join<T: fmt::Display>(items: &[T], separator: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn body_preview(body: &str) -> String {
    if body.trim().is_empty() {
        return "[Empty]".to_string();
    }

    let mut chars = body.chars();
    let preview: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_display() {
        assert_eq!(MailAddress::new("a@example.com").to_string(), "a@example.com");
        assert_eq!(
            MailAddress::with_name("Alice Doe", "a@example.com").to_string(),
            "\"Alice Doe\" <a@example.com>"
        );
    }

    #[test]
    fn test_address_parse() {
        let plain: MailAddress = "  bob@example.com ".parse().unwrap();
        assert_eq!(plain, MailAddress::new("bob@example.com"));

        let named: MailAddress = "\"Bob B.\" <bob@example.com>".parse().unwrap();
        assert_eq!(named, MailAddress::with_name("Bob B.", "bob@example.com"));

        let bracketed: MailAddress = "<bob@example.com>".parse().unwrap();
        assert_eq!(bracketed.display_name, None);

        assert!("".parse::<MailAddress>().is_err());
        assert!("not an address".parse::<MailAddress>().is_err());
    }

    #[test]
    fn test_attachment_size_and_display() {
        let att = Attachment::new("report.pdf", Some("application/pdf".into()), vec![1, 2, 3]);
        assert_eq!(att.size(), 3);
        assert_eq!(att.to_string(), "report.pdf (application/pdf, 3 bytes)");

        let untyped = Attachment::new("blob", None, Vec::new());
        assert_eq!(untyped.to_string(), "blob (, 0 bytes)");
    }

    #[test]
    fn test_new_mail_defaults() {
        let mail = Mail::new();
        assert_eq!(mail.processing_status, ProcessingStatus::Pending);
        assert!(!mail.is_automatable);
        assert!(!mail.is_potential_duplicate);
        assert!(!mail.is_retry);
        assert!(!mail.was_moved);
        assert!(mail.to.is_empty());
        assert!(mail.attachments.is_empty());
        assert!(mail.checksum.is_none());
    }

    #[test]
    fn test_json_round_trip_keeps_bytes_and_flags() {
        let mut mail = Mail {
            message_id: Some("<1@example.com>".into()),
            subject: "Invoice".into(),
            from: Some(MailAddress::new("billing@example.com")),
            attachments: vec![Attachment::new(
                "inv.pdf",
                Some("application/pdf".into()),
                b"%PDF-1.7".to_vec(),
            )],
            processing_status: ProcessingStatus::Escalated,
            is_retry: true,
            ..Mail::default()
        };
        mail.checksum = Some("abc".into());

        let json = mail.to_json(false).unwrap();
        assert!(json.contains("\"contentBytes\":\"JVBERi0xLjc=\""));
        assert!(json.contains("\"size\":8"));
        assert!(json.contains("\"processingStatus\":\"Escalated\""));
        assert!(json.contains("\"messageId\""));

        let back = Mail::from_json(&json).unwrap();
        assert_eq!(back, mail);
    }

    #[test]
    fn test_from_json_tolerates_missing_fields() {
        let mail = Mail::from_json(r#"{ "subject": "Hello" }"#).unwrap();
        assert_eq!(mail.subject, "Hello");
        assert_eq!(mail.processing_status, ProcessingStatus::Pending);

        assert!(matches!(
            Mail::from_json("not json"),
            Err(MailError::Serialize(_))
        ));
    }

    #[test]
    fn test_display_summary() {
        let mail = Mail {
            subject: "Status".into(),
            body: "x".repeat(250),
            to: vec![MailAddress::new("a@example.com"), MailAddress::new("b@example.com")],
            attachments: vec![Attachment {
                temp_file_path: Some(PathBuf::from("/tmp/cache/a.txt")),
                ..Attachment::new("a.txt", Some("text/plain".into()), b"hi".to_vec())
            }],
            ..Mail::default()
        };

        let summary = mail.to_string();
        assert!(summary.starts_with("== Mail =="));
        assert!(summary.contains("To: a@example.com, b@example.com"));
        assert!(summary.contains(&format!("Body: {}...", "x".repeat(200))));
        assert!(summary.contains("  - a.txt (text/plain, 2 bytes)"));
        assert!(summary.contains("    Path: /tmp/cache/a.txt"));
        assert!(summary.contains("ProcessingStatus: Pending"));
    }

    #[test]
    fn test_display_empty_body() {
        let summary = Mail::default().to_string();
        assert!(summary.contains("Body: [Empty]"));
    }
}
