//! Adapters over the external mail sources.
//!
//! Every source exposes the same capability: identity, content, addresses
//! and attachments with a readable byte stream. The normalizer only talks
//! to [`SourceMessage`].

use std::borrow::Cow;
use std::io::{Cursor, Read};

use mail_parser::{Addr, Address, Message, MessageParser, MimeHeaders, PartType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::MailAddress;
use crate::error::MailError;

/// An attachment as offered by a source, before its content is read.
pub struct SourceAttachment<'a> {
    pub name: String,
    pub content_type: Option<String>,
    pub content: Box<dyn Read + 'a>,
}

impl<'a> SourceAttachment<'a> {
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: Option<String>,
        bytes: &'a [u8],
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            content: Box::new(Cursor::new(bytes)),
        }
    }
}

impl std::fmt::Debug for SourceAttachment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAttachment")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// A message from any mail source.
pub trait SourceMessage {
    fn message_id(&self) -> Option<String>;
    fn subject(&self) -> String;
    fn body(&self) -> String;
    fn sender(&self) -> Option<MailAddress>;
    fn to(&self) -> Vec<MailAddress>;
    fn cc(&self) -> Vec<MailAddress>;
    fn attachments(&self) -> Vec<SourceAttachment<'_>>;
}

impl<T: SourceMessage + ?Sized> SourceMessage for &T {
    fn message_id(&self) -> Option<String> {
        (**self).message_id()
    }
    fn subject(&self) -> String {
        (**self).subject()
    }
    fn body(&self) -> String {
        (**self).body()
    }
    fn sender(&self) -> Option<MailAddress> {
        (**self).sender()
    }
    fn to(&self) -> Vec<MailAddress> {
        (**self).to()
    }
    fn cc(&self) -> Vec<MailAddress> {
        (**self).cc()
    }
    fn attachments(&self) -> Vec<SourceAttachment<'_>> {
        (**self).attachments()
    }
}

impl<T: SourceMessage + ?Sized> SourceMessage for Box<T> {
    fn message_id(&self) -> Option<String> {
        (**self).message_id()
    }
    fn subject(&self) -> String {
        (**self).subject()
    }
    fn body(&self) -> String {
        (**self).body()
    }
    fn sender(&self) -> Option<MailAddress> {
        (**self).sender()
    }
    fn to(&self) -> Vec<MailAddress> {
        (**self).to()
    }
    fn cc(&self) -> Vec<MailAddress> {
        (**self).cc()
    }
    fn attachments(&self) -> Vec<SourceAttachment<'_>> {
        (**self).attachments()
    }
}

/// A message exported from the cloud mail API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudMessage {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub from: Option<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub attachments: Vec<CloudAttachment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudAttachment {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(with = "super::encoding", default)]
    pub content_bytes: Vec<u8>,
}

impl CloudMessage {
    /// Parses a JSON export holding either one message or an array of them.
    pub fn from_json_batch(json: &str) -> Result<Vec<CloudMessage>, MailError> {
        let value: Value = serde_json::from_str(json)?;
        let messages = match value {
            Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        Ok(messages)
    }
}

impl SourceMessage for CloudMessage {
    fn message_id(&self) -> Option<String> {
        self.message_id.clone()
    }

    fn subject(&self) -> String {
        self.subject.clone().unwrap_or_default()
    }

    fn body(&self) -> String {
        self.body.clone().unwrap_or_default()
    }

    fn sender(&self) -> Option<MailAddress> {
        self.from.clone()
    }

    fn to(&self) -> Vec<MailAddress> {
        self.to.clone()
    }

    fn cc(&self) -> Vec<MailAddress> {
        self.cc.clone()
    }

    fn attachments(&self) -> Vec<SourceAttachment<'_>> {
        self.attachments
            .iter()
            .map(|a| {
                SourceAttachment::from_bytes(
                    a.name.clone(),
                    a.content_type.clone(),
                    &a.content_bytes,
                )
            })
            .collect()
    }
}

/// An RFC 5322 message as read by a local mail client.
pub struct MimeMessage<'x> {
    message: Message<'x>,
}

impl<'x> MimeMessage<'x> {
    pub fn parse(raw: &'x [u8]) -> Result<Self, MailError> {
        let message = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailError::Parse("Failed to parse email message".to_string()))?;
        Ok(Self { message })
    }

    pub fn message(&self) -> &Message<'x> {
        &self.message
    }
}

impl SourceMessage for MimeMessage<'_> {
    /// The `Message-ID` header value, angle brackets included.
    fn message_id(&self) -> Option<String> {
        self.message.message_id().map(|id| format!("<{}>", id))
    }

    fn subject(&self) -> String {
        self.message.subject().unwrap_or_default().to_string()
    }

    fn body(&self) -> String {
        self.message
            .body_text(0)
            .map(Cow::into_owned)
            .unwrap_or_default()
    }

    fn sender(&self) -> Option<MailAddress> {
        self.message.from().and_then(|from| addresses(from).into_iter().next())
    }

    fn to(&self) -> Vec<MailAddress> {
        self.message.to().map(addresses).unwrap_or_default()
    }

    fn cc(&self) -> Vec<MailAddress> {
        self.message.cc().map(addresses).unwrap_or_default()
    }

    fn attachments(&self) -> Vec<SourceAttachment<'_>> {
        let mut attachments = Vec::new();

        for part in self.message.attachments() {
            let content: &[u8] = match &part.body {
                PartType::Binary(data) | PartType::InlineBinary(data) => data.as_ref(),
                PartType::Text(text) | PartType::Html(text) => text.as_bytes(),
                PartType::Message(nested) => nested.raw_message(),
                PartType::Multipart(_) => continue,
            };

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());

            let name = part
                .attachment_name()
                .or_else(|| part.content_type().and_then(|ct| ct.attribute("name")))
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("attachment.{}", mime_to_extension(&content_type)));

            attachments.push(SourceAttachment::from_bytes(name, Some(content_type), content));
        }

        attachments
    }
}

/// Flattens an address header; group members are listed in order.
fn addresses(address: &Address<'_>) -> Vec<MailAddress> {
    let addrs: Vec<&Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    addrs
        .into_iter()
        .filter_map(|addr| {
            let email = addr.address()?;
            Some(MailAddress {
                address: email.to_string(),
                display_name: addr.name().filter(|n| !n.is_empty()).map(str::to_string),
            })
        })
        .collect()
}

/// File extension used for attachments that arrive without a name.
fn mime_to_extension(mime_type: &str) -> &'static str {
    match mime_type.to_lowercase().as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/zip" => "zip",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "message/rfc822" => "eml",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "Message-ID: <abc123@example.com>\r\n\
From: \"Billing Dept\" <billing@example.com>\r\n\
To: ap@example.com, \"Second\" <second@example.com>\r\n\
Cc: audit@example.com\r\n\
Subject: Invoice 42\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Please find the invoice attached.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"invoice.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjc=\r\n\
--XYZ\r\n\
Content-Type: image/png\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw==\r\n\
--XYZ--\r\n";

    fn read_all(mut attachment: SourceAttachment<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        attachment.content.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_mime_message_fields() {
        let msg = MimeMessage::parse(RAW.as_bytes()).unwrap();

        assert_eq!(msg.message_id().as_deref(), Some("<abc123@example.com>"));
        assert_eq!(msg.subject(), "Invoice 42");
        assert!(msg.body().starts_with("Please find the invoice attached."));
        assert_eq!(
            msg.sender(),
            Some(MailAddress::with_name("Billing Dept", "billing@example.com"))
        );
        assert_eq!(
            msg.to(),
            vec![
                MailAddress::new("ap@example.com"),
                MailAddress::with_name("Second", "second@example.com"),
            ]
        );
        assert_eq!(msg.cc(), vec![MailAddress::new("audit@example.com")]);
    }

    #[test]
    fn test_mime_message_attachments() {
        let msg = MimeMessage::parse(RAW.as_bytes()).unwrap();
        let mut attachments = msg.attachments().into_iter();

        let pdf = attachments.next().unwrap();
        assert_eq!(pdf.name, "invoice.pdf");
        assert_eq!(pdf.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(read_all(pdf), b"%PDF-1.7");

        let png = attachments.next().unwrap();
        assert_eq!(png.name, "attachment.png");
        assert_eq!(png.content_type.as_deref(), Some("image/png"));

        assert!(attachments.next().is_none());
    }

    #[test]
    fn test_mime_message_without_optional_headers() {
        let msg = MimeMessage::parse(b"Subject: bare\r\n\r\nbody\r\n").unwrap();
        assert_eq!(msg.message_id(), None);
        assert_eq!(msg.sender(), None);
        assert!(msg.to().is_empty());
        assert!(msg.attachments().is_empty());
    }

    #[test]
    fn test_cloud_batch_accepts_object_or_array() {
        let single = r#"{
            "messageId": "AAMk-1",
            "subject": "Hello",
            "from": { "address": "a@example.com", "displayName": "A" },
            "to": [{ "address": "b@example.com" }],
            "attachments": [
                { "name": "a.txt", "contentType": "text/plain", "contentBytes": "aGk=" }
            ]
        }"#;
        let messages = CloudMessage::from_json_batch(single).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].subject(), "Hello");
        assert_eq!(messages[0].body(), "");
        assert_eq!(messages[0].attachments[0].content_bytes, b"hi");

        let array = format!("[{}, {}]", single, single);
        assert_eq!(CloudMessage::from_json_batch(&array).unwrap().len(), 2);

        assert!(CloudMessage::from_json_batch("42").is_err());
    }

    #[test]
    fn test_cloud_attachment_stream() {
        let msg = CloudMessage {
            attachments: vec![CloudAttachment {
                name: "data.csv".into(),
                content_type: None,
                content_bytes: b"a,b\n1,2\n".to_vec(),
            }],
            ..CloudMessage::default()
        };

        let attachment = msg.attachments().into_iter().next().unwrap();
        assert_eq!(attachment.name, "data.csv");
        assert_eq!(read_all(attachment), b"a,b\n1,2\n");
    }

    #[test]
    fn test_mime_to_extension() {
        assert_eq!(mime_to_extension("application/pdf"), "pdf");
        assert_eq!(mime_to_extension("IMAGE/JPEG"), "jpg");
        assert_eq!(mime_to_extension("unknown/type"), "bin");
    }
}
