use std::io::Read;

use tracing::{debug, info_span};

use super::model::{Attachment, Mail};
use super::source::{SourceAttachment, SourceMessage};
use crate::config::MailboxSettings;
use crate::error::MailError;

/// Maps source messages into [`Mail`] records.
///
/// Attachment streams are read to the end here. With an extension filter,
/// only attachments whose extension matches it (case-insensitively, with or
/// without a leading dot on the filter) are kept; an empty filter keeps all.
/// Each mail gets its checksum before it is returned.
pub fn normalize<I>(
    messages: I,
    mailbox: &MailboxSettings,
    extension: Option<&str>,
) -> Result<Vec<Mail>, MailError>
where
    I: IntoIterator,
    I::Item: SourceMessage,
{
    let _span = info_span!("normalize", filter = extension.unwrap_or("")).entered();

    let filter = extension
        .map(|e| e.trim().trim_start_matches('.'))
        .filter(|e| !e.is_empty());

    let mut mails = Vec::new();
    for message in messages {
        let mut mail = Mail {
            message_id: message.message_id(),
            subject: message.subject(),
            body: message.body(),
            from: message.sender(),
            to: message.to(),
            cc: message.cc(),
            mailbox_account: mailbox.account.clone(),
            source_folder: mailbox.folder.clone(),
            current_folder: mailbox.folder.clone(),
            target_folder_success: mailbox.target_folder_success.clone(),
            target_folder_handover: mailbox.target_folder_handover.clone(),
            ..Mail::default()
        };

        for source in message.attachments() {
            if !matches_extension(&source.name, filter) {
                debug!("Attachment '{}' filtered out", source.name);
                continue;
            }
            mail.attachments.push(read_attachment(source)?);
        }

        let checksum = mail.compute_checksum();
        debug!(
            "Normalized mail {:?} with {} attachments, checksum {}",
            mail.message_id.as_deref().unwrap_or("(no id)"),
            mail.attachments.len(),
            checksum
        );
        mail.checksum = Some(checksum);
        mails.push(mail);
    }

    Ok(mails)
}

/// The extension is whatever follows the last `.` of the file name, so a
/// bare `.pdf` counts as a pdf while `pdf` and `name.` have none.
fn matches_extension(name: &str, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };

    let file_name = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .is_some_and(|ext| ext.to_lowercase() == filter.to_lowercase())
}

fn read_attachment(mut source: SourceAttachment<'_>) -> Result<Attachment, MailError> {
    let mut content_bytes = Vec::new();
    source
        .content
        .read_to_end(&mut content_bytes)
        .map_err(|e| MailError::ReadAttachment {
            name: source.name.clone(),
            source: e,
        })?;

    Ok(Attachment::new(source.name, source.content_type, content_bytes))
}
