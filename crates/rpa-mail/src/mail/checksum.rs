//! Content fingerprints used to spot duplicate mails.

use sha2::{Digest, Sha256};

use super::model::{join, Mail};

const FIELD_SEPARATOR: &str = "|";

impl Mail {
    /// SHA-256 over the content fields, as lowercase hex.
    ///
    /// Fields are joined in a fixed order: message id, subject, body, from,
    /// to, cc, attachments. Address and attachment lists are comma-joined
    /// renderings, so reordering them changes the result.
    pub fn compute_checksum(&self) -> String {
        let data = [
            self.message_id.clone().unwrap_or_default(),
            self.subject.clone(),
            self.body.clone(),
            self.from.as_ref().map(ToString::to_string).unwrap_or_default(),
            join(&self.to, ","),
            join(&self.cc, ","),
            join(&self.attachments, ","),
        ]
        .join(FIELD_SEPARATOR);

        format!("{:x}", Sha256::digest(data.as_bytes()))
    }
}

/// Whether `value` has the shape of a [`Mail::compute_checksum`] result:
/// exactly 64 lowercase hex digits.
pub fn is_checksum(value: &str) -> bool {
    value.len() == 64
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Fingerprint of a whole batch, as UPPERCASE hex.
///
/// Each mail's checksum is recomputed from its current content and the
/// results are hashed in order, so the batch order matters.
pub fn combined_checksum<'a, I>(mails: I) -> String
where
    I: IntoIterator<Item = &'a Mail>,
{
    let mut hasher = Sha256::new();
    for mail in mails {
        hasher.update(mail.compute_checksum().as_bytes());
    }
    format!("{:X}", hasher.finalize())
}
