use std::collections::HashSet;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::mail::{is_checksum, Mail};
use crate::sanitize::{attachment_file_name, redact_path, split_extension};

/// Environment variable that relocates the default attachments cache.
pub const CACHE_ROOT_ENV: &str = "RPA_MAIL_CACHE_ROOT";

/// Upper bound on `_N` suffixes tried for one attachment name.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Outcome of wiping the default attachments cache.
///
/// A failed cleanup never aborts a save; it is reported instead.
#[derive(Debug)]
pub enum CacheCleanup {
    Removed,
    NotPresent,
    Failed(std::io::Error),
}

impl CacheCleanup {
    pub fn is_failure(&self) -> bool {
        matches!(self, CacheCleanup::Failed(_))
    }
}

/// What a batch save did.
#[derive(Debug)]
pub struct SaveReport {
    pub root: PathBuf,
    /// One folder per mail, in input order.
    pub folders: Vec<PathBuf>,
    /// Set only when the default cache was used.
    pub cleanup: Option<CacheCleanup>,
}

/// Writes mail attachments below a caller-owned root directory.
///
/// Each mail gets its own folder named after its checksum. Files are
/// created exclusively, so an existing file is never overwritten; name
/// clashes get a `_1`, `_2`, ... suffix before the extension.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref();
        if is_blank(root) {
            return Err(StorageError::InvalidArgument(
                "base directory must not be empty".to_string(),
            ));
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves every attachment of `mail` and returns the mail's folder.
    ///
    /// Sets `temp_file_path` on each attachment and `temp_processing_folder`
    /// on the mail. Mails without a checksum get a random folder name; a
    /// checksum that is not a SHA-256 hex digest is rejected.
    pub fn save(&self, mail: &mut Mail) -> Result<PathBuf, StorageError> {
        let folder_name = match mail.checksum.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(checksum) if is_checksum(checksum) => checksum.to_string(),
            Some(other) => {
                return Err(StorageError::InvalidArgument(format!(
                    "checksum is not a SHA-256 hex digest: {:?}",
                    other
                )))
            }
            None => Uuid::new_v4().simple().to_string(),
        };

        let folder = absolute(&self.root.join(folder_name))?;
        let _span = info_span!("save_attachments", folder = %redact_path(&folder)).entered();

        ensure_directory(&folder)?;

        let mut used_names = HashSet::new();
        for attachment in &mut mail.attachments {
            let file_name = attachment_file_name(&attachment.name);
            let path = write_unique(
                &folder,
                &file_name,
                &attachment.content_bytes,
                &mut used_names,
            )?;
            debug!(
                "Saved attachment '{}' as '{}' ({} bytes)",
                attachment.name,
                redact_path(&path),
                attachment.size()
            );
            attachment.temp_file_path = Some(path);
        }

        mail.temp_processing_folder = Some(folder.clone());
        Ok(folder)
    }

    pub fn save_all(&self, mails: &mut [Mail]) -> Result<Vec<PathBuf>, StorageError> {
        mails.iter_mut().map(|mail| self.save(mail)).collect()
    }
}

/// Saves the attachments of one mail below `base_directory`.
pub fn save_attachments(mail: &mut Mail, base_directory: &Path) -> Result<PathBuf, StorageError> {
    AttachmentStore::new(base_directory)?.save(mail)
}

/// Saves the attachments of every mail.
///
/// Without a base directory the default cache is used; it is wiped once
/// before the first mail is written, and the outcome of that wipe is
/// returned in the report instead of failing the batch.
pub fn save_all_attachments(
    mails: &mut [Mail],
    base_directory: Option<&Path>,
) -> Result<SaveReport, StorageError> {
    let (root, cleanup) = match base_directory.filter(|b| !is_blank(b)) {
        Some(base) => (base.to_path_buf(), None),
        None => (default_cache_root(), Some(clean_default_cache())),
    };

    let folders = AttachmentStore::new(&root)?.save_all(mails)?;
    Ok(SaveReport {
        root,
        folders,
        cleanup,
    })
}

/// `<local data dir>/rpa-mail/attachments-cache`, unless
/// `RPA_MAIL_CACHE_ROOT` points elsewhere.
pub fn default_cache_root() -> PathBuf {
    if let Some(root) = std::env::var_os(CACHE_ROOT_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(root);
    }

    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rpa-mail")
        .join("attachments-cache")
}

/// Removes the default attachments cache with everything in it.
pub fn clean_default_cache() -> CacheCleanup {
    let root = default_cache_root();
    match std::fs::remove_dir_all(&root) {
        Ok(()) => {
            debug!("Cleared default attachments cache");
            CacheCleanup::Removed
        }
        Err(e) if e.kind() == ErrorKind::NotFound => CacheCleanup::NotPresent,
        Err(e) => {
            warn!(
                "Failed to clear default attachments cache '{}': {}",
                redact_path(&root),
                e
            );
            CacheCleanup::Failed(e)
        }
    }
}

/// Creates `file_name` in `directory`, or the first free `stem_N.ext`
/// variant. Names already used in this run are skipped case-insensitively.
fn write_unique(
    directory: &Path,
    file_name: &str,
    content: &[u8],
    used_names: &mut HashSet<String>,
) -> Result<PathBuf, StorageError> {
    let (stem, ext) = split_extension(file_name);

    for counter in 0..=MAX_NAME_ATTEMPTS {
        let candidate = if counter == 0 {
            file_name.to_string()
        } else {
            format!("{}_{}{}", stem, counter, ext)
        };

        let key = candidate.to_lowercase();
        if used_names.contains(&key) {
            continue;
        }

        let path = directory.join(&candidate);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => {
                write_or_remove(file, &path, content)?;
                used_names.insert(key);
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(StorageError::WriteFile { path, source: e }),
        }
    }

    Err(StorageError::FileExists(directory.join(file_name)))
}

/// Writes `content` to a freshly created file. On failure the partial file
/// is removed so no truncated attachment is left under its final name.
fn write_or_remove<W: Write>(mut file: W, path: &Path, content: &[u8]) -> Result<(), StorageError> {
    let result = file.write_all(content).and_then(|()| file.flush());
    if let Err(e) = result {
        drop(file);
        if let Err(remove_err) = std::fs::remove_file(path) {
            warn!(
                "Failed to remove partial file '{}': {}",
                redact_path(path),
                remove_err
            );
        }
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf, StorageError> {
    std::path::absolute(path).map_err(|e| StorageError::ResolvePath {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}
