//! Attachment validation and storage.
//!
//! Files arrive as multipart parts on `POST /api/messages`. Each one is
//! checked against the count, size and type limits below, buffered in
//! memory, and only written to the upload directory once the message it
//! belongs to has passed validation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::Attachment;

pub const MAX_FILES: usize = 5;
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/png",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

const ALLOWED_EXTENSIONS: [&str; 7] = ["jpeg", "jpg", "png", "pdf", "txt", "doc", "docx"];

/// A validated file that has not been written yet.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

fn invalid(reason: impl Into<String>) -> AppError {
    AppError::InvalidAttachment { reason: reason.into() }
}

/// Rejects a file whose MIME type or extension is outside the allow-list.
pub fn check_file_type(original_name: &str, mime_type: &str) -> Result<(), AppError> {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str())
        || !ALLOWED_MIME_TYPES.contains(&mime_type)
    {
        return Err(invalid(format!(
            "'{original_name}' ({mime_type}): only images, PDFs, and documents are allowed"
        )));
    }
    Ok(())
}

pub fn check_file_size(original_name: &str, size: usize) -> Result<(), AppError> {
    if size > MAX_FILE_SIZE {
        return Err(invalid(format!(
            "'{original_name}' exceeds the {} MiB limit",
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }
    Ok(())
}

pub fn check_file_count(count: usize) -> Result<(), AppError> {
    if count > MAX_FILES {
        return Err(invalid(format!("at most {MAX_FILES} files per message")));
    }
    Ok(())
}

/// Strips directories and anything outside `[A-Za-z0-9._-]` from a client file name.
fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Upload directory on local disk.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every file and returns their metadata in the same order.
    /// On failure the files already written by this call are removed.
    pub async fn store(&self, files: Vec<PendingFile>) -> Result<Vec<Attachment>, AppError> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| AppError::Storage {
            message: format!("cannot create upload directory {}: {e}", self.dir.display()),
        })?;

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let path = self.dir.join(format!(
                "{}-{}-{}",
                Utc::now().timestamp_millis(),
                &uuid::Uuid::new_v4().simple().to_string()[..8],
                sanitize_file_name(&file.original_name)
            ));
            if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
                self.remove(&stored).await;
                return Err(AppError::Storage {
                    message: format!("cannot write {}: {e}", path.display()),
                });
            }
            debug!("Stored upload {} ({} bytes)", path.display(), file.bytes.len());
            stored.push(Attachment {
                original_name: file.original_name,
                storage_path: path.to_string_lossy().into_owned(),
                mime_type: file.mime_type,
                size_bytes: file.bytes.len() as u64,
            });
        }
        Ok(stored)
    }

    /// Best-effort removal; failures are logged and skipped. Returns how many
    /// files were actually removed.
    pub async fn remove<'a>(&self, attachments: impl IntoIterator<Item = &'a Attachment>) -> usize {
        let mut removed = 0;
        for attachment in attachments {
            match tokio::fs::remove_file(&attachment.storage_path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Upload {} already gone", attachment.storage_path);
                }
                Err(e) => warn!("Failed to delete upload {}: {e}", attachment.storage_path),
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_types_pass() {
        assert!(check_file_type("photo.JPG", "image/jpeg").is_ok());
        assert!(check_file_type("notes.txt", "text/plain").is_ok());
        assert!(check_file_type(
            "report.docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        )
        .is_ok());
    }

    #[test]
    fn mime_and_extension_must_both_match() {
        assert!(check_file_type("script.sh", "text/plain").is_err());
        assert!(check_file_type("notes.txt", "application/x-sh").is_err());
        assert!(check_file_type("anim.gif", "image/gif").is_err());
        assert!(check_file_type("noextension", "text/plain").is_err());
    }

    #[test]
    fn size_and_count_limits() {
        assert!(check_file_size("a.pdf", MAX_FILE_SIZE).is_ok());
        assert!(check_file_size("a.pdf", MAX_FILE_SIZE + 1).is_err());
        assert!(check_file_count(MAX_FILES).is_ok());
        assert!(check_file_count(MAX_FILES + 1).is_err());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(sanitize_file_name("my report (1).pdf"), "my_report__1_.pdf");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn store_then_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = UploadStore::new(dir.path().join("uploads"));

        let stored = uploads
            .store(vec![PendingFile {
                original_name: "notes.txt".into(),
                mime_type: "text/plain".into(),
                bytes: b"hello".to_vec(),
            }])
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].size_bytes, 5);
        assert!(stored[0].storage_path.ends_with("-notes.txt"));
        assert!(Path::new(&stored[0].storage_path).exists());

        assert_eq!(uploads.remove(&stored).await, 1);
        assert!(!Path::new(&stored[0].storage_path).exists());
        // Second removal is a silent no-op.
        assert_eq!(uploads.remove(&stored).await, 0);
    }
}
