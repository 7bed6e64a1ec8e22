//! File intake: copy a user's dataset into the upload directory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::constants::workflow::ALLOWED_EXTENSIONS;
use crate::types::{PilotError, Result, SessionId};

/// A dataset copied into the upload directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: PathBuf,
    pub original_name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Store `source` under `upload_dir` as `<session-short>_<sanitized name>`
pub fn store_upload(
    source: &Path,
    upload_dir: &Path,
    session: &SessionId,
    max_bytes: u64,
) -> Result<StoredFile> {
    let metadata = fs::metadata(source).map_err(|_| {
        PilotError::input(format!("File '{}' not found", source.display()))
    })?;

    if !metadata.is_file() {
        return Err(PilotError::input(format!(
            "'{}' is not a file",
            source.display()
        )));
    }

    let original_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| PilotError::input("No file selected"))?;

    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(PilotError::input(format!(
            "Unsupported file type '{}'. Allowed: {}",
            original_name,
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    if metadata.len() > max_bytes {
        return Err(PilotError::input(format!(
            "File '{}' is {} bytes, above the {} byte limit",
            original_name,
            metadata.len(),
            max_bytes
        )));
    }

    fs::create_dir_all(upload_dir)?;
    let target = upload_dir.join(format!(
        "{}_{}",
        session.short(),
        sanitize_file_name(&original_name)
    ));
    fs::copy(source, &target)?;

    let sha256 = fingerprint(&target)?;
    info!("Stored '{}' as '{}'", original_name, target.display());

    Ok(StoredFile {
        path: target,
        original_name,
        size_bytes: metadata.len(),
        sha256,
    })
}

/// SHA-256 of a file's contents, lowercase hex
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Remove a stored upload; a missing file is logged, not an error
pub fn cleanup_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Tried to remove '{}' but it does not exist", path.display())
        }
        Err(e) => warn!("Could not remove '{}': {}", path.display(), e),
    }
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are dropped so the result never hides or escapes the directory.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my data (v2).csv"), "my_data__v2_.csv");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name("опрос.csv"), "_____.csv");
    }

    #[test]
    fn test_store_upload_copies_with_prefix() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "trial data.csv", "a\nd\n1\n");
        let uploads = dir.path().join("uploads");
        let session = SessionId::new("abcd1234-0000");

        let stored = store_upload(&src, &uploads, &session, 1024).unwrap();
        assert_eq!(stored.path, uploads.join("abcd1234_trial_data.csv"));
        assert_eq!(stored.original_name, "trial data.csv");
        assert!(stored.path.exists());
        assert_eq!(stored.sha256.len(), 64);
        assert_eq!(stored.sha256, fingerprint(&src).unwrap());
    }

    #[test]
    fn test_size_limit() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "big.csv", "0123456789");
        let err = store_upload(&src, dir.path(), &SessionId::generate(), 5).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "data.xlsx", "binary");
        let err = store_upload(&src, dir.path(), &SessionId::generate(), 1024).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = store_upload(
            &dir.path().join("ghost.csv"),
            dir.path(),
            &SessionId::generate(),
            1024,
        )
        .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let src = source(&dir, "x.csv", "a");
        cleanup_file(&src);
        assert!(!src.exists());
        cleanup_file(&src);
    }
}
