use std::fs;
use std::path::{Component, Path};
use tracing::warn;

use super::error::{SyncError, SyncResult};

/// Per-file metadata sent alongside the bytes in an add-file call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUploadDescriptor {
    /// Base name of the file
    pub name: String,
    /// `./` or `./<subpath>/`, relative to the mirror root
    pub path: String,
    /// MD5 hex of `content || name`
    pub content_hash: String,
}

/// A file read fully into memory together with its descriptor.
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub descriptor: FileUploadDescriptor,
    pub content: Vec<u8>,
}

impl PreparedFile {
    pub fn read(file_path: &Path, mirror_root: Option<&Path>) -> SyncResult<Self> {
        if !file_path.is_file() {
            return Err(SyncError::file_not_found(file_path));
        }

        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::file_not_found(file_path))?;

        let content = fs::read(file_path).map_err(|err| SyncError::io(err, file_path))?;

        let descriptor = FileUploadDescriptor {
            path: relative_upload_path(file_path, mirror_root),
            content_hash: content_hash(&content, &name),
            name,
        };

        Ok(Self {
            descriptor,
            content,
        })
    }
}

/// Identity hash over the file bytes followed by the UTF-8 base name.
///
/// A rename changes the hash; moving the file to another directory does not.
pub fn content_hash(content: &[u8], file_name: &str) -> String {
    let mut input = Vec::with_capacity(content.len() + file_name.len());
    input.extend_from_slice(content);
    input.extend_from_slice(file_name.as_bytes());
    format!("{:x}", md5::compute(&input))
}

/// Directory of `file_path` relative to `mirror_root`, formatted as `./` or
/// `./A/B/` with forward slashes regardless of the host separator.
pub fn relative_upload_path(file_path: &Path, mirror_root: Option<&Path>) -> String {
    let Some(root) = mirror_root else {
        return "./".to_string();
    };
    let parent = file_path.parent().unwrap_or_else(|| Path::new(""));

    let relative = match parent.strip_prefix(root) {
        Ok(relative) => relative,
        Err(_) => {
            warn!(
                "Could not determine relative path for {}, using root",
                file_path.display()
            );
            return "./".to_string();
        }
    };

    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.is_empty() {
        "./".to_string()
    } else {
        format!("./{}/", segments.join("/"))
    }
}
