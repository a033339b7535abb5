use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{RejectReason, SkinCheckError};

pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "jfif"];

/// A file as it arrived in the multipart form, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Validates uploads against the extension allow-list and stores accepted
/// files in the storage directory under their original name.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    storage_dir: PathBuf,
    allowed_extensions: HashSet<String>,
}

impl UploadPolicy {
    /// Creates the storage directory when it does not exist yet.
    pub fn new<P, I, S>(storage_dir: P, allowed_extensions: I) -> Result<Self, SkinCheckError>
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        tracing::info!("Storing uploads in {}", storage_dir.display());
        Ok(Self {
            storage_dir,
            allowed_extensions,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn allowed_file(&self, file_name: &str) -> bool {
        self.check_extension(file_name).is_ok()
    }

    fn check_extension(&self, file_name: &str) -> Result<(), RejectReason> {
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => return Err(RejectReason::DisallowedExtension(String::new())),
        };
        if self.allowed_extensions.contains(&ext) {
            Ok(())
        } else {
            Err(RejectReason::DisallowedExtension(ext))
        }
    }

    /// Validates `file` and writes it unmodified to the storage directory.
    ///
    /// Nothing touches the disk unless validation passes. A same-named file
    /// from an earlier upload is overwritten.
    pub fn accept(&self, file: Option<&IncomingFile>) -> Result<PathBuf, SkinCheckError> {
        let file = file.ok_or(RejectReason::MissingFile)?;
        let file_name = base_name(&file.file_name).ok_or(RejectReason::EmptyFilename)?;
        self.check_extension(file_name)?;
        if file.data.is_empty() {
            return Err(RejectReason::EmptyFile.into());
        }

        let img_path = self.storage_dir.join(file_name);
        fs::write(&img_path, &file.data)?;
        tracing::info!(
            "Saved upload {} ({} bytes)",
            img_path.display(),
            file.data.len()
        );
        Ok(img_path)
    }
}

// Browsers may send a full client path; keep only the last component.
fn base_name(file_name: &str) -> Option<&str> {
    let name = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name)
        .trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}
