use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::core::{error::SkinCheckError, format};

/// A stored image re-encoded as base64 text for inline display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub data: String,
}

impl EncodedImage {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data)
    }
}

pub fn encode_file(img_path: &Path) -> Result<EncodedImage, SkinCheckError> {
    let image_data = std::fs::read(img_path)?;
    if image_data.is_empty() {
        return Err(SkinCheckError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "image file is empty",
        )));
    }
    Ok(EncodedImage {
        mime: format::mime_from_image(&image_data),
        data: STANDARD.encode(&image_data),
    })
}

/// Like [`encode_file`], but logs the failure and yields `None`.
pub fn encode(img_path: &Path) -> Option<EncodedImage> {
    match encode_file(img_path) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            tracing::error!("Image encoding error for {}: {}", img_path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesion.png");
        let bytes: Vec<u8> = b"\x89PNG\r\n\x1a\n"
            .iter()
            .copied()
            .chain((0..=255u8).cycle().take(1000))
            .collect();
        std::fs::write(&path, &bytes).unwrap();

        let encoded = encode(&path).unwrap();
        assert_eq!(encoded.mime, "image/png");
        assert_eq!(STANDARD.decode(&encoded.data).unwrap(), bytes);
        assert!(encoded.data_uri().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn missing_or_empty_file_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(encode(&dir.path().join("gone.jpg")), None);

        let empty = dir.path().join("empty.jpg");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(encode(&empty), None);
    }
}
