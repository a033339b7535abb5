use std::fmt;

/// Why an upload was refused before anything was written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingFile,
    EmptyFilename,
    DisallowedExtension(String),
    EmptyFile,
    TooLarge,
}

impl RejectReason {
    /// Text shown to the user as a flash message on the form page.
    pub fn user_message(&self) -> String {
        match self {
            RejectReason::MissingFile => "Please choose a photo to upload.".to_owned(),
            RejectReason::EmptyFilename => "The uploaded file has no name.".to_owned(),
            RejectReason::DisallowedExtension(ext) if ext.is_empty() => {
                "Only PNG, JPG, JPEG and JFIF images are accepted.".to_owned()
            }
            RejectReason::DisallowedExtension(ext) => format!(
                "Files of type .{ext} are not accepted. Please upload a PNG, JPG, JPEG or JFIF image."
            ),
            RejectReason::EmptyFile => "The uploaded file is empty.".to_owned(),
            RejectReason::TooLarge => {
                "The photo is too large. Please upload a smaller image.".to_owned()
            }
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingFile => write!(f, "no file provided"),
            RejectReason::EmptyFilename => write!(f, "empty filename"),
            RejectReason::DisallowedExtension(ext) => write!(f, "extension '{ext}' not allowed"),
            RejectReason::EmptyFile => write!(f, "empty file body"),
            RejectReason::TooLarge => write!(f, "body over the upload limit"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SkinCheckError {
    #[error("upload rejected: {0}")]
    Rejected(RejectReason),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("inference error: {0}")]
    Inference(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl SkinCheckError {
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        SkinCheckError::Inference(msg.into())
    }

    /// Flash text for failures the user should hear about, if any.
    pub fn user_message(&self) -> String {
        match self {
            SkinCheckError::Rejected(reason) => reason.user_message(),
            _ => "The photo could not be saved. Please try again.".to_owned(),
        }
    }
}

impl From<RejectReason> for SkinCheckError {
    fn from(reason: RejectReason) -> Self {
        SkinCheckError::Rejected(reason)
    }
}

impl From<serde_json::Error> for SkinCheckError {
    fn from(err: serde_json::Error) -> Self {
        SkinCheckError::Session(err.to_string())
    }
}
