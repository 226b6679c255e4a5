use std::fmt;

use thiserror::Error;

/// Field-scoped rule failure. Never reaches the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("an image file is required")]
    MissingFile,
    #[error("the file must be smaller than 10MB")]
    FileTooLarge,
    #[error("only PNG, JPEG and GIF files are accepted")]
    UnsupportedFormat,
    #[error("this field is required")]
    FieldRequired,
    #[error("must be at least {min} characters")]
    FieldTooShort { min: usize },
    #[error("must be at most {max} characters")]
    FieldTooLong { max: usize },
}

/// First failing rule per form field; `None` means the field passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub file: Option<ValidationError>,
    pub title: Option<ValidationError>,
    pub description: Option<ValidationError>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.title.is_none() && self.description.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ValidationError)> + '_ {
        [
            ("file", self.file),
            ("title", self.title),
            ("description", self.description),
        ]
        .into_iter()
        .filter_map(|(field, err)| err.map(|err| (field, err)))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, err) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {err}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Operation-scoped failure surfaced to the user. None of these are retried
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("submission failed: {0}")]
    SubmissionFailed(String),
    #[error("the image upload must complete before the record can be created")]
    MissingUpload,
    #[error("failed to fetch feed: {0}")]
    FeedFetchFailed(String),
}

impl OperationError {
    pub fn upload_failed(err: &anyhow::Error) -> Self {
        Self::UploadFailed(format!("{err:#}"))
    }

    pub fn submission_failed(err: &anyhow::Error) -> Self {
        Self::SubmissionFailed(format!("{err:#}"))
    }

    pub fn feed_fetch_failed(err: &anyhow::Error) -> Self {
        Self::FeedFetchFailed(format!("{err:#}"))
    }
}
