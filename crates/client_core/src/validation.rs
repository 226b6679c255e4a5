//! Pure form rules evaluated before any network call.
//!
//! Fields are checked independently so a bad file never hides a bad title;
//! each field reports only its first failing rule.

use crate::{
    error::{ValidationError, ValidationErrors},
    form::{FormDraft, ImageFile},
};

pub const MAX_FILE_BYTES: u64 = 10_000_000;
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpg", "image/jpeg", "image/png", "image/gif"];
pub const TITLE_MIN_CHARS: usize = 2;
pub const TITLE_MAX_CHARS: usize = 20;
pub const DESCRIPTION_MAX_CHARS: usize = 65;

pub fn validate_draft(draft: &FormDraft) -> Result<(), ValidationErrors> {
    let errors = ValidationErrors {
        file: validate_file(draft.file.as_ref()).err(),
        title: validate_title(&draft.title).err(),
        description: validate_description(&draft.description).err(),
    };

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_file(file: Option<&ImageFile>) -> Result<(), ValidationError> {
    let file = file.ok_or(ValidationError::MissingFile)?;
    if file.size() >= MAX_FILE_BYTES {
        return Err(ValidationError::FileTooLarge);
    }
    if !is_accepted_mime_type(&file.mime_type) {
        return Err(ValidationError::UnsupportedFormat);
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.chars().count();
    if len == 0 {
        return Err(ValidationError::FieldRequired);
    }
    if len < TITLE_MIN_CHARS {
        return Err(ValidationError::FieldTooShort {
            min: TITLE_MIN_CHARS,
        });
    }
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::FieldTooLong {
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if len == 0 {
        return Err(ValidationError::FieldRequired);
    }
    if len > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::FieldTooLong {
            max: DESCRIPTION_MAX_CHARS,
        });
    }
    Ok(())
}

fn is_accepted_mime_type(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ACCEPTED_MIME_TYPES.contains(&essence.as_str())
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
