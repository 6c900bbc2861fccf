use std::collections::BTreeMap;

use crate::config::UploadConfig;

use super::domain::{Attachment, FileType, ServiceType};

/// Reasons an attachment is refused before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{service_type} requests do not take a {file_type} document")]
    SlotNotAccepted {
        service_type: ServiceType,
        file_type: FileType,
    },
    #[error("more than one {0} document attached")]
    DuplicateSlot(FileType),
    #[error("file type '{content_type}' is not allowed")]
    MimeTypeNotAllowed { content_type: String },
    #[error("file is {size_bytes} bytes, above the {limit_bytes} byte limit")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("file is empty")]
    Empty,
    #[error("file name '{0}' is not usable")]
    InvalidFileName(String),
}

/// Orders attachments by slot and refuses a second file for the same slot.
pub fn arrange(attachments: Vec<Attachment>) -> Result<Vec<Attachment>, (String, ValidationError)> {
    let mut slots: BTreeMap<FileType, Attachment> = BTreeMap::new();
    for attachment in attachments {
        if slots.contains_key(&attachment.file_type) {
            let file_type = attachment.file_type;
            return Err((attachment.file_name, ValidationError::DuplicateSlot(file_type)));
        }
        slots.insert(attachment.file_type, attachment);
    }
    Ok(slots.into_values().collect())
}

/// Checks one attachment against the service's slots and the upload policy.
pub fn validate(
    policy: &UploadConfig,
    service_type: ServiceType,
    attachment: &Attachment,
) -> Result<(), ValidationError> {
    if !service_type.accepts(attachment.file_type) {
        return Err(ValidationError::SlotNotAccepted {
            service_type,
            file_type: attachment.file_type,
        });
    }

    sanitize_file_name(&attachment.file_name)
        .ok_or_else(|| ValidationError::InvalidFileName(attachment.file_name.clone()))?;

    let essence = attachment
        .content_type
        .parse::<mime::Mime>()
        .map(|parsed| parsed.essence_str().to_ascii_lowercase())
        .map_err(|_| ValidationError::MimeTypeNotAllowed {
            content_type: attachment.content_type.clone(),
        })?;
    if !policy
        .allowed_mime_types
        .iter()
        .any(|allowed| *allowed == essence)
    {
        return Err(ValidationError::MimeTypeNotAllowed {
            content_type: attachment.content_type.clone(),
        });
    }

    let size_bytes = attachment.size_bytes();
    if size_bytes == 0 {
        return Err(ValidationError::Empty);
    }
    if size_bytes > policy.max_upload_size_bytes {
        return Err(ValidationError::TooLarge {
            size_bytes,
            limit_bytes: policy.max_upload_size_bytes,
        });
    }

    Ok(())
}

/// Strips any directory part and rejects names that cannot be stored as one path
/// segment.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        None
    } else {
        Some(name.to_string())
    }
}
