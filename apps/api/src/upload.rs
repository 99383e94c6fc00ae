//! Attachment validation and object storage.
//!
//! Files are validated by size and by content sniffing before anything is
//! stored. The client-declared content type is ignored; only the magic bytes
//! decide the stored MIME type.

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::achievement::Attachment;

/// Inclusive upper bound on attachment size. A file of exactly this many
/// bytes is accepted.
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Sniffs the MIME type from the leading magic bytes. Only PDF, JPEG and PNG
/// are accepted.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        Some("application/pdf")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else {
        None
    }
}

/// Checks size and content type, returning the sniffed MIME type.
pub fn validate_attachment(bytes: &[u8]) -> Result<&'static str, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("attachment file is empty".to_string()));
    }
    if bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(AppError::Validation(
            "attachment exceeds the 5 MiB size limit".to_string(),
        ));
    }
    sniff_mime(bytes).ok_or_else(|| {
        AppError::Validation("attachment must be a PDF, JPEG or PNG file".to_string())
    })
}

fn object_key(reference_id: Uuid, file_name: &str) -> String {
    // Short random prefix keeps repeated uploads of the same file name from
    // colliding under one reference.
    let nonce = Uuid::new_v4().simple().to_string();
    format!("attachments/{}/{}_{}", reference_id, &nonce[..8], file_name)
}

/// Uploads the validated file and returns the attachment metadata to embed
/// in the achievement document.
pub async fn store_attachment(
    s3: &S3Client,
    bucket: &str,
    reference_id: Uuid,
    file_name: &str,
    bytes: Vec<u8>,
    mime: &'static str,
) -> Result<Attachment, AppError> {
    let key = object_key(reference_id, file_name);
    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(bytes))
        .content_type(mime)
        .send()
        .await
        .map_err(|e| AppError::Persistence(format!("attachment upload failed: {e}")))?;

    info!("stored attachment s3://{bucket}/{key}");
    Ok(Attachment {
        file_name: file_name.to_string(),
        file_url: key,
        file_type: mime.to_string(),
        uploaded_at: Utc::now(),
    })
}

/// Best-effort removal of an uploaded object whose metadata could not be
/// recorded. Failure is logged, not propagated.
pub async fn discard_attachment(s3: &S3Client, bucket: &str, key: &str) {
    if let Err(e) = s3.delete_object().bucket(bucket).key(key).send().await {
        warn!("failed to discard orphaned attachment s3://{bucket}/{key}: {e}");
    }
}
