//! Uploaded document → plain text. PDF extraction runs on the blocking pool.

use bytes::Bytes;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

/// Classifies an upload by content type, then file extension, then magic bytes.
pub fn detect_kind(
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Option<DocumentKind> {
    match content_type {
        Some("application/pdf") => return Some(DocumentKind::Pdf),
        Some(ct) if ct.starts_with("text/plain") => return Some(DocumentKind::PlainText),
        _ => {}
    }

    let extension = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("pdf") => return Some(DocumentKind::Pdf),
        Some("txt") => return Some(DocumentKind::PlainText),
        _ => {}
    }

    bytes.starts_with(b"%PDF").then_some(DocumentKind::Pdf)
}

/// Extracts text from an upload. `allowed` lists the kinds this field accepts.
pub async fn extract_text(
    field: &str,
    file_name: Option<&str>,
    content_type: Option<&str>,
    bytes: Bytes,
    allowed: &[DocumentKind],
) -> Result<String, AppError> {
    let kind = detect_kind(file_name, content_type, &bytes)
        .filter(|k| allowed.contains(k))
        .ok_or_else(|| {
            AppError::Validation(format!("{field}: unsupported document type"))
        })?;

    let text = match kind {
        DocumentKind::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|_| AppError::Validation(format!("{field}: file is not valid UTF-8")))?,
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
        })
        .await
        .map_err(|e| {
            // pdf-extract panics on some malformed inputs
            if e.is_panic() {
                AppError::Validation(format!("{field}: could not read PDF"))
            } else {
                AppError::Internal(anyhow::anyhow!("PDF extraction task failed: {e}"))
            }
        })?
        .map_err(|e| AppError::Validation(format!("{field}: could not read PDF: {e}")))?,
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::Validation(format!(
            "{field}: no text could be extracted"
        )));
    }
    Ok(text)
}
