//! Multipart upload intake.
//!
//! The `file` field is streamed chunk by chunk into the scratch directory
//! under a generated name; the caller's file name is kept only as metadata.
//! Anything written before an error is removed before the error returns.

use std::path::Path;

use axum::extract::Multipart;
use axum::extract::multipart::Field;
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use docforge_converter::InputDescriptor;
use docforge_converter::filesystem::FsUtils;
use docforge_core::AppResult;
use docforge_core::error::{AppError, ErrorKind};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the compression level.
pub const LEVEL_FIELD: &str = "level";

/// Original name used when the client sends none.
const FALLBACK_NAME: &str = "upload";

/// Fields received from a conversion request.
#[derive(Debug, Default)]
pub struct UploadedForm {
    /// The saved upload, if a file field was present.
    pub input: Option<InputDescriptor>,
    /// Raw `level` value.
    pub level: Option<String>,
}

/// Read the whole multipart body, saving the file field into `scratch_dir`.
pub async fn receive(
    multipart: &mut Multipart,
    scratch_dir: &Path,
) -> AppResult<UploadedForm> {
    let mut form = UploadedForm::default();

    match read_fields(multipart, scratch_dir, &mut form).await {
        Ok(()) => Ok(form),
        Err(err) => {
            if let Some(input) = form.input.take() {
                discard(&input.path).await;
            }
            Err(err)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    scratch_dir: &Path,
    form: &mut UploadedForm,
) -> AppResult<()> {
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) if form.input.is_none() => {
                form.input = save_field(field, scratch_dir).await?;
            }
            Some(LEVEL_FIELD) => {
                form.level = Some(field.text().await.map_err(malformed)?);
            }
            other => {
                debug!(field = ?other, "Ignoring multipart field");
            }
        }
    }
    Ok(())
}

/// Stream one file field to a fresh scratch path.
///
/// An empty part without a file name (an unfilled file input) counts as no
/// upload.
async fn save_field(
    mut field: Field<'_>,
    scratch_dir: &Path,
) -> AppResult<Option<InputDescriptor>> {
    let named = field.file_name().is_some_and(|n| !n.trim().is_empty());
    let original_name = match field.file_name() {
        Some(name) if named => FsUtils::sanitize_download_name(name),
        _ => FALLBACK_NAME.to_string(),
    };

    let path = scratch_dir.join(FsUtils::generate_scratch_name(&original_name));
    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        AppError::with_source(ErrorKind::Storage, "Failed to store upload.", e)
    })?;

    let mut size_bytes = 0u64;
    let written: AppResult<()> = async {
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to store upload.", e)
            })?;
            size_bytes += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to store upload.", e)
        })
    }
    .await;
    drop(file);

    if let Err(err) = written {
        discard(&path).await;
        return Err(err);
    }

    if size_bytes == 0 && !named {
        discard(&path).await;
        return Ok(None);
    }

    debug!(
        path = %path.display(),
        original_name = %original_name,
        size = size_bytes,
        "Upload stored"
    );

    Ok(Some(InputDescriptor {
        path,
        original_name,
        size_bytes,
    }))
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> AppError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "Upload exceeds the body limit");
        return AppError::payload_too_large("Upload exceeds the size limit.");
    }
    warn!(error = %err, status = %status, "Malformed multipart upload");
    AppError::validation("Malformed upload.").with_code("INVALID_UPLOAD")
}
