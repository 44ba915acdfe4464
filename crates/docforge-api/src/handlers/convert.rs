//! Conversion handlers.
//!
//! Every conversion route funnels into [`run`]: the multipart body is
//! saved to the scratch directory, the orchestrator runs the job, and the
//! converted file is streamed back.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::response::Response;
use tracing::debug;

use docforge_converter::{JobRequest, Operation};

use crate::delivery::HttpDelivery;
use crate::error::ApiError;
use crate::state::AppState;
use crate::upload;

/// POST /{operation} for a fixed operation.
pub async fn convert_fixed(
    operation: Operation,
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    run(state, operation.id().to_string(), multipart).await
}

/// POST /convert/{operation}
pub async fn convert_by_id(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    run(state, operation, multipart).await
}

async fn run(
    state: AppState,
    operation: String,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let orchestrator = &state.orchestrator;

    // A body that is not multipart at all carries no file.
    let form = match multipart {
        Ok(mut multipart) => upload::receive(&mut multipart, orchestrator.scratch_dir()).await?,
        Err(rejection) => {
            debug!(error = %rejection, "Request body is not multipart");
            upload::UploadedForm::default()
        }
    };

    let request = JobRequest {
        operation,
        input: form.input,
        level: form.level,
    };

    let sink = HttpDelivery::new(Arc::clone(orchestrator.metrics()));
    Ok(orchestrator.run(request, &sink).await?)
}
