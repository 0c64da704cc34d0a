//! Route handlers.

use super::error::ApiError;
use super::AppState;
use crate::archive::sanitize_case_id;
use crate::pipeline::PredictResponse;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: state.pipeline.model_name().to_owned(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /predict` with form fields `filename` (case id) and `file` (zip).
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut case = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("filename") => case = Some(field.text().await?),
            Some("file") => {
                let named = field.file_name().is_some_and(|name| !name.is_empty());
                let bytes = field.bytes().await?;
                upload = Some((named, bytes));
            }
            _ => {}
        }
    }

    let (named, bytes) = upload
        .ok_or_else(|| ApiError::BadRequest("No file part in the request".into()))?;
    if !named || bytes.is_empty() {
        return Err(ApiError::BadRequest("No selected file".into()));
    }
    let raw = case.ok_or_else(|| ApiError::BadRequest("Missing 'filename' form field".into()))?;
    let case = sanitize_case_id(&raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid case identifier '{}'", raw.trim())))?
        .to_owned();

    tracing::info!(case = %case, bytes = bytes.len(), "predict request");

    let pipeline = state.pipeline.clone();
    let analysis =
        tokio::task::spawn_blocking(move || pipeline.analyze(&case, &bytes)).await??;
    tracing::info!(
        case = %analysis.case,
        regions = analysis.regions.len(),
        "predict response"
    );
    Ok(Json(analysis.to_response()))
}
