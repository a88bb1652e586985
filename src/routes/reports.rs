use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use crate::AppState;
use crate::error::AppResult;
use crate::pipeline::{ReportOutcome, ReportRequest};

/// Runs one report invocation. The body is parsed by hand so malformed
/// documents surface as validation errors rather than extractor rejections.
pub async fn create_report(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ReportOutcome>> {
    let request = ReportRequest::from_json(&body)?;
    let outcome = state.generator.generate(&request).await?;

    Ok(Json(outcome))
}
