//! Service health and external tool availability.

use axum::{extract::State, response::IntoResponse, Json};

use casegen_pipeline::ToolReport;

use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Probe every external dependency the pipeline can use.
///
/// Always 200: a missing tool is reported, not treated as a failure.
pub async fn tool_report(State(state): State<AppState>) -> Json<ToolReport> {
    Json(state.pipeline.tool_report().await)
}
