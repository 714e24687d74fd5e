//! Media upload and analysis handlers.
//!
//! Analysis is asynchronous: `POST /api/v1/media/:id/analyze` moves the asset
//! to `analyzing` and queues a job for the background worker; the generated
//! test case is read back from `GET /api/v1/media/:id/result`.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, Path as UrlPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use casegen_core::{AnalysisEnvelope, AnalysisStart, MediaAsset, MediaStatus};
use casegen_pipeline::AnalysisJob;

use crate::{ApiError, AppState};

/// Header carrying the uploading user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    /// Re-run analysis even when the asset is completed or in progress.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeAccepted {
    pub job_id: Uuid,
    pub media_id: Uuid,
    pub status: MediaStatus,
}

/// Upload a screen recording.
///
/// # Multipart Fields
/// - `file`: the recording (required, non-empty)
/// - `filename`: name to record instead of the part's file name (optional)
///
/// The file part is streamed to disk chunk by chunk.
///
/// # Returns
/// - 201 Created with the stored asset
/// - 400 Bad Request if the file is missing or empty
pub async fn upload_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaAsset>), ApiError> {
    let owner_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let mut stored: Option<(PathBuf, u64)> = None;
    let mut part_name: Option<String> = None;
    let mut filename_override: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());
        match field_name.as_deref() {
            Some("file") => {
                if let Some((previous, _)) = stored.take() {
                    discard_upload(&previous).await;
                }
                part_name = field.file_name().map(|n| n.to_string());
                let path = new_storage_path(&state.config.media_storage_dir, part_name.as_deref()).await?;
                let written = match stream_to_file(&mut field, &path).await {
                    Ok(written) => written,
                    Err(e) => {
                        discard_upload(&path).await;
                        return Err(e);
                    }
                };
                stored = Some((path, written));
            }
            Some("filename") => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
                if !val.trim().is_empty() {
                    filename_override = Some(val.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (storage_path, size_bytes) = stored
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;
    if size_bytes == 0 {
        discard_upload(&storage_path).await;
        return Err(ApiError::BadRequest("Video file is empty".into()));
    }

    let filename = sanitize_filename(filename_override.or(part_name).as_deref());
    let asset = match state
        .repo
        .insert(MediaAsset::new(storage_path.clone(), filename, size_bytes, owner_id))
        .await
    {
        Ok(asset) => asset,
        Err(e) => {
            discard_upload(&storage_path).await;
            return Err(e.into());
        }
    };

    info!(
        media_id = %asset.id,
        filename = %asset.filename,
        size_bytes = asset.size_bytes,
        "Media uploaded"
    );
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn get_media(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<MediaAsset>, ApiError> {
    Ok(Json(state.repo.get(id).await?))
}

/// Queue a recording for analysis.
///
/// # Returns
/// - 202 Accepted with the job id when a job was queued
/// - 200 OK with the stored result when already completed and not forced
/// - 400 Bad Request if the stored file is missing or empty
/// - 404 Not Found for an unknown id
/// - 409 Conflict while an unforced analysis is in progress
pub async fn analyze_media(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Response, ApiError> {
    let asset = state.repo.get(id).await?;
    check_stored_file(&asset.storage_path).await?;

    let (start, asset) = state.repo.begin_analysis(id, query.force).await?;
    if start == AnalysisStart::AlreadyCompleted {
        let envelope = stored_result(&asset)?;
        return Ok(Json(envelope).into_response());
    }

    let job = AnalysisJob::for_asset(&asset)?;
    let job_id = match state.queue.enqueue(job) {
        Ok(job_id) => job_id,
        Err(e) => {
            error!(media_id = %id, error = %e, "Failed to queue analysis");
            if let Err(fail_err) = state.repo.fail(id, job.job_id, &e.to_string()).await {
                error!(media_id = %id, error = %fail_err, "Failed to record queue failure");
            }
            return Err(e.into());
        }
    };

    info!(media_id = %id, job_id = %job_id, force = query.force, "Analysis queued");
    let body = AnalyzeAccepted {
        job_id,
        media_id: id,
        status: MediaStatus::Analyzing,
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

/// Fetch the generated test case.
///
/// - 200 OK with the envelope once completed
/// - 404 Not Found before any analysis was requested
/// - 409 Conflict while analysis is running
/// - 500 with the recorded message when analysis failed
pub async fn get_result(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<Uuid>,
) -> Result<Json<AnalysisEnvelope>, ApiError> {
    let asset = state.repo.get(id).await?;
    match asset.status {
        MediaStatus::Completed => Ok(Json(stored_result(&asset)?)),
        MediaStatus::Uploaded => Err(ApiError::NotFound(format!(
            "Media {} has not been analyzed",
            id
        ))),
        MediaStatus::Analyzing => Err(ApiError::Conflict(format!(
            "Media {} is still being analyzed",
            id
        ))),
        MediaStatus::Failed => Err(ApiError::Internal(
            asset
                .error_message
                .unwrap_or_else(|| format!("Analysis of media {} failed", id)),
        )),
    }
}

fn stored_result(asset: &MediaAsset) -> Result<AnalysisEnvelope, ApiError> {
    asset
        .result
        .clone()
        .ok_or_else(|| ApiError::Internal(format!("Media {} has no stored result", asset.id)))
}

async fn check_stored_file(path: &Path) -> Result<(), ApiError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| ApiError::BadRequest(format!("Video file is missing: {}", path.display())))?;
    if !metadata.is_file() || metadata.len() == 0 {
        return Err(ApiError::BadRequest(format!(
            "Video file is empty: {}",
            path.display()
        )));
    }
    Ok(())
}

/// A fresh path in the storage directory for an upload named `name`.
async fn new_storage_path(storage_dir: &Path, name: Option<&str>) -> Result<PathBuf, ApiError> {
    tokio::fs::create_dir_all(storage_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("Cannot create storage directory: {}", e)))?;
    Ok(storage_dir.join(format!("{}_{}", Uuid::now_v7(), sanitize_filename(name))))
}

/// Copy a multipart field to `path`, returning the number of bytes written.
async fn stream_to_file(
    field: &mut axum::extract::multipart::Field<'_>,
    path: &Path,
) -> Result<u64, ApiError> {
    let store_err = |e: std::io::Error| ApiError::Internal(format!("Cannot store upload: {}", e));
    let mut file = tokio::fs::File::create(path).await.map_err(store_err)?;
    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
    {
        file.write_all(&chunk).await.map_err(store_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(store_err)?;
    Ok(written)
}

async fn discard_upload(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove discarded upload");
    }
}

/// Reduce a client-supplied name to a safe single path component.
fn sanitize_filename(name: Option<&str>) -> String {
    let base = name
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.mp4".to_string()
    } else {
        cleaned
    }
}
