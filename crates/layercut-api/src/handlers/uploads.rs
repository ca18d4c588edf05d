//! Upload handlers: target issuance and finalization.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

use layercut_firestore::VideoRepository;
use layercut_models::{limits, MatteStatus, UploadStatus, VideoId, VideoRecord};
use layercut_worker::{FirestoreRecords, MatteDriver, PredictionApi, StoragePublisher};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_video_id;
use crate::state::AppState;

/// Response for a freshly issued upload slot.
#[derive(Serialize)]
pub struct CreateUploadResponse {
    pub video_id: String,
    /// Presigned PUT URL for the clip bytes
    pub video_upload_url: String,
    /// Presigned PUT URL for the thumbnail
    pub thumbnail_upload_url: String,
    /// Where the clip will be served from once uploaded
    pub source_url: String,
    /// Where the thumbnail will be served from once uploaded
    pub thumbnail_url: String,
}

/// Issue presigned upload targets and create the pending video record.
pub async fn create_upload(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CreateUploadResponse>> {
    let targets = state.storage.issue_clip_targets(&user.uid).await?;

    let video_id = VideoId::new();
    let mut record = VideoRecord::new(
        video_id.clone(),
        user.uid.as_str(),
        targets.video.public_url.as_str(),
    );
    record.thumbnail_url = Some(targets.thumbnail.public_url.clone());

    let repo = VideoRepository::new((*state.firestore).clone(), &user.uid);
    repo.create(&record).await?;

    info!(user_id = %user.uid, video_id = %video_id, "Issued upload targets");

    Ok(Json(CreateUploadResponse {
        video_id: video_id.to_string(),
        video_upload_url: targets.video.upload_url,
        thumbnail_upload_url: targets.thumbnail.upload_url,
        source_url: targets.video.public_url,
        thumbnail_url: targets.thumbnail.public_url,
    }))
}

/// Request to finalize a completed client upload.
#[derive(Deserialize, Validate)]
pub struct FinalizeUploadRequest {
    /// Clip duration the client measured, in seconds
    pub duration_seconds: f64,
    /// Uploaded object size in bytes
    pub size_bytes: u64,
    #[validate(range(min = 1, max = 8192))]
    pub width: u32,
    #[validate(range(min = 1, max = 8192))]
    pub height: u32,
}

#[derive(Serialize)]
pub struct FinalizeUploadResponse {
    pub video_id: String,
    pub upload_status: UploadStatus,
    pub matte_status: MatteStatus,
}

/// Finalize an upload: enforce the clip limits, mark the record `Ready`
/// and start the background-removal driver on its own task.
pub async fn finalize_upload(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    user: AuthUser,
    Json(request): Json<FinalizeUploadRequest>,
) -> ApiResult<Json<FinalizeUploadResponse>> {
    if !is_valid_video_id(&video_id) {
        return Err(ApiError::bad_request("Invalid video ID format"));
    }
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    if !limits::duration_allowed(request.duration_seconds) {
        return Err(ApiError::bad_request(format!(
            "Clip cannot be longer than {} seconds",
            limits::MAX_CLIP_SECONDS
        )));
    }
    if !limits::size_allowed(request.size_bytes) {
        return Err(ApiError::bad_request(format!(
            "Upload cannot be larger than {} MiB",
            limits::MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let repo = VideoRepository::new((*state.firestore).clone(), &user.uid);
    let id = VideoId::from_string(video_id.as_str());

    let record = repo
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    match record.upload_status {
        UploadStatus::PendingUpload | UploadStatus::Uploading => {}
        UploadStatus::Ready => return Err(ApiError::conflict("Upload already finalized")),
        UploadStatus::UploadFailed => return Err(ApiError::conflict("Upload already failed")),
    }

    repo.finalize_upload(
        &id,
        request.duration_seconds,
        request.width,
        request.height,
        None,
    )
    .await?;

    info!(user_id = %user.uid, video_id = %id, "Upload finalized, starting background removal");

    // One driver invocation per finalized upload, on its own task. The
    // driver owns all further status writes for this video.
    let driver = MatteDriver::new(
        FirestoreRecords::new(VideoRepository::new((*state.firestore).clone(), &user.uid)),
        PredictionApi::new((*state.matting).clone()),
        StoragePublisher::new((*state.storage).clone()),
        state.driver_config.clone(),
    );
    let task_id = id.clone();
    tokio::spawn(async move {
        match driver.run(&task_id).await {
            Ok(outcome) => {
                info!(video_id = %task_id, outcome = ?outcome, "Matting driver finished")
            }
            Err(e) => {
                error!(video_id = %task_id, error = %e, "Matting driver rejected the job")
            }
        }
    });

    Ok(Json(FinalizeUploadResponse {
        video_id: id.to_string(),
        upload_status: UploadStatus::Ready,
        matte_status: MatteStatus::Processing,
    }))
}
