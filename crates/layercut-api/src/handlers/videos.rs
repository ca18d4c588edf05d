//! Video library handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use layercut_firestore::VideoRepository;
use layercut_models::{MatteStatus, UploadStatus, VideoId, VideoRecord, VideoSummary};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_video_id;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ListVideosResponse {
    pub videos: Vec<VideoSummary>,
}

/// List the caller's videos, newest first.
///
/// Also runs the stale-matte sweep: records stuck in `processing` past
/// the deadline get failed before the list is returned, so the grid
/// never shows an eternally spinning clip.
pub async fn list_user_videos(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ListVideosResponse>> {
    let repo = VideoRepository::new((*state.firestore).clone(), &user.uid);

    match repo
        .fail_stale_mattes(state.config.stale_matte_deadline_secs)
        .await
    {
        Ok(0) => {}
        Ok(swept) => info!(user_id = %user.uid, swept, "Swept stale matting jobs"),
        Err(e) => warn!(user_id = %user.uid, error = %e, "Stale matte sweep failed"),
    }

    let videos = repo.list().await?.iter().map(VideoSummary::from).collect();

    Ok(Json(ListVideosResponse { videos }))
}

/// Full view of one video record.
#[derive(Serialize)]
pub struct VideoDetailResponse {
    pub id: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub upload_status: UploadStatus,
    pub matte_status: MatteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matte_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&VideoRecord> for VideoDetailResponse {
    fn from(record: &VideoRecord) -> Self {
        Self {
            id: record.video_id.to_string(),
            source_url: record.source_url.clone(),
            thumbnail_url: record.thumbnail_url.clone(),
            upload_status: record.upload_status,
            matte_status: record.matte_status,
            matte_url: record.matte_url.clone(),
            error_message: record.error_message.clone(),
            duration_seconds: record.duration_seconds,
            width: record.width,
            height: record.height,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Fetch one of the caller's videos.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    user: AuthUser,
) -> ApiResult<Json<VideoDetailResponse>> {
    if !is_valid_video_id(&video_id) {
        return Err(ApiError::bad_request("Invalid video ID format"));
    }

    let repo = VideoRepository::new((*state.firestore).clone(), &user.uid);
    let record = repo
        .get(&VideoId::from_string(video_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    Ok(Json(VideoDetailResponse::from(&record)))
}
