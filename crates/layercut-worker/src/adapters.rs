//! Production implementations of the driver seams.

use bytes::Bytes;

use layercut_firestore::{BeginMatteOutcome, VideoRepository};
use layercut_matting::{MattingClient, Prediction};
use layercut_models::{VideoId, VideoRecord};
use layercut_storage::StorageClient;

use crate::driver::{MatteClaim, MattingApi, ResultPublisher, VideoRecords};
use crate::error::WorkerResult;
use crate::transfer::upload_and_publish;

/// Video records backed by the Firestore repository.
pub struct FirestoreRecords {
    repo: VideoRepository,
}

impl FirestoreRecords {
    pub fn new(repo: VideoRepository) -> Self {
        Self { repo }
    }
}

impl VideoRecords for FirestoreRecords {
    async fn fetch(&self, video_id: &VideoId) -> WorkerResult<Option<VideoRecord>> {
        Ok(self.repo.get(video_id).await?)
    }

    async fn claim_matte(&self, video_id: &VideoId) -> WorkerResult<MatteClaim> {
        let outcome = self.repo.begin_matte(video_id).await?;
        Ok(match outcome {
            BeginMatteOutcome::Started => MatteClaim::Claimed,
            BeginMatteOutcome::NotReady(status) => MatteClaim::NotReady(status),
            BeginMatteOutcome::AlreadyProcessing => MatteClaim::AlreadyProcessing,
        })
    }

    async fn record_job_handle(&self, video_id: &VideoId, job_id: &str) -> WorkerResult<()> {
        Ok(self.repo.set_matte_job(video_id, job_id).await?)
    }

    async fn complete_matte(&self, video_id: &VideoId, matte_url: &str) -> WorkerResult<()> {
        Ok(self.repo.complete_matte(video_id, matte_url).await?)
    }

    async fn fail_matte(&self, video_id: &VideoId, reason: &str) -> WorkerResult<()> {
        Ok(self.repo.fail_matte(video_id, reason).await?)
    }
}

/// Matting jobs backed by the hosted prediction API.
pub struct PredictionApi {
    client: MattingClient,
}

impl PredictionApi {
    pub fn new(client: MattingClient) -> Self {
        Self { client }
    }
}

impl MattingApi for PredictionApi {
    async fn submit(&self, source_url: &str) -> WorkerResult<Prediction> {
        Ok(self.client.create_prediction(source_url).await?)
    }

    async fn poll(&self, job_id: &str) -> WorkerResult<Prediction> {
        Ok(self.client.get_prediction(job_id).await?)
    }
}

/// Result publishing through the storage gateway.
pub struct StoragePublisher {
    storage: StorageClient,
    http: reqwest::Client,
}

impl StoragePublisher {
    pub fn new(storage: StorageClient) -> Self {
        Self {
            storage,
            http: reqwest::Client::new(),
        }
    }
}

impl ResultPublisher for StoragePublisher {
    async fn publish(&self, bytes: Bytes, owner_id: &str) -> WorkerResult<String> {
        upload_and_publish(&self.http, &self.storage, bytes, owner_id, "video/mp4").await
    }
}
