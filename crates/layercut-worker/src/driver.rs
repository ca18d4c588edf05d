//! The background-removal job driver.
//!
//! One `run` call owns one video's journey from `Ready` to a terminal
//! matte status. The three collaborators (record store, matting API,
//! result publisher) are seams so the state machine can be exercised
//! with scripted implementations.

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use layercut_matting::{Prediction, PredictionStatus};
use layercut_models::{UploadStatus, VideoId, VideoRecord};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::poll::{poll_until, PollConfig, PollOutcome, PollStep};
use crate::transfer::{download_with_retry, TransferConfig};

/// Outcome of claiming a video for matting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatteClaim {
    /// The record is now `Processing` and this driver owns the job.
    Claimed,
    /// Upload is not `Ready`.
    NotReady(UploadStatus),
    /// Another matting job is already in flight.
    AlreadyProcessing,
}

/// Record store operations the driver needs.
#[allow(async_fn_in_trait)]
pub trait VideoRecords: Send + Sync {
    async fn fetch(&self, video_id: &VideoId) -> WorkerResult<Option<VideoRecord>>;
    async fn claim_matte(&self, video_id: &VideoId) -> WorkerResult<MatteClaim>;
    async fn record_job_handle(&self, video_id: &VideoId, job_id: &str) -> WorkerResult<()>;
    async fn complete_matte(&self, video_id: &VideoId, matte_url: &str) -> WorkerResult<()>;
    async fn fail_matte(&self, video_id: &VideoId, reason: &str) -> WorkerResult<()>;
}

/// Inference provider operations the driver needs.
#[allow(async_fn_in_trait)]
pub trait MattingApi: Send + Sync {
    async fn submit(&self, source_url: &str) -> WorkerResult<Prediction>;
    async fn poll(&self, job_id: &str) -> WorkerResult<Prediction>;
}

/// Publishes result bytes to durable storage, returning the public URL.
#[allow(async_fn_in_trait)]
pub trait ResultPublisher: Send + Sync {
    async fn publish(&self, bytes: Bytes, owner_id: &str) -> WorkerResult<String>;
}

/// Terminal outcome of one driver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed { url: String },
    Failed { reason: String },
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Poll budget for the inference job.
    pub poll: PollConfig,
    /// Retry budget for the result download.
    pub transfer: TransferConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::new("matte_status"),
            transfer: TransferConfig::default(),
        }
    }
}

/// Drives one video from `Ready` to a terminal matte status.
pub struct MatteDriver<R, M, P> {
    records: R,
    matting: M,
    publisher: P,
    http: reqwest::Client,
    config: DriverConfig,
}

impl<R, M, P> MatteDriver<R, M, P>
where
    R: VideoRecords,
    M: MattingApi,
    P: ResultPublisher,
{
    /// Create a new driver.
    pub fn new(records: R, matting: M, publisher: P, config: DriverConfig) -> Self {
        Self {
            records,
            matting,
            publisher,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Run the job to a terminal matte status, exactly once.
    ///
    /// Calling this on a video that does not exist, is not `Ready`, or
    /// already has a matting job in flight is a contract violation and
    /// returns `InvalidState` without touching the inference provider.
    /// Every other failure lands in `TerminalOutcome::Failed` with the
    /// record updated best-effort.
    pub async fn run(&self, video_id: &VideoId) -> WorkerResult<TerminalOutcome> {
        let record = self.records.fetch(video_id).await?.ok_or_else(|| {
            WorkerError::invalid_state(format!("video {} does not exist", video_id))
        })?;

        if record.upload_status != UploadStatus::Ready {
            return Err(WorkerError::invalid_state(format!(
                "video {} upload status is {}, expected {}",
                video_id,
                record.upload_status,
                UploadStatus::Ready
            )));
        }

        match self.records.claim_matte(video_id).await? {
            MatteClaim::Claimed => {}
            MatteClaim::NotReady(status) => {
                return Err(WorkerError::invalid_state(format!(
                    "video {} upload status is {}, expected {}",
                    video_id,
                    status,
                    UploadStatus::Ready
                )));
            }
            MatteClaim::AlreadyProcessing => {
                return Err(WorkerError::invalid_state(format!(
                    "video {} already has a matting job in flight",
                    video_id
                )));
            }
        }

        info!(
            video_id = %video_id,
            source_url = %record.source_url,
            "Starting background removal"
        );

        match self.process(video_id, &record).await {
            Ok(matte_url) => {
                self.records.complete_matte(video_id, &matte_url).await?;
                metrics::record_outcome("completed");
                info!(video_id = %video_id, matte_url = %matte_url, "Background removal completed");
                Ok(TerminalOutcome::Completed { url: matte_url })
            }
            Err(e) => {
                let reason = e.to_string();
                error!(
                    video_id = %video_id,
                    kind = e.kind(),
                    reason = %reason,
                    "Background removal failed"
                );
                metrics::record_outcome(e.kind());

                // Best-effort: a failed status write must not replace the
                // primary error being reported
                if let Err(write_err) = self.records.fail_matte(video_id, &reason).await {
                    warn!(
                        video_id = %video_id,
                        error = %write_err,
                        "Failed to persist failure status"
                    );
                }

                Ok(TerminalOutcome::Failed { reason })
            }
        }
    }

    /// Submit, poll, download, republish. Returns the published matte URL.
    async fn process(&self, video_id: &VideoId, record: &VideoRecord) -> WorkerResult<String> {
        let prediction = self
            .matting
            .submit(&record.source_url)
            .await
            .map_err(|e| match e {
                WorkerError::SubmissionFailed(_) => e,
                other => WorkerError::submission_failed(other.to_string()),
            })?;
        let job_id = prediction.id.clone();

        debug!(video_id = %video_id, job_id = %job_id, "Matting job submitted");

        // Non-critical: the handle makes stuck jobs attributable
        if let Err(e) = self.records.record_job_handle(video_id, &job_id).await {
            warn!(video_id = %video_id, error = %e, "Failed to persist job handle");
        }

        let attempts_used = AtomicU32::new(0);
        let outcome = poll_until(&self.config.poll, |attempt| {
            attempts_used.store(attempt, Ordering::Relaxed);
            let job_id = job_id.clone();
            async move {
                match self.matting.poll(&job_id).await {
                    Ok(p) => match p.status {
                        PredictionStatus::Succeeded => PollStep::Done(p.output),
                        PredictionStatus::Failed | PredictionStatus::Canceled => PollStep::Fail(
                            p.error
                                .unwrap_or_else(|| format!("prediction {}", p.status)),
                        ),
                        PredictionStatus::Starting | PredictionStatus::Processing => {
                            PollStep::Pending
                        }
                    },
                    Err(e) => PollStep::Fail(format!("status poll failed: {}", e)),
                }
            }
        })
        .await;
        metrics::record_poll_attempts(attempts_used.load(Ordering::Relaxed));

        let output = match outcome {
            PollOutcome::Completed(output) => output,
            PollOutcome::Failed(reason) => return Err(WorkerError::UpstreamFailed(reason)),
            PollOutcome::Exhausted { attempts } => {
                return Err(WorkerError::UpstreamTimeout(format!(
                    "no terminal state after {} attempts",
                    attempts
                )))
            }
        };

        let result_url = output
            .as_ref()
            .and_then(|o| o.first_url())
            .map(str::to_string)
            .ok_or_else(|| {
                WorkerError::ExtractionFailed(format!(
                    "prediction {} succeeded without a result URL",
                    job_id
                ))
            })?;

        debug!(video_id = %video_id, result_url = %result_url, "Transferring result");

        let bytes = download_with_retry(&self.http, &result_url, &self.config.transfer).await?;
        self.publisher.publish(bytes, &record.user_id).await
    }
}
