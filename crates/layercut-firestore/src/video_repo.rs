//! Typed repository for video records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use layercut_models::{MatteStatus, UploadStatus, VideoId, VideoRecord};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

/// Outcome of a guarded transition into matte processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginMatteOutcome {
    /// The record is now `Processing` and this caller owns the job.
    Started,
    /// Upload is not `Ready`; matting cannot begin.
    NotReady(UploadStatus),
    /// Another matting job is already in flight (or won the race).
    AlreadyProcessing,
}

/// Repository for one user's video documents.
pub struct VideoRepository {
    client: FirestoreClient,
    user_id: String,
}

impl VideoRepository {
    /// Create a new video repository.
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    /// Collection path for the user's videos.
    fn collection(&self) -> String {
        format!("users/{}/videos", self.user_id)
    }

    /// Create a new video record.
    pub async fn create(&self, record: &VideoRecord) -> FirestoreResult<()> {
        let fields = record_to_fields(record);
        self.client
            .create_document(&self.collection(), record.video_id.as_str(), fields)
            .await?;
        info!(video_id = %record.video_id, "Created video record");
        Ok(())
    }

    /// Get a video record by ID.
    pub async fn get(&self, video_id: &VideoId) -> FirestoreResult<Option<VideoRecord>> {
        let doc = self
            .client
            .get_document(&self.collection(), video_id.as_str())
            .await?;

        match doc {
            Some(d) => Ok(Some(record_from_document(&d, video_id, &self.user_id)?)),
            None => Ok(None),
        }
    }

    /// List the user's videos, newest first.
    pub async fn list(&self) -> FirestoreResult<Vec<VideoRecord>> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_documents(
                    &self.collection(),
                    Some(100),
                    page_token.as_deref(),
                    Some("created_at desc"),
                )
                .await?;

            if let Some(docs) = page.documents {
                for doc in &docs {
                    let Some(id) = doc.doc_id() else { continue };
                    let video_id = VideoId::from_string(id);
                    match record_from_document(doc, &video_id, &self.user_id) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            warn!(video_id = %video_id, error = %e, "Skipping malformed video record");
                        }
                    }
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(records)
    }

    /// Update the upload status.
    pub async fn set_upload_status(
        &self,
        video_id: &VideoId,
        status: UploadStatus,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "upload_status".to_string(),
            status.as_str().to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .patch_document(
                &self.collection(),
                video_id.as_str(),
                fields,
                vec!["upload_status".to_string(), "updated_at".to_string()],
            )
            .await?;
        Ok(())
    }

    /// Mark the upload as durably stored, recording the clip metadata the
    /// client measured.
    pub async fn finalize_upload(
        &self,
        video_id: &VideoId,
        duration_seconds: f64,
        width: u32,
        height: u32,
        thumbnail_url: Option<&str>,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        let mut mask = vec![
            "upload_status".to_string(),
            "duration_seconds".to_string(),
            "width".to_string(),
            "height".to_string(),
            "updated_at".to_string(),
        ];

        fields.insert(
            "upload_status".to_string(),
            UploadStatus::Ready.as_str().to_firestore_value(),
        );
        fields.insert(
            "duration_seconds".to_string(),
            duration_seconds.to_firestore_value(),
        );
        fields.insert("width".to_string(), width.to_firestore_value());
        fields.insert("height".to_string(), height.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        if let Some(url) = thumbnail_url {
            fields.insert("thumbnail_url".to_string(), url.to_firestore_value());
            mask.push("thumbnail_url".to_string());
        }

        self.client
            .patch_document(&self.collection(), video_id.as_str(), fields, mask)
            .await?;
        Ok(())
    }

    /// Transition into matte processing, guarded against concurrent drivers.
    ///
    /// Reads the record, rejects uploads that are not `Ready` and mattes
    /// already in flight, then writes `Processing` with an update-time
    /// precondition. Losing the precondition race reports
    /// `AlreadyProcessing` rather than double-submitting.
    pub async fn begin_matte(&self, video_id: &VideoId) -> FirestoreResult<BeginMatteOutcome> {
        let doc = self
            .client
            .get_document(&self.collection(), video_id.as_str())
            .await?
            .ok_or_else(|| {
                FirestoreError::not_found(format!("{}/{}", self.collection(), video_id))
            })?;

        let upload_status = doc
            .field::<String>("upload_status")
            .and_then(|s| UploadStatus::parse(&s))
            .unwrap_or_default();
        if upload_status != UploadStatus::Ready {
            return Ok(BeginMatteOutcome::NotReady(upload_status));
        }

        let matte_status = doc
            .field::<String>("matte_status")
            .and_then(|s| MatteStatus::parse(&s))
            .unwrap_or_default();
        if matte_status == MatteStatus::Processing {
            return Ok(BeginMatteOutcome::AlreadyProcessing);
        }

        let update_time = doc.update_time.clone().ok_or_else(|| {
            FirestoreError::invalid_response("document missing updateTime")
        })?;

        let mut fields = HashMap::new();
        fields.insert(
            "matte_status".to_string(),
            MatteStatus::Processing.as_str().to_firestore_value(),
        );
        fields.insert("matte_job_id".to_string(), Value::NullValue(()));
        fields.insert(
            "matte_started_at".to_string(),
            Utc::now().to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        let result = self
            .client
            .patch_document_guarded(
                &self.collection(),
                video_id.as_str(),
                fields,
                vec![
                    "matte_status".to_string(),
                    "matte_job_id".to_string(),
                    "matte_started_at".to_string(),
                    "updated_at".to_string(),
                ],
                &update_time,
            )
            .await;

        match result {
            Ok(_) => Ok(BeginMatteOutcome::Started),
            Err(e) if e.is_precondition_failed() => Ok(BeginMatteOutcome::AlreadyProcessing),
            Err(e) => Err(e),
        }
    }

    /// Record the provider job handle for the in-flight matte.
    pub async fn set_matte_job(&self, video_id: &VideoId, job_id: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("matte_job_id".to_string(), job_id.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .patch_document(
                &self.collection(),
                video_id.as_str(),
                fields,
                vec!["matte_job_id".to_string(), "updated_at".to_string()],
            )
            .await?;
        Ok(())
    }

    /// Mark the matte as completed with its published URL.
    pub async fn complete_matte(&self, video_id: &VideoId, matte_url: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "matte_status".to_string(),
            MatteStatus::Completed.as_str().to_firestore_value(),
        );
        fields.insert("matte_url".to_string(), matte_url.to_firestore_value());
        fields.insert("error_message".to_string(), Value::NullValue(()));
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .patch_document(
                &self.collection(),
                video_id.as_str(),
                fields,
                vec![
                    "matte_status".to_string(),
                    "matte_url".to_string(),
                    "error_message".to_string(),
                    "updated_at".to_string(),
                ],
            )
            .await?;
        info!(video_id = %video_id, "Matte completed");
        Ok(())
    }

    /// Mark the matte as failed.
    pub async fn fail_matte(&self, video_id: &VideoId, reason: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "matte_status".to_string(),
            MatteStatus::Failed.as_str().to_firestore_value(),
        );
        fields.insert("matte_url".to_string(), Value::NullValue(()));
        fields.insert("error_message".to_string(), reason.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        self.client
            .patch_document(
                &self.collection(),
                video_id.as_str(),
                fields,
                vec![
                    "matte_status".to_string(),
                    "matte_url".to_string(),
                    "error_message".to_string(),
                    "updated_at".to_string(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Fail records stuck in `Processing` past the deadline.
    ///
    /// Returns how many records were swept. Individual sweep failures are
    /// logged and skipped so one bad record cannot wedge the list.
    pub async fn fail_stale_mattes(&self, deadline_secs: i64) -> FirestoreResult<u32> {
        let records = self.list().await?;
        let mut swept = 0;

        for record in records {
            if !record.is_matte_stale(deadline_secs) {
                continue;
            }

            warn!(
                video_id = %record.video_id,
                job_id = record.matte_job_id.as_deref().unwrap_or("-"),
                "Failing stale matting job"
            );

            match self
                .fail_matte(&record.video_id, "Background removal timed out")
                .await
            {
                Ok(()) => swept += 1,
                Err(e) => {
                    warn!(video_id = %record.video_id, error = %e, "Failed to sweep stale matte");
                }
            }
        }

        Ok(swept)
    }
}

/// Convert a record into Firestore fields.
fn record_to_fields(record: &VideoRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(
        "video_id".to_string(),
        record.video_id.as_str().to_firestore_value(),
    );
    fields.insert(
        "user_id".to_string(),
        record.user_id.as_str().to_firestore_value(),
    );
    fields.insert(
        "source_url".to_string(),
        record.source_url.as_str().to_firestore_value(),
    );
    fields.insert(
        "thumbnail_url".to_string(),
        record.thumbnail_url.to_firestore_value(),
    );
    fields.insert(
        "upload_status".to_string(),
        record.upload_status.as_str().to_firestore_value(),
    );
    fields.insert(
        "matte_status".to_string(),
        record.matte_status.as_str().to_firestore_value(),
    );
    fields.insert(
        "matte_url".to_string(),
        record.matte_url.to_firestore_value(),
    );
    fields.insert(
        "matte_job_id".to_string(),
        record.matte_job_id.to_firestore_value(),
    );
    fields.insert(
        "matte_started_at".to_string(),
        record.matte_started_at.to_firestore_value(),
    );
    fields.insert(
        "error_message".to_string(),
        record.error_message.to_firestore_value(),
    );
    fields.insert(
        "duration_seconds".to_string(),
        record.duration_seconds.to_firestore_value(),
    );
    fields.insert("width".to_string(), record.width.to_firestore_value());
    fields.insert("height".to_string(), record.height.to_firestore_value());
    fields.insert(
        "created_at".to_string(),
        record.created_at.to_firestore_value(),
    );
    fields.insert(
        "updated_at".to_string(),
        record.updated_at.to_firestore_value(),
    );
    fields
}

/// Rehydrate a record from a Firestore document.
fn record_from_document(
    doc: &Document,
    video_id: &VideoId,
    user_id: &str,
) -> FirestoreResult<VideoRecord> {
    let source_url = doc.field::<String>("source_url").ok_or_else(|| {
        FirestoreError::invalid_response(format!("video {} missing source_url", video_id))
    })?;
    let created_at = doc.field::<DateTime<Utc>>("created_at").ok_or_else(|| {
        FirestoreError::invalid_response(format!("video {} missing created_at", video_id))
    })?;

    Ok(VideoRecord {
        video_id: video_id.clone(),
        user_id: doc
            .field::<String>("user_id")
            .unwrap_or_else(|| user_id.to_string()),
        source_url,
        thumbnail_url: doc.field::<String>("thumbnail_url"),
        upload_status: doc
            .field::<String>("upload_status")
            .and_then(|s| UploadStatus::parse(&s))
            .unwrap_or_default(),
        matte_status: doc
            .field::<String>("matte_status")
            .and_then(|s| MatteStatus::parse(&s))
            .unwrap_or_default(),
        matte_url: doc.field::<String>("matte_url"),
        matte_job_id: doc.field::<String>("matte_job_id"),
        matte_started_at: doc.field::<DateTime<Utc>>("matte_started_at"),
        error_message: doc.field::<String>("error_message"),
        duration_seconds: doc.field::<f64>("duration_seconds").unwrap_or(0.0),
        width: doc.field::<u32>("width").unwrap_or(0),
        height: doc.field::<u32>("height").unwrap_or(0),
        created_at,
        updated_at: doc.field::<DateTime<Utc>>("updated_at").unwrap_or(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> VideoRecord {
        VideoRecord::new(
            VideoId::from_string("v-12345678"),
            "user-1",
            "https://cdn.example/user-1/abc/v.mp4",
        )
    }

    #[test]
    fn test_record_field_round_trip() {
        let mut record = sample_record().ready();
        record.matte_status = MatteStatus::Completed;
        record.matte_url = Some("https://cdn.example/user-1/def/out.mp4".to_string());
        record.matte_job_id = Some("pred-1".to_string());
        record.duration_seconds = 7.5;
        record.width = 1080;
        record.height = 1920;

        let fields = record_to_fields(&record);
        let mut doc = Document::new(fields);
        doc.name = Some(
            "projects/p/databases/(default)/documents/users/user-1/videos/v-12345678".into(),
        );

        let restored = record_from_document(&doc, &record.video_id, "user-1").unwrap();
        assert_eq!(restored.source_url, record.source_url);
        assert_eq!(restored.upload_status, UploadStatus::Ready);
        assert_eq!(restored.matte_status, MatteStatus::Completed);
        assert_eq!(restored.matte_url, record.matte_url);
        assert_eq!(restored.matte_job_id, record.matte_job_id);
        assert_eq!(restored.duration_seconds, 7.5);
        assert_eq!(restored.width, 1080);
        assert_eq!(restored.height, 1920);
    }

    #[test]
    fn test_missing_required_fields_rejected() {
        let doc = Document::new(HashMap::new());
        let result = record_from_document(&doc, &VideoId::from_string("v-1"), "user-1");
        assert!(matches!(result, Err(FirestoreError::InvalidResponse(_))));
    }

    mod begin_matte {
        use super::*;
        use crate::client::{FirestoreClient, FirestoreConfig};
        use crate::retry::RetryConfig;
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        async fn repo_against(server: &MockServer) -> VideoRepository {
            let host = server.uri().strip_prefix("http://").unwrap().to_string();
            let client = FirestoreClient::new(FirestoreConfig {
                project_id: "test-project".to_string(),
                database_id: "(default)".to_string(),
                timeout: Duration::from_secs(5),
                connect_timeout: Duration::from_secs(2),
                retry: RetryConfig {
                    max_retries: 0,
                    base_delay_ms: 1,
                    max_delay_ms: 2,
                },
                emulator_host: Some(host),
            })
            .await
            .unwrap();
            VideoRepository::new(client, "u-1")
        }

        fn doc_path() -> String {
            "/v1/projects/test-project/databases/(default)/documents/users/u-1/videos/v-1"
                .to_string()
        }

        fn doc_body(upload_status: &str, matte_status: &str) -> serde_json::Value {
            serde_json::json!({
                "name": "projects/test-project/databases/(default)/documents/users/u-1/videos/v-1",
                "fields": {
                    "source_url": {"stringValue": "https://cdn.example/u-1/abc/v.mp4"},
                    "upload_status": {"stringValue": upload_status},
                    "matte_status": {"stringValue": matte_status},
                    "created_at": {"timestampValue": "2026-01-01T00:00:00Z"},
                    "updated_at": {"timestampValue": "2026-01-01T00:00:00Z"}
                },
                "createTime": "2026-01-01T00:00:00Z",
                "updateTime": "2026-01-01T00:00:01Z"
            })
        }

        #[tokio::test]
        async fn test_claims_a_ready_record() {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path(doc_path()))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(doc_body("ready", "not_started")),
                )
                .mount(&server)
                .await;
            Mock::given(method("PATCH"))
                .and(path(doc_path()))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(doc_body("ready", "processing")),
                )
                .expect(1)
                .mount(&server)
                .await;

            let repo = repo_against(&server).await;
            let outcome = repo.begin_matte(&VideoId::from_string("v-1")).await.unwrap();
            assert_eq!(outcome, BeginMatteOutcome::Started);
        }

        #[tokio::test]
        async fn test_rejects_unready_upload_without_writing() {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path(doc_path()))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(doc_body("pending_upload", "not_started")),
                )
                .mount(&server)
                .await;
            Mock::given(method("PATCH"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let repo = repo_against(&server).await;
            let outcome = repo.begin_matte(&VideoId::from_string("v-1")).await.unwrap();
            assert_eq!(
                outcome,
                BeginMatteOutcome::NotReady(UploadStatus::PendingUpload)
            );
        }

        #[tokio::test]
        async fn test_rejects_in_flight_matte_without_writing() {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path(doc_path()))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(doc_body("ready", "processing")),
                )
                .mount(&server)
                .await;
            Mock::given(method("PATCH"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let repo = repo_against(&server).await;
            let outcome = repo.begin_matte(&VideoId::from_string("v-1")).await.unwrap();
            assert_eq!(outcome, BeginMatteOutcome::AlreadyProcessing);
        }

        #[tokio::test]
        async fn test_lost_precondition_race_reports_already_processing() {
            let server = MockServer::start().await;

            Mock::given(method("GET"))
                .and(path(doc_path()))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(doc_body("ready", "not_started")),
                )
                .mount(&server)
                .await;
            Mock::given(method("PATCH"))
                .and(path(doc_path()))
                .respond_with(ResponseTemplate::new(412).set_body_string("updateTime mismatch"))
                .mount(&server)
                .await;

            let repo = repo_against(&server).await;
            let outcome = repo.begin_matte(&VideoId::from_string("v-1")).await.unwrap();
            assert_eq!(outcome, BeginMatteOutcome::AlreadyProcessing);
        }
    }

    #[test]
    fn test_unknown_statuses_default() {
        let mut record = sample_record();
        record.upload_status = UploadStatus::Ready;
        let mut fields = record_to_fields(&record);
        fields.insert(
            "upload_status".to_string(),
            "some_future_status".to_firestore_value(),
        );
        let doc = Document::new(fields);

        let restored = record_from_document(&doc, &record.video_id, "user-1").unwrap();
        assert_eq!(restored.upload_status, UploadStatus::PendingUpload);
    }
}
