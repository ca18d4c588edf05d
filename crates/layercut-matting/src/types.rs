//! Prediction API request/response types.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a submitted prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
        }
    }

    /// Check if this is a terminal state (polling can stop).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

impl std::fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result payload of a succeeded prediction.
///
/// The provider is loose about the shape: a bare URL string, an object
/// carrying a `url` field, or a sequence of either. `first_url` is the
/// single place that normalizes all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutput {
    Url(String),
    Artifact(PredictionArtifact),
    Many(Vec<PredictionOutput>),
}

/// Object form of a prediction result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionArtifact {
    #[serde(default)]
    pub url: Option<String>,
}

impl PredictionOutput {
    /// Extract the result URL, whatever shape the payload arrived in.
    ///
    /// Sequences use their first element; empty strings, url-less objects
    /// and empty sequences yield `None`.
    pub fn first_url(&self) -> Option<&str> {
        match self {
            PredictionOutput::Url(url) if !url.is_empty() => Some(url),
            PredictionOutput::Url(_) => None,
            PredictionOutput::Artifact(artifact) => {
                artifact.url.as_deref().filter(|u| !u.is_empty())
            }
            PredictionOutput::Many(items) => items.first().and_then(PredictionOutput::first_url),
        }
    }
}

/// One prediction as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Opaque job handle
    pub id: String,
    /// Current lifecycle status
    pub status: PredictionStatus,
    /// Result payload (present on success)
    #[serde(default)]
    pub output: Option<PredictionOutput>,
    /// Provider error message (present on failure)
    #[serde(default)]
    pub error: Option<String>,
}

/// Request to create a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePredictionRequest {
    /// Pinned model version
    pub version: String,
    /// Model input
    pub input: PredictionInput,
}

/// Input for the video matting model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    /// Publicly fetchable URL of the source video
    pub input_video: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_output(json: &str) -> PredictionOutput {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_first_url_from_plain_string() {
        let output = parse_output(r#""https://provider.example/out.mp4""#);
        assert_eq!(output.first_url(), Some("https://provider.example/out.mp4"));
    }

    #[test]
    fn test_first_url_from_object() {
        let output = parse_output(r#"{"url": "https://provider.example/out.mp4"}"#);
        assert_eq!(output.first_url(), Some("https://provider.example/out.mp4"));
    }

    #[test]
    fn test_first_url_from_sequences() {
        let output = parse_output(r#"["https://provider.example/out.mp4", "ignored"]"#);
        assert_eq!(output.first_url(), Some("https://provider.example/out.mp4"));

        let output = parse_output(r#"[{"url": "https://provider.example/out.mp4"}]"#);
        assert_eq!(output.first_url(), Some("https://provider.example/out.mp4"));
    }

    #[test]
    fn test_first_url_identical_across_shapes() {
        let shapes = [
            r#""https://provider.example/out.mp4""#,
            r#"{"url": "https://provider.example/out.mp4"}"#,
            r#"["https://provider.example/out.mp4"]"#,
            r#"[{"url": "https://provider.example/out.mp4"}]"#,
        ];

        for json in shapes {
            assert_eq!(
                parse_output(json).first_url(),
                Some("https://provider.example/out.mp4"),
                "shape: {json}"
            );
        }
    }

    #[test]
    fn test_first_url_absent() {
        assert_eq!(parse_output("[]").first_url(), None);
        assert_eq!(parse_output("{}").first_url(), None);
        assert_eq!(parse_output(r#""""#).first_url(), None);
        assert_eq!(parse_output(r#"[{"other": 1}]"#).first_url(), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!PredictionStatus::Starting.is_terminal());
        assert!(!PredictionStatus::Processing.is_terminal());
        assert!(PredictionStatus::Succeeded.is_terminal());
        assert!(PredictionStatus::Failed.is_terminal());
        assert!(PredictionStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_prediction_deserializes_without_optionals() {
        let prediction: Prediction =
            serde_json::from_str(r#"{"id": "p-1", "status": "processing"}"#).unwrap();
        assert_eq!(prediction.id, "p-1");
        assert_eq!(prediction.status, PredictionStatus::Processing);
        assert!(prediction.output.is_none());
        assert!(prediction.error.is_none());
    }
}
