// SPDX-License-Identifier: GPL-3.0-only

//! Remote classifier client
//!
//! Wire format:
//!
//! ```text
//! POST <endpoint>            {"image": "<base64 jpeg>"}
//! 200 OK                     {"result": "A", "confidence": 0.92}
//! ```
//!
//! Anything else in the body is rejected as `InvalidResponse`; a confidence
//! outside `0..=1` is never clamped. There is no retry here, the caller
//! decides whether and when to run another cycle.

use super::preprocess::PreprocessedImage;
use crate::config::Config;
use crate::constants::{app_info, display};
use crate::errors::{PipelineError, PipelineResult};
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Validated classifier answer
#[derive(Debug, Clone)]
pub struct InferenceResult {
    label: String,
    confidence: f64,
    received_at: DateTime<Local>,
}

impl InferenceResult {
    /// Build a result, rejecting blank labels and confidences outside `0..=1`
    pub fn new(label: impl Into<String>, confidence: f64) -> PipelineResult<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(PipelineError::InvalidResponse("empty result label".into()));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(PipelineError::InvalidResponse(format!(
                "confidence {} is outside 0..=1",
                confidence
            )));
        }
        Ok(Self {
            label,
            confidence,
            received_at: Local::now(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Classifier confidence in `0.0..=1.0`
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }

    /// Colour class for display against a percent threshold
    pub fn tone(&self, threshold_percent: f64) -> display::ConfidenceTone {
        display::confidence_tone(self.confidence, threshold_percent)
    }

    /// "Accuracy: 92.0%"
    pub fn accuracy_text(&self) -> String {
        display::format_accuracy(self.confidence)
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    result: Option<serde_json::Value>,
    confidence: Option<serde_json::Value>,
}

/// Parse and validate a response body
pub fn parse_response(body: &[u8]) -> PipelineResult<InferenceResult> {
    let response: PredictResponse = serde_json::from_slice(body)
        .map_err(|e| PipelineError::InvalidResponse(format!("body is not a JSON object: {}", e)))?;

    let label = match response.result {
        Some(serde_json::Value::String(label)) => label,
        Some(other) => {
            return Err(PipelineError::InvalidResponse(format!(
                "result is not a string: {}",
                other
            )));
        }
        None => return Err(PipelineError::InvalidResponse("missing result".into())),
    };

    let confidence = match response.confidence {
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| PipelineError::InvalidResponse(format!("confidence {} is not finite", n)))?,
        Some(other) => {
            return Err(PipelineError::InvalidResponse(format!(
                "confidence is not a number: {}",
                other
            )));
        }
        None => return Err(PipelineError::InvalidResponse("missing confidence".into())),
    };

    InferenceResult::new(label, confidence)
}

/// Anything that can turn a payload into a label
///
/// Takes the image by value: a payload is sent at most once.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: PreprocessedImage) -> BoxFuture<'_, PipelineResult<InferenceResult>>;
}

/// HTTP client for the fixed inference endpoint
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    endpoint: String,
}

impl InferenceClient {
    /// Client for `endpoint` with a bounded per-request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(app_info::user_agent())
            .build()
            .map_err(|e| PipelineError::NetworkError(format!("Failed to build client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Self::new(config.endpoint.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one payload and wait for the classifier's answer
    pub async fn infer(&self, image: PreprocessedImage) -> PipelineResult<InferenceResult> {
        let started = Instant::now();
        let (width, height) = image.dimensions();
        let payload = image.into_payload();

        debug!(
            endpoint = %self.endpoint,
            width,
            height,
            payload_size = payload.len(),
            "Sending inference request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&PredictRequest { image: &payload })
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "Inference request failed");
                PipelineError::NetworkError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(endpoint = %self.endpoint, status = status.as_u16(), "Classifier rejected request");
            return Err(PipelineError::ServerError(status.as_u16()));
        }

        let body = response.bytes().await?;
        let result = parse_response(&body)?;

        info!(
            label = %result.label(),
            confidence = result.confidence(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Inference result received"
        );
        Ok(result)
    }
}

impl Classifier for InferenceClient {
    fn classify(&self, image: PreprocessedImage) -> BoxFuture<'_, PipelineResult<InferenceResult>> {
        Box::pin(self.infer(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn kind_of(body: &str) -> ErrorKind {
        parse_response(body.as_bytes()).unwrap_err().kind()
    }

    #[test]
    fn test_parse_valid() {
        let result = parse_response(br#"{"result": "A", "confidence": 0.92}"#).unwrap();
        assert_eq!(result.label(), "A");
        assert!((result.confidence() - 0.92).abs() < 1e-6);
    }

    #[test]
    fn test_parse_accepts_bounds_and_extra_fields() {
        assert!(parse_response(br#"{"result": "B", "confidence": 0}"#).is_ok());
        assert!(parse_response(br#"{"result": "B", "confidence": 1, "model": "v2"}"#).is_ok());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert_eq!(kind_of(r#"{"result": "A", "confidence": 1.2}"#), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"{"result": "A", "confidence": -0.01}"#), ErrorKind::InvalidResponse);
        // Percentages are not silently rescaled
        assert_eq!(kind_of(r#"{"result": "A", "confidence": 92}"#), ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_rejects_missing_or_mistyped_fields() {
        assert_eq!(kind_of(r#"{"confidence": 0.5}"#), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"{"result": "A"}"#), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"{"result": 7, "confidence": 0.5}"#), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"{"result": "A", "confidence": "0.5"}"#), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"{"result": "  ", "confidence": 0.5}"#), ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert_eq!(kind_of("<html>502 Bad Gateway</html>"), ErrorKind::InvalidResponse);
        assert_eq!(kind_of(r#"["A", 0.9]"#), ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_result_tone() {
        use crate::constants::display::ConfidenceTone;
        let confident = InferenceResult::new("A", 0.92).unwrap();
        let unsure = InferenceResult::new("B", 0.45).unwrap();
        assert_eq!(confident.tone(70.0), ConfidenceTone::Positive);
        assert_eq!(unsure.tone(70.0), ConfidenceTone::Negative);
        assert_eq!(confident.accuracy_text(), "Accuracy: 92.0%");
    }

    #[test]
    fn test_confidence_kept_exact() {
        use crate::constants::display::ConfidenceTone;
        let result = parse_response(br#"{"result": "A", "confidence": 0.700000001}"#).unwrap();
        assert_eq!(result.confidence(), 0.700000001);
        assert_eq!(result.tone(70.0), ConfidenceTone::Positive);

        let boundary = parse_response(br#"{"result": "A", "confidence": 0.7}"#).unwrap();
        assert_eq!(boundary.tone(70.0), ConfidenceTone::Negative);
    }

    #[tokio::test]
    async fn test_refused_connection_is_network_error() {
        // Grab a free port, then close it so the connect is refused
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            InferenceClient::new(format!("http://{}/predict", addr), Duration::from_secs(2)).unwrap();
        let image = crate::pipelines::inference::preprocess::ImagePreprocessor::new()
            .process(
                &crate::backends::camera::RawImage::new(
                    crate::media::encode_jpeg(&image::RgbImage::new(8, 8), 0.7).unwrap(),
                    "mem",
                ),
                crate::pipelines::inference::preprocess::PreprocessConfig::for_profile(
                    crate::constants::OperatingProfile::Interactive,
                ),
            )
            .unwrap();

        let err = client.infer(image).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }
}
