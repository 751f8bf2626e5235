use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::config::Settings;

const ERROR_BODY_PREVIEW: usize = 500;

/// One decoded page, forwarded to the model as inline data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InlineImage {
    pub(crate) mime_type: String,
    /// Base64 without any data-URL prefix.
    pub(crate) data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum GatewayStage {
    SubjectDetection,
    Grading,
    ProgressReport,
    SimilarProblems,
}

impl GatewayStage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::SubjectDetection => "subject_detection",
            Self::Grading => "grading",
            Self::ProgressReport => "progress_report",
            Self::SimilarProblems => "similar_problems",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct GatewayRequest<'a> {
    pub(crate) stage: GatewayStage,
    pub(crate) prompt: &'a str,
    pub(crate) images: &'a [InlineImage],
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub(crate) enum GatewayError {
    #[error("AI service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI service request failed: {0}")]
    Transport(String),
    #[error("AI service response had no usable content: {0}")]
    MalformedResponse(String),
    #[error("AI request cancelled")]
    Cancelled,
}

impl GatewayError {
    fn metric_status(&self) -> &'static str {
        match self {
            Self::Status { .. } => "http_error",
            Self::Transport(_) => "transport_error",
            Self::MalformedResponse(_) => "malformed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Text generation over a prompt plus optional inline images. Implementations never
/// retry; callers decide how to recover.
#[async_trait]
pub(crate) trait AiGateway: Send + Sync {
    async fn generate(
        &self,
        request: GatewayRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;
}

/// Runs one gateway call and records its outcome and latency.
pub(crate) async fn call(
    gateway: &dyn AiGateway,
    request: GatewayRequest<'_>,
    cancel: &CancellationToken,
) -> Result<String, GatewayError> {
    if cancel.is_cancelled() {
        return Err(GatewayError::Cancelled);
    }

    let stage = request.stage.as_str();
    let timer = Instant::now();
    let result = gateway.generate(request, cancel).await;
    let elapsed = timer.elapsed();

    let status = match &result {
        Ok(_) => "ok",
        Err(err) => err.metric_status(),
    };
    metrics::counter!("ai_gateway_requests_total", "stage" => stage, "status" => status)
        .increment(1);
    metrics::histogram!("ai_gateway_duration_seconds", "stage" => stage)
        .record(elapsed.as_secs_f64());

    match &result {
        Ok(text) => tracing::info!(
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            response_chars = text.chars().count(),
            "AI gateway call completed"
        ),
        Err(err) => tracing::warn!(
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err,
            "AI gateway call failed"
        ),
    }

    result
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiGateway {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().ai_request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().gemini_api_key.clone(),
            base_url: settings.ai().gemini_base_url.trim_end_matches('/').to_string(),
            model: settings.ai().ai_model.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, request: GatewayRequest<'_>) -> Result<String, GatewayError> {
        let mut parts = Vec::with_capacity(request.images.len() + 1);
        parts.push(Part::Text { text: request.prompt });
        parts.extend(request.images.iter().map(|image| Part::InlineData {
            inline_data: InlineData { mime_type: &image.mime_type, data: &image.data },
        }));
        let payload = GenerateContentRequest { contents: vec![Content { parts }] };

        tracing::debug!(
            stage = request.stage.as_str(),
            model = %self.model,
            images = request.images.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| GatewayError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_PREVIEW).collect(),
            });
        }

        candidate_text(&body)
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn generate(
        &self,
        request: GatewayRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.send(request) => result,
        }
    }
}

/// Concatenated text of the first candidate's parts.
fn candidate_text(body: &str) -> Result<String, GatewayError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|err| GatewayError::MalformedResponse(format!("undecodable body: {err}")))?;

    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .ok_or_else(|| GatewayError::MalformedResponse("missing candidates[0].content".into()))?;

    let text: String = content.parts.into_iter().filter_map(|part| part.text).collect();
    if text.is_empty() {
        return Err(GatewayError::MalformedResponse("candidate has no text parts".into()));
    }

    Ok(text)
}
