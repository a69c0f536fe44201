//! Long-running analysis operations.
//!
//! Submitting a document returns `202 Accepted` and a URL for the operation.
//! [`AnalyzeOperation::wait`] keeps asking that URL for status until the
//! service reports a final answer, so callers only ever see one `await`.

use std::time::Duration;

use reqwest::Url;
use serde::de::IgnoredAny;
use tokio::time;

use crate::{
    error::{AnalysisError, RemoteServiceError},
    prelude::*,
};

use super::{DocumentIntelligenceClient, ServiceErrorDetail, error_from_response, retry_after};

/// The status of a running analysis, as reported by the service.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    /// Is the operation still in progress?
    pub fn is_pending(self) -> bool {
        matches!(self, OperationStatus::NotStarted | OperationStatus::Running)
    }

    fn as_str(self) -> &'static str {
        match self {
            OperationStatus::NotStarted => "notStarted",
            OperationStatus::Running => "running",
            OperationStatus::Succeeded => "succeeded",
            OperationStatus::Failed => "failed",
            OperationStatus::Canceled => "canceled",
            OperationStatus::Unknown => "unknown",
        }
    }
}

/// The body returned when polling an operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    status: OperationStatus,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceErrorDetail>,
}

/// The parts of a finished analysis that we care about.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// The model which produced this result.
    #[serde(default)]
    pub model_id: Option<String>,

    /// The format of `content`, if the service told us.
    #[serde(default)]
    pub content_format: Option<String>,

    /// The extracted text, as plain text or Markdown.
    #[serde(default)]
    pub content: String,

    /// Per-page information. We only count these.
    #[serde(default)]
    pub pages: Vec<IgnoredAny>,
}

/// A submitted analysis which hasn't necessarily finished yet.
#[derive(Debug)]
pub struct AnalyzeOperation {
    client: DocumentIntelligenceClient,
    url: Url,
    /// How long the service asked us to wait before the first poll.
    initial_delay: Option<Duration>,
}

impl AnalyzeOperation {
    pub(super) fn new(
        client: DocumentIntelligenceClient,
        url: Url,
        initial_delay: Option<Duration>,
    ) -> Self {
        Self {
            client,
            url,
            initial_delay,
        }
    }

    /// The URL of this operation.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Wait for the operation to finish and return its result.
    ///
    /// There is no deadline here. Use [`crate::analyze::AnalyzeOpts`] to
    /// impose one.
    #[instrument(level = "debug", skip_all, fields(operation = %self.url))]
    pub async fn wait(self) -> Result<AnalyzeResult, AnalysisError> {
        if let Some(delay) = self.initial_delay {
            time::sleep(delay).await;
        }
        loop {
            let response = self.client.get(self.url.clone()).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(error_from_response(response).await.into());
            }
            let delay = retry_after(response.headers()).unwrap_or(self.client.poll_interval);
            let body = response.text().await?;
            let operation = parse_operation_response(&body)?;

            if operation.status.is_pending() {
                trace!(status = operation.status.as_str(), ?delay, "Analysis pending");
                time::sleep(delay).await;
                continue;
            }
            return finish(operation);
        }
    }
}

/// Parse the body of a status response.
fn parse_operation_response(body: &str) -> Result<OperationResponse, AnalysisError> {
    serde_json::from_str(body).map_err(|err| {
        RemoteServiceError::InvalidResponse(format!(
            "could not parse operation status ({err}): {body}"
        ))
        .into()
    })
}

/// Turn a finished operation into a result or an error.
fn finish(operation: OperationResponse) -> Result<AnalyzeResult, AnalysisError> {
    match operation.status {
        OperationStatus::Succeeded => operation.analyze_result.ok_or_else(|| {
            RemoteServiceError::InvalidResponse(
                "analysis succeeded but returned no analyzeResult".to_owned(),
            )
            .into()
        }),
        status => {
            let error = operation.error.unwrap_or_default();
            Err(RemoteServiceError::OperationFailed {
                status: status.as_str().to_owned(),
                code: error.code,
                message: error
                    .message
                    .unwrap_or_else(|| "no error details returned".to_owned()),
            }
            .into())
        }
    }
}
