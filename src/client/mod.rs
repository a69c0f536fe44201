//! Client for the Azure AI Document Intelligence REST API.
//!
//! We only need one operation: submit a document to a prebuilt model and wait
//! for the result. Submission returns a long-running operation handle (see
//! [`poller`]), which the caller awaits.

use std::time::Duration;

use clap::ValueEnum;
use reqwest::{
    Response, Url,
    header::{CONTENT_TYPE, HeaderMap, HeaderValue},
};

use crate::{
    config::{ENDPOINT_VAR, KEY_VAR, ServiceConfig},
    error::{AnalysisError, RemoteServiceError},
    prelude::*,
};

pub use self::poller::{AnalyzeOperation, AnalyzeResult};

pub mod poller;
#[cfg(test)]
pub(crate) mod test_server;

/// The built-in layout analysis model.
pub const LAYOUT_MODEL_ID: &str = "prebuilt-layout";

/// Header used to pass our API key.
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Header pointing at the long-running operation created by a submission.
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";

/// The format of the `content` field returned by the service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum ContentFormat {
    /// Plain OCR text.
    #[default]
    Text,

    /// Markdown, preserving headings, tables and other structure.
    Markdown,
}

/// A request to analyze a single document.
pub struct AnalyzeRequest {
    /// The model to run, usually [`LAYOUT_MODEL_ID`].
    pub model_id: String,

    /// The raw document bytes.
    pub data: Vec<u8>,

    /// The MIME type of `data`.
    pub content_type: String,

    /// The content format we want back.
    pub output_format: ContentFormat,
}

/// An authenticated handle to the document analysis service.
///
/// This is cheap to clone, and safe to share between tasks, because the
/// underlying [`reqwest::Client`] keeps its connection pool behind an `Arc`.
#[derive(Clone, Debug)]
pub struct DocumentIntelligenceClient {
    /// Our HTTP client.
    http: reqwest::Client,

    /// The service endpoint.
    endpoint: Url,

    /// Our API key, marked as sensitive so it never shows up in `Debug`
    /// output.
    key: HeaderValue,

    /// REST API version.
    api_version: String,

    /// How long to wait between polls if the service doesn't say.
    poll_interval: Duration,
}

/// Create a client from our configuration.
///
/// This never touches the network. Bad credentials will only be noticed when
/// we make our first request.
pub fn create_client(
    config: &ServiceConfig,
) -> Result<DocumentIntelligenceClient, AnalysisError> {
    let missing = |var: &str| {
        AnalysisError::Configuration(format!(
            "Azure Document Intelligence credentials not found: {var} is not set"
        ))
    };
    let endpoint = config.endpoint.as_deref().ok_or_else(|| missing(ENDPOINT_VAR))?;
    let key = config.key.as_deref().ok_or_else(|| missing(KEY_VAR))?;

    let endpoint = Url::parse(endpoint.trim()).map_err(|err| {
        AnalysisError::Configuration(format!("{ENDPOINT_VAR} is not a valid URL: {err}"))
    })?;
    if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
        return Err(AnalysisError::Configuration(format!(
            "{ENDPOINT_VAR} must be an http(s) URL, got {endpoint}"
        )));
    }

    let mut key = HeaderValue::from_str(key.trim()).map_err(|_| {
        AnalysisError::Configuration(format!("{KEY_VAR} contains invalid characters"))
    })?;
    key.set_sensitive(true);

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| {
            AnalysisError::Configuration(format!("could not build HTTP client: {err}"))
        })?;

    Ok(DocumentIntelligenceClient {
        http,
        endpoint,
        key,
        api_version: config.api_version.clone(),
        poll_interval: config.poll_interval,
    })
}

impl DocumentIntelligenceClient {
    /// The endpoint we talk to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the URL used to submit a document for analysis.
    ///
    /// Markdown output is requested with `outputContentFormat=markdown`. For
    /// plain text we leave the parameter off and take the service default.
    pub fn analyze_url(
        &self,
        model_id: &str,
        output_format: ContentFormat,
    ) -> Result<Url, AnalysisError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                AnalysisError::Configuration(format!(
                    "cannot build request URL from {}",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .extend([
                "documentintelligence",
                "documentModels",
                format!("{model_id}:analyze").as_str(),
            ]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", &self.api_version);
            if output_format == ContentFormat::Markdown {
                query.append_pair("outputContentFormat", "markdown");
            }
        }
        Ok(url)
    }

    /// Submit a document for analysis, returning a handle to the running
    /// operation.
    #[instrument(level = "debug", skip_all, fields(model = %request.model_id))]
    pub async fn begin_analyze_document(
        &self,
        request: AnalyzeRequest,
    ) -> Result<AnalyzeOperation, AnalysisError> {
        let url = self.analyze_url(&request.model_id, request.output_format)?;
        debug!(%url, bytes = request.data.len(), "Submitting document");
        let response = self
            .http
            .post(url)
            .header(KEY_HEADER, self.key.clone())
            .header(CONTENT_TYPE, request.content_type)
            .body(request.data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(response).await.into());
        }

        let initial_delay = retry_after(response.headers());
        let location = response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .ok_or_else(|| {
                RemoteServiceError::InvalidResponse(format!(
                    "{status} response had no {OPERATION_LOCATION_HEADER} header"
                ))
            })?
            .to_str()
            .map_err(|_| {
                RemoteServiceError::InvalidResponse(format!(
                    "{OPERATION_LOCATION_HEADER} header is not valid text"
                ))
            })?;
        let operation_url = Url::parse(location).map_err(|err| {
            RemoteServiceError::InvalidResponse(format!(
                "{OPERATION_LOCATION_HEADER} is not a valid URL ({err}): {location:?}"
            ))
        })?;
        let operation = AnalyzeOperation::new(self.clone(), operation_url, initial_delay);
        debug!(operation = %operation.url(), ?initial_delay, "Analysis accepted");
        Ok(operation)
    }

    /// Send an authenticated `GET` to `url`.
    async fn get(&self, url: Url) -> Result<Response, AnalysisError> {
        Ok(self
            .http
            .get(url)
            .header(KEY_HEADER, self.key.clone())
            .send()
            .await?)
    }
}

/// The error document returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ServiceErrorDetail,
}

/// Error details, either from a rejected request or a failed operation.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceErrorDetail {
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

/// Convert an HTTP error response into a [`RemoteServiceError`].
async fn error_from_response(response: Response) -> RemoteServiceError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return RemoteServiceError::Transport(err),
    };
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(ErrorResponse { error }) => RemoteServiceError::Status {
            status,
            code: error.code,
            message: error.message.unwrap_or_else(|| body.clone()),
        },
        Err(_) if body.trim().is_empty() => RemoteServiceError::Status {
            status,
            code: None,
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_owned(),
        },
        Err(_) => RemoteServiceError::Status {
            status,
            code: None,
            message: body,
        },
    }
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
