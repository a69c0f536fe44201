//! Analyze a local file and extract its text.

use std::time::Duration;

use clap::Args;
use tokio::time;

use crate::{
    client::{
        AnalyzeRequest, AnalyzeResult, ContentFormat, DocumentIntelligenceClient,
        LAYOUT_MODEL_ID,
    },
    error::AnalysisError,
    prelude::*,
};

/// The MIME type we assume when we can't tell what a file is.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Something which can analyze documents.
///
/// [`DocumentIntelligenceClient`] is the real implementation. One instance
/// may be shared between any number of concurrent tasks.
#[async_trait]
pub trait AnalysisService: Send + Sync + 'static {
    /// Submit a document and wait for the finished result.
    async fn analyze_document(
        &self,
        request: AnalyzeRequest,
    ) -> Result<AnalyzeResult, AnalysisError>;
}

#[async_trait]
impl AnalysisService for DocumentIntelligenceClient {
    async fn analyze_document(
        &self,
        request: AnalyzeRequest,
    ) -> Result<AnalyzeResult, AnalysisError> {
        self.begin_analyze_document(request).await?.wait().await
    }
}

/// A document loaded into memory.
#[derive(Debug)]
pub struct Document {
    /// The raw bytes.
    pub data: Vec<u8>,

    /// Our best guess at the MIME type.
    pub mime_type: String,
}

impl Document {
    /// Read a document from disk.
    pub async fn read(path: &Path) -> Result<Self, AnalysisError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|err| AnalysisError::io(path, err))?;
        let mime_type = guess_mime_type(path, &data);
        Ok(Self { data, mime_type })
    }

    /// Build a layout analysis request for this document.
    pub fn into_request(self, output_format: ContentFormat) -> AnalyzeRequest {
        AnalyzeRequest {
            model_id: LAYOUT_MODEL_ID.to_owned(),
            data: self.data,
            content_type: self.mime_type,
            output_format,
        }
    }
}

/// Guess a MIME type from the file extension, then from the contents, and
/// finally fall back to [`DEFAULT_MIME_TYPE`].
pub fn guess_mime_type(path: &Path, data: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_owned();
    }
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_owned();
    }
    DEFAULT_MIME_TYPE.to_owned()
}

/// Analyze the file at `path` using the layout model, and return the
/// extracted text. If `want_markdown` is set, ask for Markdown instead of
/// plain text.
///
/// The file is read completely before we contact the service, so a missing
/// file never causes network traffic. Service errors are returned as-is.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), want_markdown = want_markdown))]
pub async fn analyze(
    service: &dyn AnalysisService,
    path: &Path,
    want_markdown: bool,
) -> Result<String, AnalysisError> {
    let document = Document::read(path).await?;
    let output_format = if want_markdown {
        ContentFormat::Markdown
    } else {
        ContentFormat::Text
    };
    debug!(mime_type = %document.mime_type, "Guessed MIME type");
    info!(
        path = %path.display(),
        bytes = document.data.len(),
        "Submitting document for analysis"
    );

    let result = service
        .analyze_document(document.into_request(output_format))
        .await?;
    info!(
        path = %path.display(),
        chars = result.content.chars().count(),
        pages = result.pages.len(),
        model = result.model_id.as_deref().unwrap_or("unknown"),
        content_format = result.content_format.as_deref().unwrap_or("text"),
        "Analysis completed"
    );
    Ok(result.content)
}

/// Options controlling how we analyze documents.
#[derive(Args, Clone, Debug)]
pub struct AnalyzeOpts {
    /// The output format to request.
    #[clap(long, value_enum, default_value_t = ContentFormat::default())]
    pub format: ContentFormat,

    /// Give up on a document after this many seconds. By default, we wait as
    /// long as the service takes.
    #[clap(long)]
    pub timeout: Option<u64>,
}

impl AnalyzeOpts {
    /// Do we want Markdown output?
    pub fn wants_markdown(&self) -> bool {
        self.format == ContentFormat::Markdown
    }

    /// Analyze a single file, honoring our timeout.
    pub async fn analyze(
        &self,
        service: &dyn AnalysisService,
        path: &Path,
    ) -> Result<String, AnalysisError> {
        self.apply_timeout(analyze(service, path, self.wants_markdown()))
            .await
    }

    /// Apply our timeout, if any, to a future.
    pub async fn apply_timeout<T>(
        &self,
        future: impl Future<Output = Result<T, AnalysisError>>,
    ) -> Result<T, AnalysisError> {
        match self.timeout {
            Some(timeout) => {
                let timeout = Duration::from_secs(timeout);
                time::timeout(timeout, future)
                    .await
                    // Flatten `Result<Result<T, AnalysisError>, Elapsed>`.
                    .unwrap_or_else(|_| Err(AnalysisError::Timeout(timeout)))
            }
            None => future.await,
        }
    }
}
