use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::{config::ServiceConfig, prelude::*, ui::Ui};

mod analyze;
mod client;
mod cmd;
mod config;
mod error;
mod output;
mod prelude;
mod ui;

/// Convert PDFs and images to text or Markdown using Azure AI Document
/// Intelligence.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - AZURE_DOCUMENT_INTELLIGENCE_ENDPOINT: The service endpoint URL.
  - AZURE_DOCUMENT_INTELLIGENCE_KEY: The API key to use.
  - AZURE_DOCUMENT_INTELLIGENCE_API_VERSION (optional): Override the REST
    API version.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Analyze a single PDF or image and write the extracted text.
    Ocr(cmd::ocr::OcrOpts),
    /// Analyze several PDFs or images concurrently.
    Batch(cmd::batch::BatchOpts),
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);

    tracing_subscriber::registry().with(subscriber).init();

    // Call our real `main` function now that logging is set up.
    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    // Load environment variables from a `.env` file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Read our configuration once, and pass it down explicitly.
    let config = ServiceConfig::from_env();
    debug!(?config, "Loaded service configuration");

    match &opts.subcmd {
        Cmd::Ocr(opts) => cmd::ocr::cmd_ocr(ui, &config, opts).await?,
        Cmd::Batch(opts) => cmd::batch::cmd_batch(ui, &config, opts).await?,
    }
    Ok(())
}
