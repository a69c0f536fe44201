//! The `ocr` subcommand.

use clap::Args;

use crate::{
    analyze::AnalyzeOpts,
    client::create_client,
    config::ServiceConfig,
    output::{default_output_path, preview, write_text},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// How many characters of output to show with `--preview`.
const PREVIEW_CHARS: usize = 500;

/// Options for the `ocr` subcommand.
#[derive(Debug, Args)]
pub struct OcrOpts {
    /// The PDF or image file to analyze.
    pub input_path: PathBuf,

    /// Where to write the result. Defaults to `{stem}_ocr_output.txt` (or
    /// `{stem}_markdown.md` with `--format markdown`) next to the input.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    /// Print the beginning of the result to standard output.
    #[clap(long)]
    pub preview: bool,

    #[clap(flatten)]
    pub analyze_opts: AnalyzeOpts,
}

/// Run the `ocr` subcommand.
#[instrument(level = "debug", skip_all, fields(input = %opts.input_path.display()))]
pub async fn cmd_ocr(ui: Ui, config: &ServiceConfig, opts: &OcrOpts) -> Result<()> {
    // Check our credentials before doing anything else.
    let client = create_client(config)?;
    debug!(endpoint = %client.endpoint(), "Created client");

    let spinner = ui.new_spinner(&ProgressConfig {
        emoji: "📄",
        msg: "Analyzing document",
        done_msg: "Analyzed document",
    });
    let result = opts.analyze_opts.analyze(&client, &opts.input_path).await;
    match &result {
        Ok(_) => spinner.finish_using_style(),
        Err(_) => spinner.abandon_with_message("Analysis failed"),
    }
    let content = result
        .with_context(|| format!("Failed to analyze {}", opts.input_path.display()))?;

    let output_path = opts.output_path.clone().unwrap_or_else(|| {
        default_output_path(&opts.input_path, opts.analyze_opts.format)
    });
    write_text(&content, &output_path)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    ui.println(&format!("Output saved to: {}", output_path.display()));
    ui.println(&format!(
        "Content length: {} characters",
        content.chars().count()
    ));
    if opts.preview {
        ui.println(&format!("\n--- First {PREVIEW_CHARS} characters ---"));
        ui.println(&preview(&content, PREVIEW_CHARS));
    }
    Ok(())
}
