//! The `batch` subcommand.

use std::sync::Arc;

use clap::Args;
use futures::StreamExt as _;

use crate::{
    analyze::{AnalysisService, AnalyzeOpts},
    client::create_client,
    config::ServiceConfig,
    output::{default_output_path, default_output_path_in, write_text},
    prelude::*,
    ui::{ProgressConfig, Ui},
};

/// Options for the `batch` subcommand.
#[derive(Debug, Args)]
pub struct BatchOpts {
    /// The PDF or image files to analyze.
    #[clap(required = true)]
    pub input_paths: Vec<PathBuf>,

    /// Write results into this directory instead of next to each input.
    #[clap(long)]
    pub output_dir: Option<PathBuf>,

    /// Max number of documents to analyze at a time.
    #[clap(short = 'j', long = "jobs", default_value = "4")]
    pub job_count: usize,

    #[clap(flatten)]
    pub analyze_opts: AnalyzeOpts,
}

impl BatchOpts {
    /// Where should we write the result for `input`?
    fn output_path_for(&self, input: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => default_output_path_in(dir, input, self.analyze_opts.format),
            None => default_output_path(input, self.analyze_opts.format),
        }
    }
}

/// Run the `batch` subcommand.
///
/// All documents share a single client. Failures are reported per document,
/// and the command fails at the end if any document failed.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_batch(ui: Ui, config: &ServiceConfig, opts: &BatchOpts) -> Result<()> {
    let client: Arc<dyn AnalysisService> = Arc::new(create_client(config)?);

    if let Some(dir) = &opts.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let total = opts.input_paths.len();
    let pb = ui.new_progress_bar(
        &ProgressConfig {
            emoji: "📄",
            msg: "Analyzing documents",
            done_msg: "Analyzed documents",
        },
        total as u64,
    );

    let results = futures::stream::iter(&opts.input_paths)
        .map(|input| {
            let client = client.clone();
            async move {
                let result = analyze_one(client.as_ref(), input, opts).await;
                (input, result)
            }
        })
        .buffer_unordered(opts.job_count.max(1))
        .boxed();
    let mut results = pb.wrap_stream(results);

    let mut failures = 0;
    while let Some((input, result)) = results.next().await {
        match result {
            Ok(output_path) => {
                info!(
                    input = %input.display(),
                    output = %output_path.display(),
                    "Wrote output"
                );
            }
            Err(err) => {
                failures += 1;
                error!(input = %input.display(), "Failed: {err:?}");
            }
        }
    }

    if failures > 0 {
        Err(anyhow!("{failures} of {total} documents could not be processed"))
    } else {
        Ok(())
    }
}

/// Analyze a single document and write the result.
async fn analyze_one(
    client: &dyn AnalysisService,
    input: &Path,
    opts: &BatchOpts,
) -> Result<PathBuf> {
    let content = opts
        .analyze_opts
        .analyze(client, input)
        .await
        .with_context(|| format!("Failed to analyze {}", input.display()))?;
    let output_path = opts.output_path_for(input);
    write_text(&content, &output_path)
        .await
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    Ok(output_path)
}
