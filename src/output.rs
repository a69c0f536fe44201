//! Writing analysis results to disk.

use crate::{client::ContentFormat, error::AnalysisError, prelude::*};

/// Write `content` to `path` as UTF-8, replacing anything already there.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_text(content: &str, path: &Path) -> Result<(), AnalysisError> {
    tokio::fs::write(path, content.as_bytes())
        .await
        .map_err(|err| AnalysisError::io(path, err))?;
    debug!(bytes = content.len(), "Wrote output");
    Ok(())
}

/// Where to write results for `input` if the user doesn't say.
///
/// Plain text goes to `{stem}_ocr_output.txt` and Markdown to
/// `{stem}_markdown.md`, next to the input.
pub fn default_output_path(input: &Path, format: ContentFormat) -> PathBuf {
    default_output_path_in(input.parent().unwrap_or(Path::new("")), input, format)
}

/// Like [`default_output_path`], but inside `dir`.
pub fn default_output_path_in(dir: &Path, input: &Path, format: ContentFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    let name = match format {
        ContentFormat::Text => format!("{stem}_ocr_output.txt"),
        ContentFormat::Markdown => format!("{stem}_markdown.md"),
    };
    dir.join(name)
}

/// The first `max_chars` characters of `content`, with `...` appended if we
/// cut anything off.
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_owned(),
    }
}
