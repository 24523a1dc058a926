//! Rendering and writing finished artifacts.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use harplan_core::export::{self, ExportFormat};
use harplan_core::plan::{ArtifactKind, TestPlan};

/// Render `plan` in the requested format.
pub fn render(plan: &TestPlan, kind: ArtifactKind, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => export::to_json(plan).context("failed to serialize plan"),
        ExportFormat::Markdown => {
            export::to_markdown(plan, kind).context("failed to render markdown")
        }
        ExportFormat::Playwright => {
            export::to_playwright(plan).context("failed to render playwright tests")
        }
    }
}

/// Where to write the artifact. An existing directory gets a file named
/// after the artifact kind, e.g. `testPlan.md`.
pub fn output_path(path: &Path, kind: ArtifactKind, format: ExportFormat) -> PathBuf {
    if path.is_dir() {
        path.join(format!("{kind}.{}", format.extension()))
    } else {
        path.to_path_buf()
    }
}

/// Write `text` to `path`, or to stdout when no path is given.
pub fn emit(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create directory {}", parent.display()))?;
            }
            std::fs::write(path, text)
                .with_context(|| format!("cannot write output file: {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .context("failed to write to stdout")?;
            stdout.flush().context("failed to write to stdout")?;
        }
    }
    Ok(())
}
