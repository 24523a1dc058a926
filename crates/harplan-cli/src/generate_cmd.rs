//! `harplan generate <file>` -- the full pipeline.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use harplan_core::export::ExportFormat;
use harplan_core::generate::{self, GenerateOptions, GenerationReport};
use harplan_core::merge::FuzzyConfig;
use harplan_core::plan::ArtifactKind;
use harplan_core::provider::{ChatClient, OpenAiClient};
use harplan_core::traffic::{SourceFormat, TrafficRecord};
use harplan_core::PipelineError;

use crate::config::HarplanConfig;
use crate::{output, parse_cmd};

pub struct GenerateArgs {
    pub file: PathBuf,
    pub format: Option<SourceFormat>,
    pub kind: ArtifactKind,
    pub export: ExportFormat,
    pub output: Option<PathBuf>,
    pub tuning: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

pub async fn run_generate(args: &GenerateArgs, config: &HarplanConfig) -> Result<()> {
    let records = parse_cmd::load_records(&args.file, args.format)?;
    eprintln!(
        "Parsed {} API request(s) from {}",
        records.len(),
        args.file.display()
    );

    let fuzzy = load_tuning(args.tuning.as_deref())?;
    let client = OpenAiClient::new(config.provider.clone())
        .context("failed to create provider client")?;

    let report = generate_report(&client, &records, args.kind, config, fuzzy)
        .await
        .map_err(|e| explain(e, &args.file))?;

    eprintln!(
        "Generated {} story(ies) with {} test case(s); {} of {} batch(es) skipped",
        report.plan.stories.len(),
        report.plan.test_case_count(),
        report.skipped(),
        report.outcomes.len(),
    );

    let text = output::render(&report.plan, args.kind, args.export)?;
    let path = args
        .output
        .as_deref()
        .map(|p| output::output_path(p, args.kind, args.export));
    output::emit(&text, path.as_deref())
}

/// Run generation over already-normalized records, printing progress to
/// stderr.
pub async fn generate_report(
    client: &dyn ChatClient,
    records: &[TrafficRecord],
    kind: ArtifactKind,
    config: &HarplanConfig,
    fuzzy: FuzzyConfig,
) -> Result<GenerationReport, PipelineError> {
    let options = GenerateOptions {
        kind,
        policy: config.batch.policy(config.provider.family(), kind),
        max_tokens: config.provider.token_size,
        fuzzy,
    };

    let interactive = std::io::stderr().is_terminal();
    let mut on_progress = |percent: u8| {
        let mut err = std::io::stderr().lock();
        if interactive {
            let _ = write!(err, "\rGenerating {kind}... {percent:>3}%");
            if percent == 100 {
                let _ = writeln!(err);
            }
        } else {
            let _ = writeln!(err, "progress: {percent}%");
        }
    };

    generate::generate_with_report(client, records, &options, Some(&mut on_progress)).await
}

/// Read a fuzzy-tuning override file, or fall back to the embedded tuning.
pub fn load_tuning(path: Option<&Path>) -> Result<FuzzyConfig> {
    let Some(path) = path else {
        return Ok(FuzzyConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read tuning file: {}", path.display()))?;
    FuzzyConfig::from_toml_str(&text)
        .with_context(|| format!("failed to parse tuning file: {}", path.display()))
}

/// Attach an actionable hint to pipeline errors.
fn explain(err: PipelineError, file: &Path) -> anyhow::Error {
    match err {
        PipelineError::NoEndpoints => anyhow!(
            "no valid endpoints in {}: every request was filtered out \
             (static assets, analytics hosts or unsupported methods)",
            file.display()
        ),
        PipelineError::GenerationFailed { .. } => anyhow::Error::new(err).context(
            "check the provider settings with `harplan ping`; rerun with RUST_LOG=debug for details",
        ),
        PipelineError::Format(_) => anyhow::Error::new(err),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use harplan_core::batch::BatchConfig;
    use harplan_core::provider::{ProviderConfig, ProviderError};
    use harplan_test_utils::{HarBuilder, ScriptedClient, stories_reply};

    fn config(model: &str) -> HarplanConfig {
        HarplanConfig {
            provider: ProviderConfig {
                model: model.into(),
                ..ProviderConfig::default()
            },
            batch: BatchConfig {
                batch_size: 1,
                ..BatchConfig::default()
            },
        }
    }

    fn records(n: usize) -> Vec<TrafficRecord> {
        let mut har = HarBuilder::new();
        for i in 0..n {
            har = har.entry("GET", &format!("https://api.example.com/api/items/{i}"));
        }
        harplan_core::traffic::normalize(&har.to_bytes(), None).unwrap()
    }

    #[tokio::test]
    async fn reasoning_models_batch_by_configured_size() {
        let client = ScriptedClient::replying([
            stories_reply(&[("S1", "TC1")]),
            stories_reply(&[("S2", "TC2")]),
        ]);
        let report = generate_report(
            &client,
            &records(2),
            ArtifactKind::TestCases,
            &config("o1-mini"),
            FuzzyConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(client.requests().len(), 2);
        assert_eq!(report.plan.stories.len(), 2);
    }

    #[tokio::test]
    async fn chat_models_batch_by_token_budget() {
        let client = ScriptedClient::replying([stories_reply(&[("S1", "TC1")])]);
        generate_report(
            &client,
            &records(3),
            ArtifactKind::TestCases,
            &config("gpt-4o"),
            FuzzyConfig::default(),
        )
        .await
        .unwrap();

        // 4096 / 1000 tokens per endpoint fits all three records.
        assert_eq!(client.requests().len(), 1);
        assert_eq!(client.requests()[0].max_tokens, 4096);
    }

    #[tokio::test]
    async fn all_failures_surface_generation_failed() {
        let client = ScriptedClient::new(vec![Err(ProviderError::InvalidKey)]);
        let err = generate_report(
            &client,
            &records(1),
            ArtifactKind::TestPlan,
            &config("gpt-4o"),
            FuzzyConfig::default(),
        )
        .await
        .unwrap_err();

        let msg = format!("{:#}", explain(err, Path::new("capture.har")));
        assert!(msg.contains("harplan ping"), "unexpected: {msg}");
        assert!(msg.contains("generation failed"), "unexpected: {msg}");
    }

    #[test]
    fn no_endpoints_hint_names_the_file() {
        let msg = explain(PipelineError::NoEndpoints, Path::new("site.har")).to_string();
        assert!(msg.contains("site.har"));
        assert!(msg.contains("no valid endpoints"));
    }

    #[test]
    fn tuning_file_overrides_threshold() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("tuning.toml");
        std::fs::write(&path, "threshold = 0.9\n").unwrap();

        let tuning = load_tuning(Some(&path)).unwrap();
        assert!((tuning.threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(load_tuning(None).unwrap(), FuzzyConfig::default());

        std::fs::write(&path, "threshold = \"high\"\n").unwrap();
        assert!(load_tuning(Some(&path)).is_err());
    }
}
