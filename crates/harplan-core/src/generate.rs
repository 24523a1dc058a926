//! Generation driver: one model call per batch, then merge.
//!
//! Batches run strictly one after another. Each batch moves through
//! `Pending -> Requested -> {Parsed | ParseFailed | RequestFailed}`; failed
//! batches are logged and skipped without retry. Progress is reported as
//! an integer percentage after every batch, starting at 0 and ending at 100.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::batch::{self, GenerationBatch, SizePolicy};
use crate::error::PipelineError;
use crate::merge::{self, FuzzyConfig};
use crate::plan::{ArtifactKind, PartialArtifact, Story, TestPlan};
use crate::prompt::{self, SYSTEM_MESSAGE};
use crate::provider::{ChatClient, ChatMessage, ChatRequest};
use crate::traffic::TrafficRecord;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a model reply could not be used.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("reply does not match the expected schema: {0}")]
    Schema(String),
}

/// Lifecycle of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Requested,
    Parsed,
    ParseFailed,
    RequestFailed,
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub index: usize,
    pub endpoints: usize,
    pub state: BatchState,
    /// Failure reason for skipped batches.
    pub error: Option<String>,
}

/// The merged plan plus a per-batch account of the run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub plan: TestPlan,
    pub outcomes: Vec<BatchOutcome>,
}

impl GenerationReport {
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state != BatchState::Parsed)
            .count()
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub kind: ArtifactKind,
    pub policy: SizePolicy,
    /// Output token limit sent with every request.
    pub max_tokens: u32,
    pub fuzzy: FuzzyConfig,
}

impl GenerateOptions {
    pub fn new(kind: ArtifactKind, policy: SizePolicy) -> Self {
        Self {
            kind,
            policy,
            max_tokens: 4096,
            fuzzy: FuzzyConfig::default(),
        }
    }
}

/// Progress sink, called with a percentage in `0..=100`.
pub type Progress<'a> = &'a mut (dyn FnMut(u8) + Send);

// ---------------------------------------------------------------------------
// Reply decoding
// ---------------------------------------------------------------------------

/// Decode one model reply into a partial artifact.
///
/// `testPlan` replies must be a JSON object and are read as a whole plan.
/// Other kinds only contribute stories, taken from `{"stories": [...]}`,
/// from a bare array whose first element holds `stories`, or from a bare
/// array of stories. Every story and test case needs an id or a title.
pub fn decode_reply(kind: ArtifactKind, text: &str) -> Result<PartialArtifact, DecodeError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))?;

    let partial = if kind.is_stories_only() {
        let stories = extract_stories(&value)
            .ok_or_else(|| DecodeError::Schema("no stories array in reply".into()))?;
        let stories: Vec<Story> = serde_json::from_value(Value::Array(stories.clone()))
            .map_err(|e| DecodeError::Schema(e.to_string()))?;
        TestPlan::from_stories(stories)
    } else {
        let Value::Object(map) = &value else {
            return Err(DecodeError::Schema("test plan reply is not a JSON object".into()));
        };
        match map.get("stories") {
            None | Some(Value::Null | Value::Array(_)) => {}
            Some(_) => return Err(DecodeError::Schema("stories is not an array".into())),
        }
        serde_json::from_value(value).map_err(|e| DecodeError::Schema(e.to_string()))?
    };

    validate(&partial)?;
    Ok(partial)
}

fn extract_stories(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Object(map) => map.get("stories").and_then(Value::as_array),
        Value::Array(items) => match items.first().and_then(|first| first.get("stories")) {
            Some(nested) => nested.as_array(),
            None => Some(items),
        },
        _ => None,
    }
}

fn validate(partial: &PartialArtifact) -> Result<(), DecodeError> {
    let labelled = |id: &str, title: &str| !id.trim().is_empty() || !title.trim().is_empty();
    for (i, story) in partial.stories.iter().enumerate() {
        if !labelled(&story.id, &story.title) {
            return Err(DecodeError::Schema(format!("story {i} has neither id nor title")));
        }
        for (j, tc) in story.test_cases.iter().enumerate() {
            if !labelled(&tc.id, &tc.title) {
                return Err(DecodeError::Schema(format!(
                    "test case {j} of story {i} has neither id nor title"
                )));
            }
        }
    }
    Ok(())
}

/// Drop a surrounding Markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run the pipeline over `records` and return the merged plan.
pub async fn generate(
    client: &dyn ChatClient,
    records: &[TrafficRecord],
    options: &GenerateOptions,
    on_progress: Option<Progress<'_>>,
) -> Result<TestPlan, PipelineError> {
    generate_with_report(client, records, options, on_progress)
        .await
        .map(|report| report.plan)
}

/// Like [`generate`], also returning the per-batch outcomes.
///
/// Fails with [`PipelineError::NoEndpoints`] when `records` is empty (no
/// progress is reported in that case), and with
/// [`PipelineError::GenerationFailed`] when no batch produced a usable
/// partial or the merged plan has no stories.
pub async fn generate_with_report(
    client: &dyn ChatClient,
    records: &[TrafficRecord],
    options: &GenerateOptions,
    mut on_progress: Option<Progress<'_>>,
) -> Result<GenerationReport, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::NoEndpoints);
    }

    let batches = batch::batch(records, options.policy);
    let total = batches.len();
    info!(
        provider = client.name(),
        kind = %options.kind,
        endpoints = records.len(),
        batches = total,
        "starting generation"
    );

    let mut report_progress = |percent: u8| {
        if let Some(cb) = on_progress.as_deref_mut() {
            cb(percent);
        }
    };
    report_progress(0);

    let mut partials = Vec::new();
    let mut outcomes = Vec::with_capacity(total);
    for batch in &batches {
        let (outcome, partial) = run_batch(client, batch, total, options).await;
        partials.extend(partial);
        outcomes.push(outcome);
        report_progress(percent_done(batch.index + 1, total));
    }
    report_progress(100);

    if partials.is_empty() {
        warn!(batches = total, "every batch failed");
        return Err(PipelineError::GenerationFailed { batches: total });
    }

    let plan = match merge::merge_with(&partials, &options.fuzzy) {
        Ok(plan) => plan,
        Err(PipelineError::NoEndpoints) => {
            warn!(batches = total, "no batch produced a story");
            return Err(PipelineError::GenerationFailed { batches: total });
        }
        Err(e) => return Err(e),
    };
    Ok(GenerationReport { plan, outcomes })
}

async fn run_batch(
    client: &dyn ChatClient,
    batch: &GenerationBatch,
    total: usize,
    options: &GenerateOptions,
) -> (BatchOutcome, Option<PartialArtifact>) {
    let mut outcome = BatchOutcome {
        index: batch.index,
        endpoints: batch.len(),
        state: BatchState::Pending,
        error: None,
    };

    let user_prompt = prompt::build_prompt(options.kind, batch);
    debug!(
        batch = batch.index + 1,
        estimated_tokens = batch::estimate_tokens(&user_prompt),
        "built prompt"
    );
    let request = ChatRequest {
        messages: vec![ChatMessage::system(SYSTEM_MESSAGE), ChatMessage::user(user_prompt)],
        max_tokens: options.max_tokens,
        json_response: true,
    };

    outcome.state = BatchState::Requested;
    info!(batch = batch.index + 1, total, endpoints = batch.len(), "requesting batch");

    let reply = match client.complete(&request).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(batch = batch.index + 1, error = %e, "batch request failed, skipping");
            outcome.state = BatchState::RequestFailed;
            outcome.error = Some(e.to_string());
            return (outcome, None);
        }
    };

    let decoded = {
        let _span = info_span!("batch", batch = batch.index + 1).entered();
        decode_reply(options.kind, &reply).and_then(|partial| {
            if options.kind.is_stories_only() && partial.stories.is_empty() {
                Err(DecodeError::Schema("reply contains no stories".into()))
            } else if partial.is_empty() {
                Err(DecodeError::Schema("reply is an empty test plan".into()))
            } else {
                Ok(partial)
            }
        })
    };

    match decoded {
        Ok(partial) => {
            info!(
                batch = batch.index + 1,
                stories = partial.stories.len(),
                test_cases = partial.test_case_count(),
                "batch parsed"
            );
            outcome.state = BatchState::Parsed;
            (outcome, Some(partial))
        }
        Err(e) => {
            warn!(batch = batch.index + 1, error = %e, "unusable batch reply, skipping");
            outcome.state = BatchState::ParseFailed;
            outcome.error = Some(e.to_string());
            (outcome, None)
        }
    }
}

/// `floor(done / total * 100)`.
fn percent_done(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from((done * 100 / total).min(100)).unwrap_or(100)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stories_object() {
        let partial = decode_reply(
            ArtifactKind::TestCases,
            r#"{"stories": [{"id": "S1", "testCases": [{"id": "TC1"}]}]}"#,
        )
        .unwrap();
        assert_eq!(partial.stories.len(), 1);
        assert_eq!(partial.test_case_count(), 1);
        assert!(partial.risk_assessment.is_empty());
    }

    #[test]
    fn decodes_bare_and_nested_arrays() {
        let bare = decode_reply(ArtifactKind::TestScenario, r#"[{"id": "S1"}, {"title": "S2"}]"#)
            .unwrap();
        assert_eq!(bare.stories.len(), 2);

        let nested =
            decode_reply(ArtifactKind::TestScenario, r#"[{"stories": [{"id": "S1"}]}]"#).unwrap();
        assert_eq!(nested.stories.len(), 1);
    }

    #[test]
    fn stories_only_kinds_ignore_plan_sections() {
        let partial = decode_reply(
            ArtifactKind::TestCases,
            r#"{"stories": [{"id": "S1"}], "riskAssessment": [{"category": "x"}]}"#,
        )
        .unwrap();
        assert!(partial.risk_assessment.is_empty());
    }

    #[test]
    fn decodes_full_plan() {
        let partial = decode_reply(
            ArtifactKind::TestPlan,
            r#"{"title": "T", "stories": [{"id": "S1"}], "riskAssessment": [{"category": "Auth"}]}"#,
        )
        .unwrap();
        assert_eq!(partial.title, "T");
        assert_eq!(partial.risk_assessment.len(), 1);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            decode_reply(ArtifactKind::TestPlan, "not json"),
            Err(DecodeError::Parse(_))
        ));
    }

    #[test]
    fn wrong_shapes_are_schema_errors() {
        assert!(matches!(
            decode_reply(ArtifactKind::TestPlan, "[1, 2]"),
            Err(DecodeError::Schema(_))
        ));
        assert!(matches!(
            decode_reply(ArtifactKind::TestPlan, r#"{"stories": "none"}"#),
            Err(DecodeError::Schema(_))
        ));
        assert!(matches!(
            decode_reply(ArtifactKind::TestCases, r#"{"cases": []}"#),
            Err(DecodeError::Schema(_))
        ));
        assert!(matches!(
            decode_reply(ArtifactKind::TestCases, r#"{"stories": [{"description": "anon"}]}"#),
            Err(DecodeError::Schema(_))
        ));
        assert!(matches!(
            decode_reply(
                ArtifactKind::TestCases,
                r#"{"stories": [{"id": "S1", "testCases": [{"steps": ["x"]}]}]}"#
            ),
            Err(DecodeError::Schema(_))
        ));
    }

    #[test]
    fn strips_markdown_fences() {
        let partial = decode_reply(
            ArtifactKind::TestCases,
            "```json\n{\"stories\": [{\"id\": \"S1\"}]}\n```",
        )
        .unwrap();
        assert_eq!(partial.stories.len(), 1);
        assert_eq!(strip_code_fence("  {}  "), "{}");
    }

    #[test]
    fn percent_is_floored() {
        assert_eq!(percent_done(1, 3), 33);
        assert_eq!(percent_done(2, 3), 66);
        assert_eq!(percent_done(3, 3), 100);
        assert_eq!(percent_done(0, 0), 100);
    }
}
