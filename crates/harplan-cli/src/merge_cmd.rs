//! `harplan merge <partial.json>...` -- run the merger offline over saved
//! partial artifacts.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::debug;

use harplan_core::export::ExportFormat;
use harplan_core::generate::decode_reply;
use harplan_core::merge;
use harplan_core::plan::{ArtifactKind, PartialArtifact};

use crate::generate_cmd::load_tuning;
use crate::output;

pub struct MergeArgs {
    pub files: Vec<PathBuf>,
    /// How each file is read: `testPlan` files are whole plans, other kinds
    /// contribute only their stories.
    pub kind: ArtifactKind,
    pub export: ExportFormat,
    pub output: Option<PathBuf>,
    pub tuning: Option<PathBuf>,
}

pub fn run_merge(args: &MergeArgs) -> Result<()> {
    if args.files.is_empty() {
        bail!("nothing to merge: pass at least one partial artifact file");
    }

    let partials = load_partials(&args.files, args.kind)?;
    let fuzzy = load_tuning(args.tuning.as_deref())?;
    let plan = merge::merge_with(&partials, &fuzzy).context(
        "merged result has no stories; check that the inputs are test plan or story JSON",
    )?;

    eprintln!(
        "Merged {} file(s) into {} story(ies) with {} test case(s)",
        partials.len(),
        plan.stories.len(),
        plan.test_case_count(),
    );

    let text = output::render(&plan, args.kind, args.export)?;
    let path = args
        .output
        .as_deref()
        .map(|p| output::output_path(p, args.kind, args.export));
    output::emit(&text, path.as_deref())
}

fn load_partials(files: &[PathBuf], kind: ArtifactKind) -> Result<Vec<PartialArtifact>> {
    files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read partial file: {}", path.display()))?;
            let partial = decode_reply(kind, &text)
                .with_context(|| format!("invalid partial artifact: {}", path.display()))?;
            debug!(file = %path.display(), stories = partial.stories.len(), "loaded partial");
            Ok(partial)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &tempfile::TempDir, name: &str, value: serde_json::Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn merges_partials_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = write(
            &tmp,
            "a.json",
            json!({ "title": "API", "stories": [{ "id": "S1", "testCases": [{ "id": "TC1" }] }] }),
        );
        let b = write(
            &tmp,
            "b.json",
            json!({ "stories": [{ "id": "S1", "testCases": [{ "id": "TC2" }] }, { "id": "S2" }] }),
        );
        let out = tmp.path().join("merged.json");

        run_merge(&MergeArgs {
            files: vec![a, b],
            kind: ArtifactKind::TestPlan,
            export: ExportFormat::Json,
            output: Some(out.clone()),
            tuning: None,
        })
        .unwrap();

        let merged: harplan_core::TestPlan =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(merged.title, "API");
        assert_eq!(merged.stories.len(), 2);
        assert_eq!(merged.test_case_count(), 2);
    }

    #[test]
    fn directory_output_gets_a_named_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = write(&tmp, "a.json", json!([{ "id": "S1", "title": "Orders" }]));
        let out_dir = tmp.path().join("out");
        std::fs::create_dir(&out_dir).unwrap();

        run_merge(&MergeArgs {
            files: vec![a],
            kind: ArtifactKind::TestScenario,
            export: ExportFormat::Markdown,
            output: Some(out_dir.clone()),
            tuning: None,
        })
        .unwrap();

        let md = std::fs::read_to_string(out_dir.join("testScenario.md")).unwrap();
        assert!(md.starts_with("# Test Scenario: Orders"));
    }

    #[test]
    fn stories_only_kind_accepts_bare_arrays() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = write(&tmp, "a.json", json!([{ "id": "S1" }, { "id": "S2" }]));
        let partials = load_partials(&[a], ArtifactKind::TestScenario).unwrap();
        assert_eq!(partials[0].stories.len(), 2);
    }

    #[test]
    fn invalid_file_is_reported_by_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        let err = load_partials(&[bad], ArtifactKind::TestPlan).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn storyless_inputs_fail() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = write(&tmp, "a.json", json!({ "title": "empty" }));
        let err = run_merge(&MergeArgs {
            files: vec![a],
            kind: ArtifactKind::TestPlan,
            export: ExportFormat::Json,
            output: Some(tmp.path().join("out.json")),
            tuning: None,
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("no valid endpoints"));
    }
}
