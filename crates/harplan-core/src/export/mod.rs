//! Renderers for a merged [`TestPlan`].

pub mod markdown;
pub mod playwright;

use std::fmt;
use std::str::FromStr;

use crate::plan::TestPlan;

pub use markdown::to_markdown;
pub use playwright::to_playwright;

/// Output format for a finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Markdown,
    Playwright,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Playwright => "playwright",
        }
    }

    /// Conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
            Self::Playwright => "spec.ts",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "playwright" | "code" | "ts" => Ok(Self::Playwright),
            other => Err(format!(
                "unknown export format {other:?} (expected json, markdown, or playwright)"
            )),
        }
    }
}

/// Pretty-printed JSON of the plan, with a trailing newline.
pub fn to_json(plan: &TestPlan) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(plan)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Story;

    #[test]
    fn parses_format_names() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("Playwright".parse::<ExportFormat>().unwrap(), ExportFormat::Playwright);
        assert_eq!(ExportFormat::default(), ExportFormat::Json);
        assert!("docx".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let plan = TestPlan::from_stories(vec![Story {
            id: "S1".into(),
            ..Story::default()
        }]);
        let text = to_json(&plan).unwrap();
        assert!(text.contains("\"riskAssessment\""));
        assert!(text.contains("\"testCases\""));
        assert!(text.ends_with("}\n"));
        let back: TestPlan = serde_json::from_str(&text).unwrap();
        assert_eq!(back, plan);
    }
}
