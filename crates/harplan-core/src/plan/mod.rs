//! Test plan data model: the merged artifact and its per-batch fragments.
//!
//! Field names serialize in camelCase to match the JSON schema the model is
//! asked to follow. Every collection defaults to empty, so a decoded partial
//! never has an undefined section.

pub mod lenient;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Artifact kinds
// ---------------------------------------------------------------------------

/// The kind of artifact a generation run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    TestPlan,
    TestScenario,
    TestCases,
    Code,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::TestPlan,
        ArtifactKind::TestScenario,
        ArtifactKind::TestCases,
        ArtifactKind::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TestPlan => "testPlan",
            Self::TestScenario => "testScenario",
            Self::TestCases => "testCases",
            Self::Code => "code",
        }
    }

    /// Whether replies for this kind carry only a `stories` fragment rather
    /// than a full test plan.
    pub fn is_stories_only(&self) -> bool {
        !matches!(self, Self::TestPlan)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "testplan" | "plan" => Ok(Self::TestPlan),
            "testscenario" | "scenario" | "scenarios" => Ok(Self::TestScenario),
            "testcases" | "cases" => Ok(Self::TestCases),
            "code" => Ok(Self::Code),
            other => Err(format!(
                "unknown artifact type {other:?} (expected testPlan, testScenario, testCases, or code)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Stories and test cases
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Story {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::seq")]
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestCase {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string_list")]
    pub steps: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub expected_result: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub api_details: ApiDetails,
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub severity: Option<String>,
    #[serde(
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<u32>,
    #[serde(
        deserialize_with = "lenient::opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub req_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiDetails {
    #[serde(deserialize_with = "lenient::string")]
    pub method: String,
    #[serde(deserialize_with = "lenient::string")]
    pub endpoint: String,
    #[serde(deserialize_with = "lenient::string_map")]
    pub headers: BTreeMap<String, String>,
    #[serde(deserialize_with = "lenient::string")]
    pub body: String,
    #[serde(
        deserialize_with = "lenient::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_status: Option<u32>,
}

// ---------------------------------------------------------------------------
// Auxiliary sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskItem {
    #[serde(deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string")]
    pub mitigation: String,
    #[serde(deserialize_with = "lenient::string")]
    pub impact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Deliverable {
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string")]
    pub format: String,
    #[serde(deserialize_with = "lenient::string")]
    pub frequency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessCriterion {
    #[serde(deserialize_with = "lenient::string")]
    pub category: String,
    #[serde(deserialize_with = "lenient::string")]
    pub criteria: String,
    #[serde(deserialize_with = "lenient::string")]
    pub threshold: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAssignment {
    #[serde(deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(deserialize_with = "lenient::string")]
    pub responsibility: String,
}

/// A free-text entry (entry/exit criteria, schedule, strategy sections).
///
/// Models sometimes emit these as bare strings instead of
/// `{"description": ...}` objects; both forms are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DescribedRepr")]
pub struct Described {
    pub description: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescribedRepr {
    Text(String),
    Object {
        #[serde(default, deserialize_with = "lenient::string")]
        description: String,
    },
}

impl From<DescribedRepr> for Described {
    fn from(repr: DescribedRepr) -> Self {
        match repr {
            DescribedRepr::Text(description) | DescribedRepr::Object { description } => {
                Self { description }
            }
        }
    }
}

impl Described {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Approval {
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub approver: String,
    #[serde(deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestItem {
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string")]
    pub endpoint: String,
    #[serde(deserialize_with = "lenient::string")]
    pub method: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Staffing {
    #[serde(deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(deserialize_with = "lenient::string_list")]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentRequirements {
    #[serde(deserialize_with = "lenient::string_list")]
    pub hardware: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub software: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub network: String,
}

impl EnvironmentRequirements {
    pub fn is_empty(&self) -> bool {
        self.hardware.is_empty() && self.software.is_empty() && self.network.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// TestPlan
// ---------------------------------------------------------------------------

/// The root artifact: either one batch's decoded reply or the merged result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestPlan {
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::seq")]
    pub stories: Vec<Story>,
    #[serde(deserialize_with = "lenient::seq")]
    pub risk_assessment: Vec<RiskItem>,
    #[serde(deserialize_with = "lenient::seq")]
    pub deliverables: Vec<Deliverable>,
    #[serde(deserialize_with = "lenient::seq")]
    pub success_criteria: Vec<SuccessCriterion>,
    #[serde(deserialize_with = "lenient::seq")]
    pub roles_and_responsibility: Vec<RoleAssignment>,
    #[serde(deserialize_with = "lenient::seq")]
    pub exit_criteria: Vec<Described>,
    #[serde(deserialize_with = "lenient::seq")]
    pub test_execution_strategy: Vec<Described>,
    #[serde(deserialize_with = "lenient::seq")]
    pub entry_criteria: Vec<Described>,
    #[serde(deserialize_with = "lenient::seq")]
    pub test_schedule: Vec<Described>,
    #[serde(deserialize_with = "lenient::seq")]
    pub tools_and_automation_strategy: Vec<Described>,
    #[serde(deserialize_with = "lenient::seq")]
    pub approvals_and_signoffs: Vec<Approval>,
    #[serde(deserialize_with = "lenient::seq")]
    pub references: Vec<Reference>,
    #[serde(deserialize_with = "lenient::seq")]
    pub test_items: Vec<TestItem>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub features_to_be_tested: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub features_not_to_be_tested: Vec<String>,
    #[serde(deserialize_with = "lenient::seq")]
    pub staffing_and_training: Vec<Staffing>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub pass_criteria: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub fail_criteria: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub suspension_criteria: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub environment_requirements: EnvironmentRequirements,
    #[serde(deserialize_with = "lenient::string_list")]
    pub test_data_requirements: Vec<String>,
    #[serde(deserialize_with = "lenient::list_map")]
    pub traceability_matrix: BTreeMap<String, Vec<String>>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub negative_scenarios: Vec<String>,
}

/// One batch's decoded reply, prior to merging.
///
/// Shares the [`TestPlan`] shape; sections the batch did not produce are
/// empty.
pub type PartialArtifact = TestPlan;

impl TestPlan {
    /// Wrap a list of stories into a plan shell with empty auxiliary
    /// sections.
    pub fn from_stories(stories: Vec<Story>) -> Self {
        Self {
            stories,
            ..Self::default()
        }
    }

    /// Whether no story and no auxiliary section carries content.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Total number of test cases across all stories.
    pub fn test_case_count(&self) -> usize {
        self.stories.iter().map(|s| s.test_cases.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
