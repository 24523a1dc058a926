//! Merging per-batch partial artifacts into one test plan.
//!
//! Merging runs in phases:
//! 1. Union: every list section of every partial is concatenated in batch
//!    order; traceability entries are unioned per requirement id.
//! 2. Exact dedup of stories and test cases by normalized id (or title).
//!    A duplicate story's test cases fold into the first occurrence.
//! 3. Fuzzy grouping of sections without a hard key (risks, deliverables,
//!    criteria, roles, staffing, approvals, schedules, strategies). Text
//!    fields of a group are collected and re-joined as bullet lines.
//! 4. Set union of plain string lists.
//! 5. Deterministic ordering of every collection by its normalized key.
//!
//! The merge is a pure, synchronous computation.

pub mod group;
pub mod normalize;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::info;

use crate::error::PipelineError;
use crate::plan::{
    Approval, Deliverable, Described, PartialArtifact, Reference, RiskItem, RoleAssignment,
    Staffing, Story, SuccessCriterion, TestCase, TestItem, TestPlan,
};

pub use group::{Bullets, FuzzyGroups};
pub use normalize::{FuzzyConfig, levenshtein, similarity};

/// Number of leading words of a description used as a fallback group key
/// for deliverables and success criteria.
const DESCRIPTION_KEY_WORDS: usize = 6;
/// Same, for role responsibilities.
const RESPONSIBILITY_KEY_WORDS: usize = 4;

/// Merge partials using the embedded fuzzy tuning.
pub fn merge(partials: &[PartialArtifact]) -> Result<TestPlan, PipelineError> {
    merge_with(partials, &FuzzyConfig::default())
}

/// Merge partials into one plan.
///
/// Fails with [`PipelineError::NoEndpoints`] when there are no partials or
/// when the merged plan has no stories.
pub fn merge_with(
    partials: &[PartialArtifact],
    config: &FuzzyConfig,
) -> Result<TestPlan, PipelineError> {
    if partials.is_empty() {
        return Err(PipelineError::NoEndpoints);
    }

    let union = concat_sections(partials);
    let merger = Merger { config };

    let plan = TestPlan {
        title: union.title,
        description: union.description,
        stories: merger.stories(union.stories),
        risk_assessment: merger.risks(union.risk_assessment),
        deliverables: merger.deliverables(union.deliverables),
        success_criteria: merger.success_criteria(union.success_criteria),
        roles_and_responsibility: merger.roles(union.roles_and_responsibility),
        exit_criteria: merger.described(union.exit_criteria),
        test_execution_strategy: merger.described(union.test_execution_strategy),
        entry_criteria: merger.described(union.entry_criteria),
        test_schedule: merger.described(union.test_schedule),
        tools_and_automation_strategy: merger.described(union.tools_and_automation_strategy),
        approvals_and_signoffs: merger.approvals(union.approvals_and_signoffs),
        references: merger.references(union.references),
        test_items: merger.test_items(union.test_items),
        features_to_be_tested: string_set(union.features_to_be_tested),
        features_not_to_be_tested: string_set(union.features_not_to_be_tested),
        staffing_and_training: merger.staffing(union.staffing_and_training),
        pass_criteria: string_set(union.pass_criteria),
        fail_criteria: string_set(union.fail_criteria),
        suspension_criteria: string_set(union.suspension_criteria),
        environment_requirements: union.environment_requirements,
        test_data_requirements: string_set(union.test_data_requirements),
        traceability_matrix: traceability(union.traceability_matrix),
        negative_scenarios: string_set(union.negative_scenarios),
    };

    if plan.stories.is_empty() {
        return Err(PipelineError::NoEndpoints);
    }

    info!(
        partials = partials.len(),
        stories = plan.stories.len(),
        test_cases = plan.test_case_count(),
        "merged partial artifacts"
    );
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Union phase
// ---------------------------------------------------------------------------

/// All sections of all partials, concatenated in arrival order.
fn concat_sections(partials: &[PartialArtifact]) -> TestPlan {
    let mut u = TestPlan::default();
    for p in partials {
        if u.title.trim().is_empty() {
            u.title = p.title.trim().to_string();
        }
        if u.description.trim().is_empty() {
            u.description = p.description.trim().to_string();
        }
        // First non-empty environment wins.
        if u.environment_requirements.is_empty() && !p.environment_requirements.is_empty() {
            u.environment_requirements = p.environment_requirements.clone();
        }

        u.stories.extend_from_slice(&p.stories);
        u.risk_assessment.extend_from_slice(&p.risk_assessment);
        u.deliverables.extend_from_slice(&p.deliverables);
        u.success_criteria.extend_from_slice(&p.success_criteria);
        u.roles_and_responsibility
            .extend_from_slice(&p.roles_and_responsibility);
        u.exit_criteria.extend_from_slice(&p.exit_criteria);
        u.test_execution_strategy
            .extend_from_slice(&p.test_execution_strategy);
        u.entry_criteria.extend_from_slice(&p.entry_criteria);
        u.test_schedule.extend_from_slice(&p.test_schedule);
        u.tools_and_automation_strategy
            .extend_from_slice(&p.tools_and_automation_strategy);
        u.approvals_and_signoffs
            .extend_from_slice(&p.approvals_and_signoffs);
        u.references.extend_from_slice(&p.references);
        u.test_items.extend_from_slice(&p.test_items);
        u.features_to_be_tested
            .extend_from_slice(&p.features_to_be_tested);
        u.features_not_to_be_tested
            .extend_from_slice(&p.features_not_to_be_tested);
        u.staffing_and_training
            .extend_from_slice(&p.staffing_and_training);
        u.pass_criteria.extend_from_slice(&p.pass_criteria);
        u.fail_criteria.extend_from_slice(&p.fail_criteria);
        u.suspension_criteria.extend_from_slice(&p.suspension_criteria);
        u.test_data_requirements
            .extend_from_slice(&p.test_data_requirements);
        u.negative_scenarios.extend_from_slice(&p.negative_scenarios);

        for (req_id, cases) in &p.traceability_matrix {
            u.traceability_matrix
                .entry(req_id.clone())
                .or_default()
                .extend(cases.iter().cloned());
        }
    }
    u
}

// ---------------------------------------------------------------------------
// Section mergers
// ---------------------------------------------------------------------------

struct Merger<'c> {
    config: &'c FuzzyConfig,
}

impl Merger<'_> {
    fn key(&self, text: &str) -> String {
        self.config.normalize_key(text)
    }

    /// Key from the first `words` words of a normalized text.
    fn snippet_key(&self, text: &str, words: usize) -> String {
        self.key(text)
            .split(' ')
            .take(words)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// First non-empty of `candidates`, normalized.
    fn first_key(&self, candidates: &[&str]) -> String {
        candidates
            .iter()
            .map(|c| self.key(c))
            .find(|k| !k.is_empty())
            .unwrap_or_default()
    }

    /// Sort by normalized key, then by raw text.
    fn sort_by_label<T>(&self, items: &mut [T], label: impl Fn(&T) -> String) {
        items.sort_by_cached_key(|item| {
            let raw = label(item);
            (self.key(&raw), raw)
        });
    }

    fn stories(&self, stories: Vec<Story>) -> Vec<Story> {
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        let mut unique: Vec<Story> = Vec::new();
        for story in stories {
            let key = self.identity(&story.id, &story.title, || story_fallback(&story));
            match index.get(&key) {
                Some(&at) => unique[at].test_cases.extend(story.test_cases),
                None => {
                    index.insert(key, unique.len());
                    unique.push(story);
                }
            }
        }

        for story in &mut unique {
            let cases = std::mem::take(&mut story.test_cases);
            story.test_cases = self.test_cases(cases);
        }
        self.sort_by_label(&mut unique, |s| label_of(&s.id, &s.title));
        unique
    }

    fn test_cases(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        let mut seen = HashSet::new();
        let mut unique: Vec<TestCase> = cases
            .into_iter()
            .filter(|tc| seen.insert(self.identity(&tc.id, &tc.title, || case_fallback(tc))))
            .collect();
        self.sort_by_label(&mut unique, |tc| label_of(&tc.id, &tc.title));
        unique
    }

    /// Normalized id, else normalized title, else the serialized entry.
    fn identity(&self, id: &str, title: &str, fallback: impl FnOnce() -> String) -> String {
        let key = self.first_key(&[id, title]);
        if key.is_empty() { fallback() } else { key }
    }

    fn risks(&self, items: Vec<RiskItem>) -> Vec<RiskItem> {
        struct Acc {
            category: String,
            descriptions: Bullets,
            mitigations: Bullets,
            impact: Option<Impact>,
        }

        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let key = self.first_key(&[&item.category, &item.description]);
            let acc = groups.entry(&key, || Acc {
                category: if key.is_empty() { String::new() } else { item.category.trim().to_string() },
                descriptions: Bullets::default(),
                mitigations: Bullets::default(),
                impact: None,
            });
            acc.descriptions.add(&item.description);
            acc.mitigations.add(&item.mitigation);
            if let Some(impact) = Impact::parse(&item.impact) {
                acc.impact = Some(acc.impact.map_or(impact, |current| current.max(impact)));
            }
        }

        let mut out: Vec<RiskItem> = groups
            .into_groups()
            .into_iter()
            .map(|acc| RiskItem {
                category: acc.category,
                description: acc.descriptions.render(),
                mitigation: acc.mitigations.render(),
                impact: acc.impact.unwrap_or(Impact::Low).as_str().to_string(),
            })
            .collect();
        self.sort_by_label(&mut out, |r| r.category.clone());
        out
    }

    fn deliverables(&self, items: Vec<Deliverable>) -> Vec<Deliverable> {
        struct Acc {
            title: String,
            descriptions: Bullets,
            formats: BTreeSet<String>,
            frequencies: BTreeSet<String>,
        }

        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let mut key = self.key(&item.title);
            if key.is_empty() {
                key = self.snippet_key(&item.description, DESCRIPTION_KEY_WORDS);
            }
            let acc = groups.entry(&key, || Acc {
                title: if key.is_empty() { String::new() } else { item.title.trim().to_string() },
                descriptions: Bullets::default(),
                formats: BTreeSet::new(),
                frequencies: BTreeSet::new(),
            });
            acc.descriptions.add(&item.description);
            insert_trimmed(&mut acc.formats, &item.format);
            insert_trimmed(&mut acc.frequencies, &item.frequency);
        }

        let mut out: Vec<Deliverable> = groups
            .into_groups()
            .into_iter()
            .map(|acc| Deliverable {
                title: acc.title,
                description: acc.descriptions.render(),
                format: join_set(&acc.formats),
                frequency: join_set(&acc.frequencies),
            })
            .collect();
        self.sort_by_label(&mut out, |d| d.title.clone());
        out
    }

    fn success_criteria(&self, items: Vec<SuccessCriterion>) -> Vec<SuccessCriterion> {
        struct Acc {
            category: String,
            criteria: Bullets,
            thresholds: BTreeSet<String>,
        }

        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let mut key = self.key(&item.category);
            if key.is_empty() {
                key = self.snippet_key(&item.criteria, DESCRIPTION_KEY_WORDS);
            }
            let acc = groups.entry(&key, || Acc {
                category: if key.is_empty() { String::new() } else { item.category.trim().to_string() },
                criteria: Bullets::default(),
                thresholds: BTreeSet::new(),
            });
            acc.criteria.add(&item.criteria);
            insert_trimmed(&mut acc.thresholds, &item.threshold);
        }

        let mut out: Vec<SuccessCriterion> = groups
            .into_groups()
            .into_iter()
            .map(|acc| SuccessCriterion {
                category: acc.category,
                criteria: acc.criteria.render(),
                threshold: join_set(&acc.thresholds),
            })
            .collect();
        self.sort_by_label(&mut out, |s| s.category.clone());
        out
    }

    fn roles(&self, items: Vec<RoleAssignment>) -> Vec<RoleAssignment> {
        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let mut key = self.key(&item.role);
            if key.is_empty() {
                key = self.snippet_key(&item.responsibility, RESPONSIBILITY_KEY_WORDS);
            }
            let (_, responsibilities) = groups.entry(&key, || {
                let role = if key.is_empty() { String::new() } else { item.role.trim().to_string() };
                (role, Bullets::default())
            });
            responsibilities.add(&item.responsibility);
        }

        let mut out: Vec<RoleAssignment> = groups
            .into_groups()
            .into_iter()
            .map(|(role, responsibilities)| RoleAssignment {
                role,
                responsibility: responsibilities.render(),
            })
            .collect();
        self.sort_by_label(&mut out, |r| r.role.clone());
        out
    }

    /// Free-text sections: near-identical lines collapse into one entry.
    fn described(&self, items: Vec<Described>) -> Vec<Described> {
        let mut groups: FuzzyGroups<'_, Bullets> = FuzzyGroups::new(self.config);
        for item in items.iter().filter(|d| !d.description.trim().is_empty()) {
            groups
                .entry(&self.key(&item.description), Bullets::default)
                .add(&item.description);
        }

        let mut out: Vec<Described> = groups
            .into_groups()
            .into_iter()
            .map(|lines| Described::new(lines.render()))
            .collect();
        self.sort_by_label(&mut out, |d| d.description.clone());
        out
    }

    fn approvals(&self, items: Vec<Approval>) -> Vec<Approval> {
        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let key = [&item.approver, &item.title, &item.description]
                .iter()
                .map(|part| self.key(part))
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
                .join("|");
            let (_, lines) = groups.entry(&key, || {
                let head = Approval {
                    approver: item.approver.trim().to_string(),
                    title: item.title.trim().to_string(),
                    description: String::new(),
                };
                (head, Bullets::default())
            });
            lines.add(&item.description);
        }

        let mut out: Vec<Approval> = groups
            .into_groups()
            .into_iter()
            .map(|(head, lines)| Approval {
                description: lines.render(),
                ..head
            })
            .collect();
        self.sort_by_label(&mut out, |a| a.description.clone());
        out
    }

    fn references(&self, items: Vec<Reference>) -> Vec<Reference> {
        let mut seen = HashSet::new();
        let mut out: Vec<Reference> = items
            .into_iter()
            .filter(|r| seen.insert((self.key(&r.title), self.key(&r.url))))
            .collect();
        out.sort_by_cached_key(|r| (self.key(&r.title), r.url.clone()));
        out
    }

    fn test_items(&self, items: Vec<TestItem>) -> Vec<TestItem> {
        let mut seen = HashSet::new();
        let mut out: Vec<TestItem> = items
            .into_iter()
            .filter(|t| {
                seen.insert((self.key(&t.id), self.key(&t.endpoint), self.key(&t.method)))
            })
            .collect();
        out.sort_by_cached_key(|t| {
            (
                self.first_key(&[&t.id, &t.endpoint]),
                t.method.to_ascii_uppercase(),
            )
        });
        out
    }

    fn staffing(&self, items: Vec<Staffing>) -> Vec<Staffing> {
        let mut groups = FuzzyGroups::new(self.config);
        for item in &items {
            let key = self.key(&item.role);
            if key.is_empty() {
                continue;
            }
            let acc = groups.entry(&key, || Staffing {
                role: item.role.trim().to_string(),
                skills: Vec::new(),
            });
            for skill in &item.skills {
                let skill = skill.trim();
                if !skill.is_empty() && !acc.skills.iter().any(|s| s == skill) {
                    acc.skills.push(skill.to_string());
                }
            }
        }

        let mut out = groups.into_groups();
        for staffing in &mut out {
            staffing.skills.sort();
        }
        self.sort_by_label(&mut out, |s| s.role.clone());
        out
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Risk impact, ordered so that the maximum is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

fn label_of(id: &str, title: &str) -> String {
    let id = id.trim();
    if id.is_empty() { title.trim().to_string() } else { id.to_string() }
}

fn story_fallback(story: &Story) -> String {
    serde_json::to_string(story).unwrap_or_default()
}

fn case_fallback(tc: &TestCase) -> String {
    serde_json::to_string(tc).unwrap_or_default()
}

fn insert_trimmed(set: &mut BTreeSet<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        set.insert(value.to_string());
    }
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// Trimmed, non-empty, distinct and sorted.
fn string_set(items: Vec<String>) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn traceability(matrix: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (req_id, cases) in matrix {
        let req_id = req_id.trim().to_string();
        if req_id.is_empty() {
            continue;
        }
        let entry = out.entry(req_id).or_default();
        entry.extend(cases);
    }
    for cases in out.values_mut() {
        *cases = string_set(std::mem::take(cases));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
