//! Markdown rendering, one layout per artifact kind.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use crate::plan::{ArtifactKind, Described, Story, TestCase, TestPlan};

/// Render `plan` as Markdown laid out for `kind`.
///
/// `code` artifacts have no Markdown layout of their own and render as a
/// full test plan.
pub fn to_markdown(plan: &TestPlan, kind: ArtifactKind) -> Result<String, fmt::Error> {
    let mut out = String::new();
    match kind {
        ArtifactKind::TestPlan | ArtifactKind::Code => test_plan(&mut out, plan)?,
        ArtifactKind::TestScenario => scenarios(&mut out, plan)?,
        ArtifactKind::TestCases => test_cases(&mut out, plan)?,
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Test plan
// ---------------------------------------------------------------------------

fn test_plan(out: &mut String, plan: &TestPlan) -> fmt::Result {
    writeln!(out, "# Test Plan: {}\n", plan.title)?;
    section(out, "Overview", or_none(&plan.description))?;

    section(
        out,
        "Test Objectives and Scope",
        &bullets(plan.stories.iter().map(|s| s.title.as_str())),
    )?;

    let endpoints: BTreeSet<&str> = plan
        .stories
        .iter()
        .flat_map(|s| &s.test_cases)
        .map(|tc| tc.api_details.endpoint.trim())
        .filter(|e| !e.is_empty())
        .collect();
    section(out, "End Points", &bullets(endpoints))?;

    out.push_str("## Stories\n");
    for story in &plan.stories {
        story_block(out, story)?;
    }
    out.push('\n');

    let mut risks = String::new();
    for risk in &plan.risk_assessment {
        writeln!(risks, "### {}", risk.category)?;
        writeln!(risks, "- Description: {}", risk.description)?;
        writeln!(risks, "- Mitigation: {}", risk.mitigation)?;
        writeln!(risks, "- Impact: {}\n", risk.impact)?;
    }
    section(out, "Risk Assessment", risks.trim_end())?;

    let mut deliverables = String::new();
    for d in &plan.deliverables {
        writeln!(deliverables, "### {}", d.title)?;
        writeln!(deliverables, "- Description: {}", d.description)?;
        writeln!(deliverables, "- Format: {}", d.format)?;
        writeln!(deliverables, "- Frequency: {}\n", d.frequency)?;
    }
    section(out, "Deliverables", deliverables.trim_end())?;

    let mut criteria = String::new();
    for c in &plan.success_criteria {
        writeln!(criteria, "### {}", c.category)?;
        writeln!(criteria, "- Criteria: {}", c.criteria)?;
        writeln!(criteria, "- Threshold: {}\n", c.threshold)?;
    }
    section(out, "Success Criteria", criteria.trim_end())?;

    let mut roles = String::new();
    for r in &plan.roles_and_responsibility {
        writeln!(roles, "- **{}**: {}", r.role, r.responsibility)?;
    }
    section(out, "Roles and Responsibilities", roles.trim_end())?;

    described(out, "Entry Criteria", &plan.entry_criteria)?;
    described(out, "Exit Criteria", &plan.exit_criteria)?;
    described(out, "Test Execution Strategy", &plan.test_execution_strategy)?;
    described(out, "Test Schedule", &plan.test_schedule)?;
    described(
        out,
        "Tools and Automation Strategy",
        &plan.tools_and_automation_strategy,
    )?;

    let mut approvals = String::new();
    for a in &plan.approvals_and_signoffs {
        let head = [a.approver.as_str(), a.title.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if !head.is_empty() {
            writeln!(approvals, "### {head}")?;
        }
        writeln!(approvals, "{}\n", a.description)?;
    }
    section(out, "Approvals and Sign-offs", approvals.trim_end())?;

    section(
        out,
        "References",
        &bullets(
            plan.references
                .iter()
                .map(|r| format!("Title: {}, URL: {}", r.title, r.url)),
        ),
    )?;

    let mut items = String::new();
    for item in &plan.test_items {
        writeln!(
            items,
            "- {}: {} {} ({})",
            item.id, item.method, item.endpoint, item.description
        )?;
    }
    section(out, "Test Items", items.trim_end())?;

    section(out, "Features To Be Tested", &bullets(&plan.features_to_be_tested))?;
    section(
        out,
        "Features Not To Be Tested",
        &bullets(&plan.features_not_to_be_tested),
    )?;
    section(
        out,
        "Staffing And Training",
        &bullets(
            plan.staffing_and_training
                .iter()
                .map(|s| format!("{}: {}", s.role, s.skills.join(", "))),
        ),
    )?;
    section(out, "Pass Criteria", &bullets(&plan.pass_criteria))?;
    section(out, "Fail Criteria", &bullets(&plan.fail_criteria))?;
    section(out, "Suspension Criteria", &bullets(&plan.suspension_criteria))?;

    let env = &plan.environment_requirements;
    let joined = |list: &[String]| {
        if list.is_empty() {
            "None".to_string()
        } else {
            list.join(", ")
        }
    };
    let environment = format!(
        "- Hardware: {}\n- Software: {}\n- Network: {}",
        joined(&env.hardware),
        joined(&env.software),
        or_none(&env.network),
    );
    section(out, "Environment Requirements", &environment)?;

    section(
        out,
        "Test Data Requirements",
        &bullets(&plan.test_data_requirements),
    )?;
    section(
        out,
        "Traceability Matrix",
        &bullets(
            plan.traceability_matrix
                .iter()
                .map(|(req, cases)| format!("{req}: {}", cases.join(", "))),
        ),
    )?;
    section(out, "Negative Scenarios", &bullets(&plan.negative_scenarios))?;

    out.truncate(out.trim_end().len());
    out.push('\n');
    Ok(())
}

fn story_block(out: &mut String, story: &Story) -> fmt::Result {
    writeln!(out, "\n### {}", story.title)?;
    writeln!(out, "- ID: {}", story.id)?;
    writeln!(out, "- Description: {}", story.description)?;
    for tc in &story.test_cases {
        writeln!(out, "\n#### Test Case: {}", tc.title)?;
        writeln!(out, "- ID: {}", tc.id)?;
        writeln!(out, "- Description: {}", tc.description)?;
        out.push_str("- Steps:\n");
        for (i, step) in tc.steps.iter().enumerate() {
            writeln!(out, "  {}. {step}", i + 1)?;
        }
        writeln!(out, "- Expected Result: {}", tc.expected_result)?;
        out.push_str("- API Details:\n");
        api_details(out, tc, "  ")?;
        if let Some(severity) = &tc.severity {
            writeln!(out, "- Severity: {severity}")?;
        }
        if let Some(priority) = tc.priority {
            writeln!(out, "- Priority: {priority}")?;
        }
        if let Some(req) = &tc.req_id {
            writeln!(out, "- ReqId: {req}")?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scenarios and test cases
// ---------------------------------------------------------------------------

fn scenarios(out: &mut String, plan: &TestPlan) -> fmt::Result {
    for story in &plan.stories {
        writeln!(out, "# Test Scenario: {}\n", story.title)?;
        section(out, "Overview", or_none(&story.description))?;
        out.push_str("## Scenarios\n");
        for tc in &story.test_cases {
            writeln!(out, "\n### {}", tc.title)?;
            if !tc.description.is_empty() {
                writeln!(out, "{}", tc.description)?;
            }
            out.push_str("\n#### Steps\n");
            for (i, step) in tc.steps.iter().enumerate() {
                writeln!(out, "{}. {step}", i + 1)?;
            }
            writeln!(out, "\n#### Expected Outcome\n{}", tc.expected_result)?;
            out.push_str("\n#### API Details\n");
            api_details(out, tc, "")?;
        }
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    Ok(())
}

fn test_cases(out: &mut String, plan: &TestPlan) -> fmt::Result {
    let cases = plan.stories.iter().flat_map(|s| &s.test_cases);
    for (i, tc) in cases.enumerate() {
        if i > 0 {
            out.push_str("\n---\n\n");
        }
        writeln!(out, "# Test Case: {}\n", tc.title)?;
        writeln!(out, "## ID: {}", tc.id)?;
        writeln!(out, "## Description: {}\n", tc.description)?;
        out.push_str("### Steps\n");
        for (n, step) in tc.steps.iter().enumerate() {
            writeln!(out, "{}. {step}", n + 1)?;
        }
        writeln!(out, "\n### Expected Result\n{}\n", tc.expected_result)?;
        out.push_str("### API Details\n");
        api_details(out, tc, "")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn api_details(out: &mut String, tc: &TestCase, indent: &str) -> fmt::Result {
    let api = &tc.api_details;
    writeln!(out, "{indent}- Method: {}", api.method)?;
    writeln!(out, "{indent}- Endpoint: {}", api.endpoint)?;
    if !api.headers.is_empty() {
        let headers: Vec<String> = api.headers.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        writeln!(out, "{indent}- Headers: {}", headers.join("; "))?;
    }
    writeln!(out, "{indent}- Body: {}", or_na(&api.body))?;
    if let Some(status) = api.expected_status {
        writeln!(out, "{indent}- Expected Status: {status}")?;
    }
    Ok(())
}

fn section(out: &mut String, heading: &str, body: &str) -> fmt::Result {
    let body = if body.trim().is_empty() { "None" } else { body };
    writeln!(out, "## {heading}\n{body}\n")
}

fn described(out: &mut String, heading: &str, entries: &[Described]) -> fmt::Result {
    section(
        out,
        heading,
        &entries
            .iter()
            .map(|d| d.description.trim())
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn bullets<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() { "None" } else { text }
}

fn or_na(text: &str) -> &str {
    if text.trim().is_empty() { "N/A" } else { text }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ApiDetails, RiskItem};

    fn sample() -> TestPlan {
        let case = TestCase {
            id: "TC1".into(),
            title: "Fetch user".into(),
            steps: vec!["Send GET".into(), "Check body".into()],
            expected_result: "200 with user".into(),
            api_details: ApiDetails {
                method: "GET".into(),
                endpoint: "https://api.example.com/users/1".into(),
                expected_status: Some(200),
                ..ApiDetails::default()
            },
            ..TestCase::default()
        };
        TestPlan {
            title: "Users API".into(),
            stories: vec![Story {
                id: "S1".into(),
                title: "User lookup".into(),
                test_cases: vec![case],
                ..Story::default()
            }],
            risk_assessment: vec![RiskItem {
                category: "Security".into(),
                impact: "High".into(),
                ..RiskItem::default()
            }],
            ..TestPlan::default()
        }
    }

    #[test]
    fn test_plan_layout() {
        let md = to_markdown(&sample(), ArtifactKind::TestPlan).unwrap();
        assert!(md.starts_with("# Test Plan: Users API\n"));
        assert!(md.contains("## Overview\nNone\n"));
        assert!(md.contains("## End Points\n- https://api.example.com/users/1\n"));
        assert!(md.contains("#### Test Case: Fetch user"));
        assert!(md.contains("  1. Send GET\n  2. Check body\n"));
        assert!(md.contains("### Security\n"));
        assert!(md.contains("- Impact: High"));
        assert!(md.contains("## Deliverables\nNone\n"));
        assert!(md.contains("- Network: None"));
        assert!(md.ends_with("## Negative Scenarios\nNone\n"));
    }

    #[test]
    fn scenario_layout_lists_cases_per_story() {
        let md = to_markdown(&sample(), ArtifactKind::TestScenario).unwrap();
        assert!(md.starts_with("# Test Scenario: User lookup\n"));
        assert!(md.contains("### Fetch user\n"));
        assert!(md.contains("#### Expected Outcome\n200 with user\n"));
        assert!(md.contains("- Expected Status: 200"));
        assert!(!md.contains("Risk Assessment"));
    }

    #[test]
    fn test_case_layout_separates_cases() {
        let mut plan = sample();
        let mut second = plan.stories[0].test_cases[0].clone();
        second.id = "TC2".into();
        plan.stories[0].test_cases.push(second);
        let md = to_markdown(&plan, ArtifactKind::TestCases).unwrap();
        assert_eq!(md.matches("# Test Case: Fetch user").count(), 2);
        assert!(md.contains("\n---\n"));
        assert!(md.contains("## ID: TC2"));
        assert!(md.contains("- Body: N/A"));
    }

    #[test]
    fn empty_plan_renders_placeholders() {
        let md = to_markdown(&TestPlan::default(), ArtifactKind::TestPlan).unwrap();
        assert!(md.contains("## Stories\n"));
        assert!(md.contains("## Risk Assessment\nNone\n"));
        assert_eq!(to_markdown(&TestPlan::default(), ArtifactKind::TestCases).unwrap(), "");
    }
}
