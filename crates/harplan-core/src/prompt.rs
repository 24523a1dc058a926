//! Prompt construction for one generation batch.
//!
//! Every prompt leads with the output schema the model must follow, then
//! lists the batch's unique `METHOD URL` pairs, the coverage rules and the
//! raw batch payload. This module is pure string assembly.

use crate::batch::GenerationBatch;
use crate::plan::ArtifactKind;

/// System message sent ahead of every batch prompt.
pub const SYSTEM_MESSAGE: &str =
    "You are a test automation expert. Generate detailed, production-ready test artifacts...";

/// Unique `METHOD URL` pairs of a batch, in first-seen order.
pub fn unique_endpoints(batch: &GenerationBatch) -> Vec<String> {
    let mut seen = Vec::new();
    for record in &batch.records {
        let line = format!("{} {}", record.method, record.url);
        if !seen.contains(&line) {
            seen.push(line);
        }
    }
    seen
}

/// Build the user prompt for `kind` over `batch`.
pub fn build_prompt(kind: ArtifactKind, batch: &GenerationBatch) -> String {
    let endpoints = unique_endpoints(batch);
    let endpoint_list = endpoints
        .iter()
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n");
    let payload = serde_json::to_string_pretty(&batch.records).unwrap_or_else(|_| "[]".into());

    let mut prompt = String::new();

    if kind == ArtifactKind::Code {
        prompt.push_str("The dataset includes the following unique API endpoints:\n");
        prompt.push_str(&endpoint_list);
        prompt.push_str("\n\nCaptured requests:\n");
        prompt.push_str(&payload);
        prompt.push_str("\n\n");
        prompt.push_str(CODE_SKELETON);
        prompt.push_str(CODE_INSTRUCTIONS);
        return prompt;
    }

    prompt.push_str(match kind {
        ArtifactKind::TestPlan => TEST_PLAN_SKELETON,
        _ => STORIES_SKELETON,
    });
    prompt.push_str(&format!(
        "\nPlease analyze these API requests and generate a comprehensive test suite that MUST \
         include a **SEPARATE** test case for **EACH unique API endpoint** (including variations \
         in query parameters, request methods, and payload structures) for the specified {kind}.\n\n\
         IMPORTANT: You must ensure that **EVERY distinct API endpoint** in the provided data is \
         represented in the test suite. **Any missing API endpoint coverage is NOT acceptable.**\n\n"
    ));
    prompt.push_str("The dataset includes the following unique API endpoints:\n");
    prompt.push_str(&endpoint_list);
    prompt.push('\n');
    prompt.push_str(COVERAGE_RULES);
    prompt.push_str(&format!("TOTAL NUMBER OF ENDPOINTS: {}\n\n", endpoints.len()));
    prompt.push_str("Captured requests:\n");
    prompt.push_str(&payload);
    prompt.push_str("\n\n");
    prompt.push_str(match kind {
        ArtifactKind::TestPlan => TEST_PLAN_INSTRUCTIONS,
        ArtifactKind::TestScenario => TEST_SCENARIO_INSTRUCTIONS,
        _ => TEST_CASES_INSTRUCTIONS,
    });
    prompt
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

const STORIES_SKELETON: &str = r#"You MUST respond only with a JSON object matching this exact structure (no markdown or commentary):
{
  "stories": [
    {
      "id": "string",
      "title": "string",
      "description": "string",
      "testCases": [
            {
              "id": "string",
              "title": "string",
              "description": "string",
              "steps": ["string"],
              "expectedResult": "string",
              "apiDetails": {
                "method": "string",
                "endpoint": "string",
                "headers": { "string": "string" },
                "body": "string",
                "expectedStatus": 200
              },
              "severity": "High|Medium|Low",
              "priority": 1,
              "reqId": "string"
            }
      ]
    }
  ]
}
"#;

const TEST_PLAN_SKELETON: &str = r#"You MUST respond only with a JSON object matching this exact structure (no markdown or commentary):
{
  "title": "string",
  "description": "string",
  "stories": [
    {
      "id": "string",
      "title": "string",
      "description": "string",
      "testCases": [
            {
              "id": "string",
              "title": "string",
              "description": "string",
              "steps": ["string"],
              "expectedResult": "string",
              "apiDetails": {
                "method": "string",
                "endpoint": "string",
                "headers": { "string": "string" },
                "body": "string",
                "expectedStatus": 200
              },
              "severity": "High|Medium|Low",
              "priority": 1,
              "reqId": "string"
            }
      ]
    }
  ],
  "riskAssessment": [
    { "category": "string", "description": "string", "mitigation": "string", "impact": "Low|Medium|High" }
  ],
  "deliverables": [
    { "title": "string", "description": "string", "format": "string", "frequency": "string" }
  ],
  "successCriteria": [
    { "category": "string", "criteria": "string", "threshold": "string" }
  ],
  "rolesAndResponsibility": [
    { "role": "string", "responsibility": "string" }
  ],
  "exitCriteria": [{ "description": "string" }],
  "testExecutionStrategy": [{ "description": "string" }],
  "entryCriteria": [{ "description": "string" }],
  "testSchedule": [{ "description": "string" }],
  "toolsAndAutomationStrategy": [{ "description": "string" }],
  "approvalsAndSignoffs": [{ "description": "string" }],
  "references": [{ "title": "string", "url": "string" }],
  "testItems": [
    { "id": "string", "description": "string", "endpoint": "string", "method": "string" }
  ],
  "featuresToBeTested": ["string"],
  "featuresNotToBeTested": ["string"],
  "staffingAndTraining": [{ "role": "string", "skills": ["string"] }],
  "passCriteria": ["string"],
  "failCriteria": ["string"],
  "suspensionCriteria": ["string"],
  "environmentRequirements": {
    "hardware": ["string"],
    "software": ["string"],
    "network": "string"
  },
  "testDataRequirements": ["string"],
  "traceabilityMatrix": { "string": ["string"] },
  "negativeScenarios": ["string"]
}
"#;

const COVERAGE_RULES: &str = r#"
Generate a comprehensive test suite for the provided unique API endpoints.

Key Instructions:
1. Treat each endpoint as a UNIQUE combination of METHOD + URL.
2. Generate test cases independently for each endpoint. DO NOT group or merge endpoints.
3. Cover **all permutations** of the following:
   - **Query parameters**: All valid and invalid combinations, edge cases (e.g., boundary values, empty, null).
   - **Request body**: Valid/invalid key-value pairs, malformed payloads, boundary values.
   - **Headers**: Valid/invalid headers, missing required headers.
4. Include:
   - **Positive test cases**: All valid combinations, including edge cases.
   - **Negative test cases**: Invalid/missing parameters, wrong types, malformed JSON, boundary violations, invalid HTTP methods, missing/invalid auth, rate-limiting, server errors, etc.
   - **At least one** negativeScenarios entry _per endpoint_ covering:
      - invalid id
      - missing required parameter
      - malformed JSON payload
      - expired or invalid token
      - unexpected HTTP method

Output Requirements:
- For N unique endpoints, include **all possible test cases** (positive + negative) for each.
- Each endpoint must have its own independent test cases.
- Ensure full coverage without skipping endpoints or combinations.
- Limit test cases per combination to a reasonable number, but ensure all scenarios are covered.

Goal: Exhaustively test each endpoint as a separate entity, ensuring every valid/invalid permutation is addressed.
"#;

const TEST_PLAN_INSTRUCTIONS: &str = r#"You are to generate a test plan strictly in valid JSON format based on the structure above. Do not include any commentary, markdown, or explanation.

Instructions for content generation:

1. Provide a detailed meaningful "title" of the test plan.
2. In the "description", summarize the high-level test objectives and scope inferred from the endpoints.
3. Define multiple "stories". For each story:
   - Use a unique "id" like STORY-<ShortTitle>-<##>
   - Include clear objectives and scope in the "description"
   - Add multiple "testCases", each with a unique "id" like TC-<Positive/Negative ShortTitle>-<##>, "title", "description", step-by-step "steps", "expectedResult", a full "apiDetails" object, severity (High, Medium, or Low), priority (1-5) and requirement ID (reqId)
4. Ensure all the provided unique METHOD + URL pairs are covered with both positive and negative test cases.
5. Add "riskAssessment" items with category, description, mitigation, and impact (Low | Medium | High).
6. Define all "deliverables" with title, description, format, and frequency.
7. Include measurable "successCriteria" with threshold values.
8. Populate "rolesAndResponsibility"; every role maps to a specific responsibility.
9. Fill "environmentRequirements" with hardware, software and network details.
10. Provide a complete list of required "testDataRequirements".
11. Fill out "testSchedule", "testExecutionStrategy", "entryCriteria", "toolsAndAutomationStrategy", "approvalsAndSignoffs" and "exitCriteria" (MANDATORY).
12. Include "passCriteria", "failCriteria" and "suspensionCriteria".
13. Populate "traceabilityMatrix" by mapping each requirement ID (e.g., REQ-001) to all its related test case IDs (e.g., ["TC-001", "TC-002"]).
14. List both "featuresToBeTested" and "featuresNotToBeTested".
15. Add "staffingAndTraining" specifying roles and skill needs.
16. Add comprehensive "negativeScenarios" representing invalid input, missing headers, auth failures, etc.

Your output must ONLY be the valid JSON object. No additional explanation or formatting.
"#;

const TEST_SCENARIO_INSTRUCTIONS: &str = r#"For each unique METHOD + URL pair:
- Include all possible positive and all possible negative test cases.
- DO NOT group or skip endpoints.

Your response MUST include ONLY stories with:
1. Detailed scenario title
2. Comprehensive scenario description with Positive and Negative headline
3. For each story: scenario objectives, preconditions and setup, multiple test cases with detailed steps, dependencies between scenarios and expected outcomes
4. Complete API details for each test case
5. Validation criteria and risk considerations specific to each scenario

Ensure every API endpoint has all of its test cases. Do NOT group or skip endpoints.
"#;

const TEST_CASES_INSTRUCTIONS: &str = r#"For each unique METHOD + URL pair:
- Include all possible positive and all possible negative test cases.
- Do not group or skip any.

Your response MUST include ONLY stories whose test cases have:
1. A unique ID and a title stating Positive or Negative type
2. A detailed description
3. Comprehensive step-by-step instructions
4. Complete API request details for the endpoint
5. Expected results, validation points, error scenarios and edge cases

EVERY API endpoint must have its own test cases. No grouping allowed.
"#;

const CODE_SKELETON: &str = r#"You MUST return a complete JSON object with this EXACT structure:
{
  "stories": [
    {
      "id": "unique-id",
      "title": "Story Title",
      "description": "Detailed story description",
      "testCases": [
        {
          "id": "tc-unique-id",
          "title": "Test Case Title",
          "description": "Detailed test case description",
          "apiDetails": {
            "method": "GET/POST/PUT/DELETE",
            "endpoint": "url/api/endpoint",
            "headers": { "header-name": "value" },
            "body": "request body if applicable",
            "expectedStatus": 200
          }
        }
      ]
    }
  ]
}
"#;

const CODE_INSTRUCTIONS: &str = r#"
Generate separate Playwright test cases for API endpoints with the following requirements:
- Each endpoint and HTTP method must have its own test.
- Include multiple positive and negative test cases for each endpoint.
  Positive tests: valid inputs that return successful responses.
  Negative tests: invalid inputs, missing fields, unauthorized access, wrong HTTP methods, etc.
- Use unique, concise and descriptive test names.
- Never send HTTP/2 pseudo-headers (":method", ":path", etc.).
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::TrafficRecord;

    const TEST_CASE_SCHEMA: &str = r#"            {
              "id": "string",
              "title": "string",
              "description": "string",
              "steps": ["string"],
              "expectedResult": "string",
              "apiDetails": {
                "method": "string",
                "endpoint": "string",
                "headers": { "string": "string" },
                "body": "string",
                "expectedStatus": 200
              },
              "severity": "High|Medium|Low",
              "priority": 1,
              "reqId": "string"
            }"#;

    fn sample_batch() -> GenerationBatch {
        let mut post = TrafficRecord::new("POST", "https://example.com/api/users");
        post.request_body = Some("{\n  \"name\": \"a\"\n}".into());
        GenerationBatch {
            index: 0,
            records: vec![
                TrafficRecord::new("GET", "https://example.com/api/users"),
                post,
                TrafficRecord::new("GET", "https://example.com/api/users"),
            ],
        }
    }

    #[test]
    fn lists_unique_endpoints_and_count() {
        let prompt = build_prompt(ArtifactKind::TestCases, &sample_batch());
        assert!(prompt.contains("- GET https://example.com/api/users\n"));
        assert!(prompt.contains("- POST https://example.com/api/users"));
        assert!(prompt.contains("TOTAL NUMBER OF ENDPOINTS: 2"));
    }

    #[test]
    fn embeds_raw_payload() {
        let prompt = build_prompt(ArtifactKind::TestScenario, &sample_batch());
        assert!(prompt.contains("\"requestBody\""));
        assert!(prompt.contains("\"method\": \"POST\""));
    }

    #[test]
    fn plan_prompt_starts_with_full_skeleton() {
        let prompt = build_prompt(ArtifactKind::TestPlan, &sample_batch());
        assert!(prompt.starts_with("You MUST respond only with a JSON object"));
        assert!(prompt.contains("\"traceabilityMatrix\""));
        assert!(prompt.contains("negativeScenarios"));
        assert!(prompt.contains("for the specified testPlan"));
    }

    #[test]
    fn stories_prompt_omits_plan_sections() {
        let prompt = build_prompt(ArtifactKind::TestCases, &sample_batch());
        assert!(prompt.contains("\"testCases\""));
        assert!(!prompt.contains("\"riskAssessment\""));
    }

    #[test]
    fn coverage_rules_name_negative_cases() {
        let prompt = build_prompt(ArtifactKind::TestScenario, &sample_batch());
        for needle in [
            "missing required parameter",
            "malformed JSON payload",
            "expired or invalid token",
            "unexpected HTTP method",
            "invalid id",
        ] {
            assert!(prompt.contains(needle), "missing {needle:?}");
        }
    }

    #[test]
    fn code_prompt_asks_for_playwright() {
        let prompt = build_prompt(ArtifactKind::Code, &sample_batch());
        assert!(prompt.contains("Playwright"));
        assert!(prompt.contains("- GET https://example.com/api/users"));
        assert!(!prompt.contains("TOTAL NUMBER OF ENDPOINTS"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let batch = sample_batch();
        for kind in ArtifactKind::ALL {
            assert_eq!(build_prompt(kind, &batch), build_prompt(kind, &batch));
        }
    }

    #[test]
    fn skeletons_share_test_case_shape() {
        let case: String = TEST_CASE_SCHEMA.split_whitespace().collect();
        for skeleton in [STORIES_SKELETON, TEST_PLAN_SKELETON] {
            let flat: String = skeleton.split_whitespace().collect();
            assert!(flat.contains(&case));
        }
    }
}
