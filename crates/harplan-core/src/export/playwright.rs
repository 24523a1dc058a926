//! Playwright API test emission.
//!
//! Every test case with an HTTP method and endpoint becomes one
//! `test(...)` block that issues the request through Playwright's
//! `request` fixture and asserts the expected status (200 when unset).

use std::fmt::{self, Write};

use serde_json::Value;

use crate::plan::{TestCase, TestPlan};

const DEFAULT_STATUS: u32 = 200;

/// Render `plan` as a Playwright `.spec.ts` file.
pub fn to_playwright(plan: &TestPlan) -> Result<String, fmt::Error> {
    let mut out = String::from("import { test, expect } from '@playwright/test';\n\n");
    writeln!(out, "/**\n * Test Plan: {}", comment_text(&plan.title))?;
    if !plan.description.trim().is_empty() {
        writeln!(out, " * {}", comment_text(&plan.description))?;
    }
    out.push_str(" */\n");

    let mut emitted = 0usize;
    for story in &plan.stories {
        writeln!(out, "\n/**\n * Story: {}", comment_text(&story.title))?;
        if !story.description.trim().is_empty() {
            writeln!(out, " * {}", comment_text(&story.description))?;
        }
        out.push_str(" */\n");

        for tc in &story.test_cases {
            if test_block(&mut out, tc)? {
                emitted += 1;
            }
        }
    }

    writeln!(out, "\n// Total tests: {emitted}")?;
    Ok(out)
}

/// Append the `test(...)` block for `tc`; `false` when it lacks a method or
/// endpoint.
fn test_block(out: &mut String, tc: &TestCase) -> Result<bool, fmt::Error> {
    let api = &tc.api_details;
    let method = api.method.trim();
    let endpoint = api.endpoint.trim();
    if method.is_empty() || endpoint.is_empty() {
        return Ok(false);
    }

    let title = if tc.title.trim().is_empty() { &tc.id } else { &tc.title };
    let headers = indent(
        &serde_json::to_string_pretty(&api.headers).unwrap_or_else(|_| "{}".into()),
        "    ",
    );
    let data = request_data(&api.body);
    let status = api.expected_status.unwrap_or(DEFAULT_STATUS);

    writeln!(out, "\ntest({}, async ({{ request }}) => {{", js_string(title))?;
    if !tc.description.trim().is_empty() {
        writeln!(out, "  // {}", comment_text(&tc.description))?;
    }
    writeln!(
        out,
        "  const response = await request.{}({}, {{",
        method.to_ascii_lowercase(),
        js_string(endpoint)
    )?;
    writeln!(out, "    headers: {headers},")?;
    writeln!(out, "    data: {data}")?;
    out.push_str("  });\n\n");
    writeln!(out, "  expect(response.status()).toBe({status});")?;
    out.push_str("});\n");
    Ok(true)
}

/// The `data` argument: JSON bodies are inlined as object literals, other
/// text is passed as a string.
fn request_data(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "undefined".into();
    }
    let pretty = match serde_json::from_str::<Value>(body) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| js_string(body)),
        Err(_) => js_string(body),
    };
    indent(&pretty, "    ")
}

/// A single-quoted JavaScript string literal.
fn js_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Collapse text onto one line that cannot close a block comment.
fn comment_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").replace("*/", "* /")
}

/// Indent every line after the first.
fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(i, line)| if i == 0 { line.to_string() } else { format!("{prefix}{line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
