//! `harplan parse <file>` -- run only the traffic normalizer.

use std::path::Path;

use anyhow::{Context, Result};

use harplan_core::traffic::{self, SourceFormat, TrafficRecord};

/// Read and normalize a capture file.
pub fn load_records(file: &Path, format: Option<SourceFormat>) -> Result<Vec<TrafficRecord>> {
    let raw = std::fs::read(file)
        .with_context(|| format!("failed to read capture file: {}", file.display()))?;
    traffic::normalize(&raw, format)
        .with_context(|| format!("failed to parse capture file: {}", file.display()))
}

pub fn run_parse(file: &Path, format: Option<SourceFormat>, json: bool) -> Result<()> {
    let records = load_records(file, format)?;

    if json {
        let text = serde_json::to_string_pretty(&records).context("failed to serialize records")?;
        println!("{text}");
        return Ok(());
    }

    print!("{}", table(&records));
    eprintln!("{} API request(s) after filtering", records.len());
    Ok(())
}

/// `METHOD  URL  STATUS` rows, methods left-aligned in a fixed column.
fn table(records: &[TrafficRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let status = record
            .response_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!("{:<7} {status:>3}  {}\n", record.method, record.url));
    }
    out
}
