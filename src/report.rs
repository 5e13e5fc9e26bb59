// Plain-text report offered as a download
use chrono::{DateTime, Local};

use crate::types::{AnalysisResult, NlpError, Result};

pub const REPORT_FILENAME: &str = "medical_nlp_report.txt";
pub const REPORT_MIME: &str = "text/plain";

/// `Summary:` followed by the PICO mapping as pretty JSON (keys P, I, C, O).
pub fn build_report(result: &AnalysisResult) -> Result<String> {
    let pico = serde_json::to_string_pretty(&result.pico)
        .map_err(|e| NlpError::Render(format!("failed to serialize PICO elements: {}", e)))?;
    Ok(format!(
        "Summary:\n{}\n\nPICO Elements:\n{}",
        result.summary, pico
    ))
}

/// The report with a trailing generation timestamp, as written by the CLI.
pub fn build_stamped_report(result: &AnalysisResult, generated: DateTime<Local>) -> Result<String> {
    let body = build_report(result)?;
    Ok(format!(
        "{}\n\nGenerated: {}\n",
        body,
        generated.format("%Y-%m-%d %H:%M:%S")
    ))
}
