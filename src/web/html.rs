// Server-rendered pages
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Write as _;

use super::Analysis;
use crate::pca::{render_scatter, PcaOutcome};
use crate::report::{build_report, REPORT_FILENAME, REPORT_MIME};
use crate::types::NlpError;

const STYLE: &str = "
body { margin: 0; font-family: system-ui, sans-serif; color: #262730; display: flex; }
aside { width: 240px; min-height: 100vh; background: #f0f2f6; padding: 24px; box-sizing: border-box; }
main { flex: 1; max-width: 760px; padding: 32px 48px; }
pre { background: #f6f8fa; padding: 12px; overflow-x: auto; white-space: pre-wrap; }
.banner { padding: 12px 16px; border-radius: 6px; margin: 16px 0; }
.success { background: #e6f4ea; color: #1e6b34; }
.warning { background: #fff6e0; color: #8a5a00; }
.error { background: #fde8e8; color: #a61b1b; }
.muted { color: #6b6f7b; font-size: 0.9em; }
";

enum Level {
    Success,
    Warning,
    Error,
}

fn banner(level: Level, message: &str) -> String {
    let class = match level {
        Level::Success => "success",
        Level::Warning => "warning",
        Level::Error => "error",
    };
    format!("<div class=\"banner {}\">{}</div>\n", class, escape(message))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(summarizer: &str, embedder: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Medical NLP</title>
<style>{style}</style>
</head>
<body>
<aside>
<h2>🧠 Medical NLP App</h2>
<p class="muted">Summarizer: {summarizer}<br>Embedder: {embedder}</p>
</aside>
<main>
<h1>📄 Medical NLP Pipeline</h1>
<form action="/analyze" method="post" enctype="multipart/form-data">
<label for="file">Upload a clinical PDF</label><br>
<input type="file" id="file" name="file" accept=".pdf,application/pdf" required>
<button type="submit">Analyze</button>
</form>
{body}</main>
</body>
</html>
"#,
        style = STYLE,
        summarizer = escape(summarizer),
        embedder = escape(embedder),
        body = body,
    )
}

pub fn upload_page(summarizer: &str, embedder: &str) -> String {
    layout(summarizer, embedder, "")
}

pub fn error_page(summarizer: &str, embedder: &str, error: &NlpError) -> String {
    let body = match error {
        NlpError::EmptyText
        | NlpError::InvalidUpload(_)
        | NlpError::UploadTooLarge { .. }
        | NlpError::Pdf(_) => banner(Level::Warning, &error.to_string()),
        _ => banner(Level::Error, &format!("Processing failed: {}", error)),
    };
    layout(summarizer, embedder, &body)
}

pub fn results_page(summarizer: &str, embedder: &str, analysis: &Analysis) -> String {
    let result = &analysis.result;
    let mut body = banner(Level::Success, "✅ PDF processed successfully.");

    let _ = writeln!(
        body,
        "<p class=\"muted\">{} page(s), language: {}</p>",
        analysis.document.page_count,
        escape(&result.language)
    );
    if analysis.document.likely_scanned() {
        let message = format!(
            "Only {} of {} page(s) contain text. This looks like a scanned PDF, \
             so the summary and PICO tags may miss content.",
            analysis.document.text_pages, analysis.document.page_count
        );
        body.push_str(&banner(Level::Warning, &message));
    }
    if result.truncated {
        body.push_str(&banner(
            Level::Warning,
            "The document was truncated before analysis.",
        ));
    }

    body.push_str("<h2>📌 Summary</h2>\n");
    let _ = writeln!(body, "<p>{}</p>", escape(&result.summary));

    body.push_str("<h2>🧬 PICO Elements</h2>\n");
    match serde_json::to_string_pretty(&result.pico) {
        Ok(json) => {
            let _ = writeln!(body, "<pre>{}</pre>", escape(&json));
        }
        Err(e) => body.push_str(&banner(Level::Warning, &format!("PICO error: {}", e))),
    }

    body.push_str("<h2>📈 Embedding Visualization (PCA)</h2>\n");
    match &analysis.pca {
        PcaOutcome::Projected { points, .. } => match render_scatter(points) {
            Ok(png) => {
                let _ = writeln!(
                    body,
                    "<img alt=\"PCA Projection\" src=\"data:image/png;base64,{}\">",
                    STANDARD.encode(png)
                );
            }
            Err(e) => body.push_str(&banner(Level::Warning, &format!("PCA error: {}", e))),
        },
        PcaOutcome::Skipped { reason } => body.push_str(&banner(Level::Warning, reason)),
    }

    match build_report(result) {
        Ok(report) => {
            let _ = writeln!(
                body,
                "<p><a download=\"{}\" href=\"data:{};charset=utf-8;base64,{}\">📥 Download Report</a></p>",
                REPORT_FILENAME,
                REPORT_MIME,
                STANDARD.encode(report)
            );
        }
        Err(e) => body.push_str(&banner(Level::Warning, &format!("Report error: {}", e))),
    }

    layout(summarizer, embedder, &body)
}
