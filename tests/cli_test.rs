// Drive the binary through a pty, with an empty model directory so the
// lightweight backends are used
mod common;

use rexpect::session::{spawn_command, PtySession};
use rstest::rstest;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const TIMEOUT_MS: u64 = 30_000;

fn command(workdir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_medical-nlp"));
    cmd.args(args)
        .current_dir(workdir)
        .env("MEDNLP_MODEL_DIR", workdir.join("models"))
        .env("MEDNLP_DEVICE", "cpu")
        .env("RUST_LOG", "medical_nlp=warn");
    cmd
}

fn spawn(workdir: &Path, args: &[&str]) -> PtySession {
    spawn_command(command(workdir, args), Some(TIMEOUT_MS)).unwrap()
}

#[rstest]
#[case(&["--help"], &["serve", "analyze", "models"])]
#[case(&["analyze", "--help"], &["--report", "--json"])]
fn help_lists_commands(#[case] args: &[&str], #[case] expected: &[&str]) {
    let dir = TempDir::new().unwrap();
    let mut p = spawn(dir.path(), args);
    for text in expected {
        p.exp_string(text).unwrap();
    }
    p.exp_eof().unwrap();
}

#[test]
fn models_lists_registry() {
    let dir = TempDir::new().unwrap();
    let mut p = spawn(dir.path(), &["models"]);
    p.exp_string("Model directory:").unwrap();
    p.exp_string("DistilBART").unwrap();
    p.exp_string("missing").unwrap();
    p.exp_string("Bio_ClinicalBERT").unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn analyze_prints_results_and_writes_report() {
    let dir = TempDir::new().unwrap();
    let pdf = dir.path().join("trial.pdf");
    fs::write(&pdf, common::trial_pdf()).unwrap();
    let report = dir.path().join("report.txt");

    let mut p = spawn(
        dir.path(),
        &["analyze", "trial.pdf", "--report", "report.txt"],
    );
    p.exp_string("Summary").unwrap();
    p.exp_string("participants").unwrap();
    p.exp_string("PICO Elements").unwrap();
    p.exp_string("PCA skipped").unwrap();
    p.exp_eof().unwrap();

    let text = fs::read_to_string(report).unwrap();
    assert!(text.starts_with("Summary:\n"));
    assert!(text.contains("\"P\""));
    assert!(text.contains("Generated: "));
}

#[test]
fn analyze_json_output() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("trial.pdf"), common::trial_pdf()).unwrap();

    let mut p = spawn(dir.path(), &["analyze", "trial.pdf", "--json"]);
    p.exp_string("\"document\"").unwrap();
    p.exp_string("\"page_count\": 1").unwrap();
    p.exp_string("\"status\": \"skipped\"").unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn analyze_rejects_non_pdf() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.pdf"), "not really a pdf").unwrap();

    let mut p = spawn(dir.path(), &["analyze", "notes.pdf"]);
    p.exp_string("not a readable PDF").unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn analyze_blank_pdf_reports_no_text() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("blank.pdf"), common::blank_pdf()).unwrap();

    let mut p = spawn(dir.path(), &["analyze", "blank.pdf"]);
    p.exp_string("No readable text found in the uploaded PDF.").unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn analyze_warns_on_scanned_pdf() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("scan.pdf"), common::scanned_trial_pdf()).unwrap();

    let mut p = spawn(dir.path(), &["analyze", "scan.pdf"]);
    p.exp_string("Only 1 of 3 pages").unwrap();
    p.exp_string("Summary").unwrap();
    p.exp_eof().unwrap();
}
