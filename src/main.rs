// Medical NLP - clinical PDF summaries, PICO tags and embeddings
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use medical_nlp::models::onnx::OnnxRuntime;
use medical_nlp::models::{Device, ModelRegistry};
use medical_nlp::pca::{self, PcaOutcome};
use medical_nlp::pdf_extraction::extract_text;
use medical_nlp::report::build_stamped_report;
use medical_nlp::web::{self, AppState};
use medical_nlp::{logging, Config, NlpError, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Summaries, PICO elements and embeddings for clinical PDFs")]
struct Args {
    /// Config file (defaults to ./medical-nlp.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web app
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8501
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Analyze one PDF and print the results
    Analyze {
        pdf: PathBuf,
        /// Also write the plain-text report here
        #[arg(short, long)]
        report: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known models and whether they are installed
    Models,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Serve { bind } => serve(config, bind),
        Command::Analyze { pdf, report, json } => analyze(&config, &pdf, report, json),
        Command::Models => list_models(&config),
    }
}

fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let addr = bind.unwrap_or_else(|| config.bind.clone());
    let pipeline = Pipeline::load(&config).context("failed to load models")?;
    let state = AppState::new(pipeline);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime
        .block_on(web::serve(state, &addr))
        .with_context(|| format!("server on {} failed", addr))
}

fn analyze(config: &Config, pdf: &Path, report: Option<PathBuf>, json: bool) -> Result<()> {
    let bytes = fs::read(pdf).with_context(|| format!("failed to read {}", pdf.display()))?;
    let document = extract_text(&bytes).with_context(|| format!("{} is not a readable PDF", pdf.display()))?;
    if document.is_blank() {
        anyhow::bail!(NlpError::EmptyText);
    }
    info!("Extracted {} pages from {}", document.page_count, pdf.display());
    if document.likely_scanned() {
        warn!(
            "Only {} of {} pages of {} contain text, it may be a scanned PDF",
            document.text_pages,
            document.page_count,
            pdf.display()
        );
    }

    let mut pipeline = Pipeline::load(config).context("failed to load models")?;
    let result = pipeline.process_text(&document.text)?;
    let projection = pca::project(&result.pca_samples())?;

    if json {
        let output = serde_json::json!({
            "document": &document,
            "result": &result,
            "pca": &projection,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("📌 Summary\n{}\n", result.summary);
        println!("🧬 PICO Elements\n{}\n", serde_json::to_string_pretty(&result.pico)?);
        match &projection {
            PcaOutcome::Projected { explained_variance, .. } => println!(
                "📈 PCA: {} samples, explained variance {:.4} / {:.4}",
                result.pca_samples().len(),
                explained_variance[0],
                explained_variance[1]
            ),
            PcaOutcome::Skipped { reason } => println!("📈 PCA skipped: {}", reason),
        }
        println!("Language: {}", result.language);
    }

    if let Some(path) = report {
        let text = build_stamped_report(&result, chrono::Local::now())?;
        fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn list_models(config: &Config) -> Result<()> {
    let device: Device = config.device.parse()?;
    let registry = ModelRegistry::new(
        config.model_dir.clone(),
        OnnxRuntime::new(device, config.intra_threads),
        config.embedding_max_tokens,
    );

    println!("Model directory: {}", registry.model_dir().display());
    for spec in registry.entries() {
        let status = if registry.is_installed(spec) { "installed" } else { "missing" };
        println!("  {:<18} {:<36} {:<18} {}", spec.key, spec.path, format!("{:?}", spec.task), status);
    }
    Ok(())
}
