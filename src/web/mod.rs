//! HTTP front end: upload page, rendered results, JSON API and report download.
//!
//! A single [`Pipeline`] is shared behind a mutex. Inference is CPU bound, so
//! every request hands its work to a blocking thread and holds the lock only
//! there.

mod html;
mod routes;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::pca::{self, PcaOutcome};
use crate::pdf_extraction::DocumentText;
use crate::pipeline::Pipeline;
use crate::types::{AnalysisResult, NlpError, Result};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Mutex<Pipeline>>,
    max_upload_bytes: usize,
    summarizer: String,
    embedder: String,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            max_upload_bytes: pipeline.config().max_upload_bytes(),
            summarizer: pipeline.summarizer_name().to_string(),
            embedder: pipeline.embedder_name().to_string(),
            pipeline: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Run extraction, the pipeline and PCA on a blocking thread.
    async fn analyze(&self, bytes: Vec<u8>) -> Result<Analysis> {
        let pipeline = self.pipeline.clone();
        tokio::task::spawn_blocking(move || -> Result<Analysis> {
            let (document, result) = pipeline.lock().process_pdf(&bytes)?;
            let pca = pca::project(&result.pca_samples())?;
            Ok(Analysis {
                document,
                result,
                pca,
            })
        })
        .await
        .map_err(|e| NlpError::Model(format!("analysis task failed: {}", e)))?
    }
}

/// Everything produced for one upload.
#[derive(Debug, Serialize)]
pub struct Analysis {
    pub document: DocumentText,
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub pca: PcaOutcome,
}

pub fn router(state: AppState) -> Router {
    let limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(routes::index))
        .route("/analyze", post(routes::analyze_page))
        .route("/api/analyze", post(routes::analyze_json))
        .route("/api/report", post(routes::report_download))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Medical NLP App listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
