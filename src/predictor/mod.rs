//! Prediction service - artifact loading, preprocessing and inference

pub mod artifacts;
pub mod labels;
pub mod model;
pub mod request;
pub mod text;
pub mod tokenizer;

use std::backtrace::{Backtrace, BacktraceStatus};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::PredictorConfig;
use crate::error::{AppError, Result};
use artifacts::ArtifactBundle;
use model::argmax_rows;
use text::normalize_text;
use tokenizer::pad_sequences;

/// Outcome of the startup artifact load, fixed for the process lifetime
#[derive(Debug, Clone)]
pub enum ArtifactState {
    Ready(Arc<ArtifactBundle>),
    Failed(String),
}

/// Immutable inference context shared by all request handlers
#[derive(Debug)]
pub struct PredictionService {
    artifacts: ArtifactState,
    max_len: usize,
}

impl PredictionService {
    /// Resolve and load the artifact bundle. Never fails: a load error, with a
    /// backtrace when capture is enabled, is kept and reported on every
    /// prediction instead.
    pub fn load(config: &PredictorConfig) -> Self {
        match artifacts::load_bundle(config) {
            Ok(bundle) => {
                info!(source = %bundle.source.display(), "Artifacts loaded successfully");
                Self::from_bundle(bundle, config.max_len)
            }
            Err(e) => {
                error!(error = %e, "Artifact load failed, predictions will be refused");
                Self::unavailable(with_backtrace(e.to_string()), config.max_len)
            }
        }
    }

    pub fn from_bundle(bundle: ArtifactBundle, max_len: usize) -> Self {
        Self {
            artifacts: ArtifactState::Ready(Arc::new(bundle)),
            max_len,
        }
    }

    pub fn unavailable(reason: impl Into<String>, max_len: usize) -> Self {
        Self {
            artifacts: ArtifactState::Failed(reason.into()),
            max_len,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.artifacts, ArtifactState::Ready(_))
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.artifacts {
            ArtifactState::Failed(reason) => Some(reason.as_str()),
            ArtifactState::Ready(_) => None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        match &self.artifacts {
            ArtifactState::Ready(bundle) => Some(bundle.source.as_path()),
            ArtifactState::Failed(_) => None,
        }
    }

    /// Classify each text, returning one label per input in input order
    pub async fn predict(&self, texts: Vec<String>) -> Result<Vec<String>> {
        let bundle = match &self.artifacts {
            ArtifactState::Ready(bundle) => bundle.clone(),
            ArtifactState::Failed(reason) => {
                return Err(AppError::ArtifactsUnavailable(reason.clone()))
            }
        };
        let max_len = self.max_len;

        debug!(count = texts.len(), "Processing texts");
        tokio::task::spawn_blocking(move || run_inference(&bundle, &texts, max_len))
            .await
            .map_err(|e| inference_error(format!("inference task failed: {}", e)))?
    }
}

fn run_inference(bundle: &ArtifactBundle, texts: &[String], max_len: usize) -> Result<Vec<String>> {
    let cleaned: Vec<String> = texts.iter().map(|t| normalize_text(t)).collect();
    let sequences = bundle.tokenizer.texts_to_sequences(&cleaned);
    let padded = pad_sequences(&sequences, max_len);
    debug!(shape = ?padded.shape(), "Input shape for prediction");

    let scores = bundle
        .classifier
        .predict(&padded)
        .map_err(|e| inference_error(cause_of(e)))?;

    if scores.nrows() != texts.len() {
        return Err(inference_error(format!(
            "model returned {} rows for {} inputs",
            scores.nrows(),
            texts.len()
        )));
    }

    let indices = argmax_rows(&scores);
    bundle
        .labels
        .decode_all(&indices)
        .map_err(|e| inference_error(cause_of(e)))
}

fn cause_of(e: AppError) -> String {
    match e {
        AppError::Inference(cause) => cause,
        other => other.to_string(),
    }
}

/// Wrap a failure cause, appending a backtrace when capture is enabled
fn inference_error(cause: String) -> AppError {
    let message = with_backtrace(cause);
    error!(error = %message, "Inference failed");
    AppError::Inference(message)
}

/// Append the current backtrace to `cause` if `RUST_BACKTRACE` enables capture
fn with_backtrace(cause: String) -> String {
    append_trace(cause, &Backtrace::capture())
}

fn append_trace(cause: String, trace: &Backtrace) -> String {
    match trace.status() {
        BacktraceStatus::Captured => format!("{}\n{}", cause, trace),
        _ => cause,
    }
}
