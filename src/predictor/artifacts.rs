//! Artifact directory resolution and bundle loading

use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PredictorConfig;
use crate::error::{AppError, Result};
use crate::predictor::labels::LabelDecoder;
use crate::predictor::model::{EmbeddingBagClassifier, EmbeddingBagWeights, TextClassifier};
use crate::predictor::tokenizer::WordTokenizer;

/// Predicate deciding whether a candidate directory can serve as model source
pub type DirectoryCheck = fn(&Path) -> bool;

/// A directory that exists and contains at least one entry
pub fn is_populated_dir(path: &Path) -> bool {
    path.is_dir()
        && std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
}

/// Ordered search over candidate artifact directories; first match wins
#[derive(Clone)]
pub struct ArtifactLocator {
    candidates: Vec<PathBuf>,
    check: DirectoryCheck,
}

impl ArtifactLocator {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self::with_check(candidates, is_populated_dir)
    }

    pub fn with_check(candidates: Vec<PathBuf>, check: DirectoryCheck) -> Self {
        Self { candidates, check }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn resolve(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|candidate| {
                let accepted = (self.check)(candidate);
                debug!(path = %candidate.display(), accepted, "Checked artifact candidate");
                accepted
            })
    }
}

/// File names of the three artifacts inside the resolved directory
#[derive(Debug, Clone)]
pub struct ArtifactFiles {
    pub model: String,
    pub tokenizer: String,
    pub labels: String,
}

impl From<&PredictorConfig> for ArtifactFiles {
    fn from(config: &PredictorConfig) -> Self {
        Self {
            model: config.model_file.clone(),
            tokenizer: config.tokenizer_file.clone(),
            labels: config.labels_file.clone(),
        }
    }
}

/// Model, tokenizer and label decoder loaded from one directory
pub struct ArtifactBundle {
    pub source: PathBuf,
    pub classifier: Arc<dyn TextClassifier>,
    pub tokenizer: WordTokenizer,
    pub labels: LabelDecoder,
}

impl fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("source", &self.source)
            .field("num_classes", &self.classifier.num_classes())
            .field("vocab_size", &self.classifier.vocab_size())
            .field("labels", &self.labels.classes)
            .finish()
    }
}

impl ArtifactBundle {
    /// Assemble a bundle from already-constructed parts, checking they agree
    pub fn new(
        source: PathBuf,
        classifier: Arc<dyn TextClassifier>,
        tokenizer: WordTokenizer,
        labels: LabelDecoder,
    ) -> Result<Self> {
        if classifier.num_classes() != labels.len() {
            return Err(AppError::ArtifactsUnavailable(format!(
                "model predicts {} classes but the label decoder knows {}",
                classifier.num_classes(),
                labels.len()
            )));
        }

        if tokenizer.max_index() as usize >= classifier.vocab_size() {
            warn!(
                max_index = tokenizer.max_index(),
                vocab_size = classifier.vocab_size(),
                "Tokenizer can emit indices outside the model vocabulary"
            );
        }

        Ok(Self {
            source,
            classifier,
            tokenizer,
            labels,
        })
    }

    /// Load all three artifacts from `dir`. The first failure wins.
    pub fn load(dir: &Path, files: &ArtifactFiles) -> Result<Self> {
        if !dir.exists() {
            return Err(AppError::ArtifactsUnavailable(format!(
                "Model directory {} does not exist.",
                dir.display()
            )));
        }

        let weights: EmbeddingBagWeights = read_json(&dir.join(&files.model))
            .map_err(|e| AppError::ArtifactsUnavailable(format!("Model Load Error: {}", e)))?;
        let classifier = EmbeddingBagClassifier::from_weights(weights)
            .map_err(|e| AppError::ArtifactsUnavailable(format!("Model Load Error: {}", e)))?;
        info!(path = %dir.display(), "Model loaded");

        let tokenizer: WordTokenizer = read_json(&dir.join(&files.tokenizer))
            .map_err(|e| AppError::ArtifactsUnavailable(format!("Tokenizer Load Error: {}", e)))?;
        let labels: LabelDecoder = read_json(&dir.join(&files.labels))
            .map_err(|e| AppError::ArtifactsUnavailable(format!("Label Decoder Load Error: {}", e)))?;
        info!(
            vocabulary = tokenizer.word_index.len(),
            classes = labels.len(),
            "Tokenizer and label decoder loaded"
        );

        Self::new(dir.to_path_buf(), Arc::new(classifier), tokenizer, labels)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> std::result::Result<T, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("failed to parse {}: {}", path.display(), e))
}

/// Resolve the artifact directory and load the bundle from it
pub fn load_bundle(config: &PredictorConfig) -> Result<ArtifactBundle> {
    let locator = ArtifactLocator::new(config.artifact_dirs.clone());

    let dir = locator.resolve().ok_or_else(|| {
        AppError::ArtifactsUnavailable(format!(
            "Could not find model in {:?}",
            locator.candidates()
        ))
    })?;

    info!(path = %dir.display(), "Loading artifacts");
    ArtifactBundle::load(dir, &ArtifactFiles::from(config))
}
