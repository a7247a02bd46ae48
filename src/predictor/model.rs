//! Text classification models

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::predictor::tokenizer::PAD_TOKEN;

/// A model mapping padded token sequences to per-class scores
pub trait TextClassifier: Send + Sync {
    /// Number of output classes
    fn num_classes(&self) -> usize;

    /// Largest token index the model accepts
    fn vocab_size(&self) -> usize;

    /// Forward pass in inference mode: `(batch, max_len)` tokens to
    /// `(batch, num_classes)` scores
    fn predict(&self, tokens: &Array2<u32>) -> Result<Array2<f32>>;
}

/// Serialized form of [`EmbeddingBagClassifier`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingBagWeights {
    pub format: String,
    /// One row per token index, row 0 being the padding token
    pub embeddings: Vec<Vec<f32>>,
    /// `(embedding_dim, num_classes)`
    pub dense_weights: Vec<Vec<f32>>,
    pub dense_bias: Vec<f32>,
}

pub const EMBEDDING_BAG_FORMAT: &str = "embedding-bag-v1";

/// Mean-pooled embedding followed by a softmax dense layer
#[derive(Debug, Clone)]
pub struct EmbeddingBagClassifier {
    embeddings: Array2<f32>,
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl EmbeddingBagClassifier {
    pub fn new(embeddings: Array2<f32>, weights: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        if embeddings.ncols() != weights.nrows() {
            return Err(AppError::ArtifactsUnavailable(format!(
                "embedding dimension {} does not match dense input {}",
                embeddings.ncols(),
                weights.nrows()
            )));
        }
        if weights.ncols() != bias.len() {
            return Err(AppError::ArtifactsUnavailable(format!(
                "dense output {} does not match bias length {}",
                weights.ncols(),
                bias.len()
            )));
        }
        if weights.ncols() == 0 {
            return Err(AppError::ArtifactsUnavailable(
                "model has no output classes".to_string(),
            ));
        }

        Ok(Self {
            embeddings,
            weights,
            bias,
        })
    }

    pub fn from_weights(stored: EmbeddingBagWeights) -> Result<Self> {
        if stored.format != EMBEDDING_BAG_FORMAT {
            return Err(AppError::ArtifactsUnavailable(format!(
                "unsupported model format '{}', expected '{}'",
                stored.format, EMBEDDING_BAG_FORMAT
            )));
        }

        let embeddings = to_matrix(stored.embeddings, "embeddings")?;
        let weights = to_matrix(stored.dense_weights, "dense_weights")?;
        Self::new(embeddings, weights, Array1::from(stored.dense_bias))
    }

    fn pool(&self, row: ndarray::ArrayView1<u32>) -> Result<Array1<f32>> {
        let mut pooled = Array1::<f32>::zeros(self.embeddings.ncols());
        let mut count = 0usize;

        for &token in row.iter().filter(|&&t| t != PAD_TOKEN) {
            let index = token as usize;
            if index >= self.embeddings.nrows() {
                return Err(AppError::Inference(format!(
                    "token index {} exceeds vocabulary size {}",
                    index,
                    self.embeddings.nrows()
                )));
            }
            pooled += &self.embeddings.row(index);
            count += 1;
        }

        if count > 0 {
            pooled /= count as f32;
        }
        Ok(pooled)
    }
}

impl TextClassifier for EmbeddingBagClassifier {
    fn num_classes(&self) -> usize {
        self.weights.ncols()
    }

    fn vocab_size(&self) -> usize {
        self.embeddings.nrows()
    }

    fn predict(&self, tokens: &Array2<u32>) -> Result<Array2<f32>> {
        let mut pooled = Array2::<f32>::zeros((tokens.nrows(), self.embeddings.ncols()));
        for (i, row) in tokens.axis_iter(Axis(0)).enumerate() {
            pooled.row_mut(i).assign(&self.pool(row)?);
        }

        let mut scores = pooled.dot(&self.weights) + &self.bias;
        for mut row in scores.axis_iter_mut(Axis(0)) {
            softmax_in_place(&mut row);
        }
        Ok(scores)
    }
}

fn to_matrix(rows: Vec<Vec<f32>>, name: &str) -> Result<Array2<f32>> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(AppError::ArtifactsUnavailable(format!(
            "{} rows have inconsistent lengths",
            name
        )));
    }

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| AppError::ArtifactsUnavailable(format!("{} has an invalid shape: {}", name, e)))
}

fn softmax_in_place(row: &mut ndarray::ArrayViewMut1<f32>) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
        row.mapv_inplace(|v| v / sum);
    }
}

/// Index of the highest score in each row; ties resolve to the lowest index
pub fn argmax_rows(scores: &Array2<f32>) -> Vec<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}
