//! Class index to label decoding

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Ordered class names; position `i` is the label for class index `i`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelDecoder {
    pub classes: Vec<String>,
}

impl LabelDecoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes.get(index).map(String::as_str).ok_or_else(|| {
            AppError::Inference(format!(
                "class index {} is outside the {} known labels",
                index,
                self.classes.len()
            ))
        })
    }

    pub fn decode_all(&self, indices: &[usize]) -> Result<Vec<String>> {
        indices
            .iter()
            .map(|&index| self.decode(index).map(str::to_string))
            .collect()
    }
}
