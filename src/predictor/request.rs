//! Prediction request and response bodies

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// The `text` field: one string or an ordered list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    One(String),
    Many(Vec<String>),
}

impl TextInput {
    /// A single string is a one-element batch
    pub fn into_texts(self) -> Vec<String> {
        match self {
            TextInput::One(text) => vec![text],
            TextInput::Many(texts) => texts,
        }
    }

    /// Extract and validate the `text` field of a decoded JSON body
    pub fn from_body(body: &Value) -> Result<Self> {
        let text = match body.get("text") {
            Some(Value::Null) | None => {
                return Err(AppError::InvalidRequest(
                    "Missing \"text\" field in JSON".to_string(),
                ))
            }
            Some(text) => text,
        };

        let input: TextInput = serde_json::from_value(text.clone()).map_err(|_| {
            AppError::InvalidRequest(
                "\"text\" must be a string or a list of strings".to_string(),
            )
        })?;

        if matches!(&input, TextInput::Many(texts) if texts.is_empty()) {
            return Err(AppError::InvalidRequest(
                "\"text\" must contain at least one string".to_string(),
            ));
        }

        Ok(input)
    }

    /// Parse a raw request body
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| AppError::InvalidRequest(format!("Malformed JSON body: {}", e)))?;
        Self::from_body(&value)
    }
}

/// Successful prediction body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<String>,
}
