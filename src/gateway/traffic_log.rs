//! Append-only CSV log of proxied predictions, consumed by drift monitoring

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::predictor::request::{PredictResponse, TextInput};

/// One logged (input text, predicted label) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRecord {
    pub text: String,
    pub label: String,
}

/// Pair each input text with its returned label.
///
/// Returns no records when the request or response cannot be read, or when
/// the counts differ; alignment is never guessed.
pub fn extract_records(request: &[u8], response: &[u8]) -> Vec<TrafficRecord> {
    let texts = match serde_json::from_slice::<Value>(request)
        .map_err(AppError::from)
        .and_then(|body| TextInput::from_body(&body))
    {
        Ok(input) => input.into_texts(),
        Err(e) => {
            warn!(error = %e, "Request payload has no loggable texts");
            return Vec::new();
        }
    };

    let predictions = match serde_json::from_slice::<PredictResponse>(response) {
        Ok(response) => response.predictions,
        Err(e) => {
            warn!(error = %e, "Backend response has no predictions list");
            return Vec::new();
        }
    };

    if texts.len() != predictions.len() {
        warn!(
            texts = texts.len(),
            predictions = predictions.len(),
            "Text and prediction counts differ, skipping traffic log records"
        );
        return Vec::new();
    }

    texts
        .into_iter()
        .zip(predictions)
        .map(|(text, label)| TrafficRecord { text, label })
        .collect()
}

/// Serialised appender for the traffic log file
#[derive(Debug)]
pub struct TrafficLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TrafficLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append records in a single write, adding the header to a new file.
    /// Returns the number of records written.
    pub async fn append(&self, records: &[TrafficRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;

        let needs_header = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(AppError::Io(e)),
        };

        let chunk = encode_records(records, needs_header)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&chunk).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), records = records.len(), "Appended traffic records");
        Ok(records.len())
    }
}

fn encode_records(records: &[TrafficRecord], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(with_header)
        .from_writer(Vec::new());

    for record in records {
        writer
            .serialize(record)
            .map_err(|e| AppError::Internal(format!("Failed to encode traffic record: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Failed to flush traffic records: {}", e)))
}
