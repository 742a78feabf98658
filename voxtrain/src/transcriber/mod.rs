//! In-memory transcriber handle bound to one trained model.
//!
//! A handle is cached in the application's [`ResourceGuard`] under the
//! model's `train:<id>` key, so starting a training job for that model drops
//! it before the model files change.
//!
//! [`ResourceGuard`]: crate::jobs::ResourceGuard

use crate::config::StorageSettings;
use crate::error::{VoxtrainError, VoxtrainResult};
use crate::sentences;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A loaded transcriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transcriber {
    /// Model this handle was built from
    pub model_id: String,
    /// Extracted model
    pub model_dir: PathBuf,
    /// Training output
    pub train_dir: PathBuf,
    /// Words removed from transcripts
    pub skip_words: Vec<String>,
    /// When the handle was built
    pub loaded_at: DateTime<Utc>,
}

impl Transcriber {
    /// Build a handle for a downloaded and trained model.
    ///
    /// # Errors
    ///
    /// [`VoxtrainError::NotFound`] if the model was not downloaded or not
    /// trained yet.
    pub async fn load(storage: &StorageSettings, model_id: &str) -> VoxtrainResult<Self> {
        let model_dir = storage.model_dir(model_id);
        if !is_dir(&model_dir).await {
            return Err(VoxtrainError::NotFound(format!(
                "Model not downloaded: {model_id}"
            )));
        }

        let train_dir = storage.model_train_dir(model_id);
        if !is_dir(&train_dir).await {
            return Err(VoxtrainError::NotFound(format!(
                "Model not trained: {model_id}"
            )));
        }

        let skip_words = sentences::skip_words_at(&storage.sentences_path(model_id)).await;
        tracing::info!(model_id, skip_words = skip_words.len(), "Transcriber loaded");

        Ok(Self {
            model_id: model_id.to_string(),
            model_dir,
            train_dir,
            skip_words,
            loaded_at: Utc::now(),
        })
    }

    /// Copy of this handle with a new skip-word list.
    #[must_use]
    pub fn with_skip_words(&self, skip_words: Vec<String>) -> Self {
        Self {
            skip_words,
            ..self.clone()
        }
    }

    /// Remove skip words from a transcript.
    #[must_use]
    pub fn clean(&self, transcript: &str) -> String {
        transcript
            .split_whitespace()
            .filter(|word| !self.skip_words.iter().any(|skip| skip == word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
}
