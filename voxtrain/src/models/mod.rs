//! Configured speech models.
//!
//! Model ids double as directory names under the models and training
//! directories, so they are validated before any path is built from them.

use crate::config::StorageSettings;
use crate::error::{VoxtrainError, VoxtrainResult};
use serde::{Deserialize, Serialize};

/// One downloadable model archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model id, e.g. `en_US-rhasspy`
    pub id: String,

    /// URL of the `.tar.gz` archive
    pub url: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,
}

/// Language code from a model id: the text before the first `-`, then
/// before the first `_`.
///
/// ```rust
/// assert_eq!(voxtrain::models::language_of("en_US-rhasspy"), "en");
/// assert_eq!(voxtrain::models::language_of("de-kaldi"), "de");
/// ```
#[must_use]
pub fn language_of(model_id: &str) -> &str {
    let family = model_id.split('-').next().unwrap_or(model_id);
    family.split('_').next().unwrap_or(family)
}

/// Reject ids that are empty or could escape their directory.
///
/// # Errors
///
/// Returns [`VoxtrainError::BadRequest`] for an unusable id.
pub fn validate_model_id(model_id: &str) -> VoxtrainResult<()> {
    if model_id.trim().is_empty() {
        return Err(VoxtrainError::BadRequest("Missing model id".to_string()));
    }
    if model_id.contains(['/', '\\']) || model_id.contains("..") {
        return Err(VoxtrainError::BadRequest(format!(
            "Invalid model id: {model_id}"
        )));
    }
    Ok(())
}

/// Lookup table over the configured models.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl ModelCatalog {
    /// Build a catalog; later duplicates of an id are ignored.
    #[must_use]
    pub fn new(models: Vec<ModelSpec>) -> Self {
        let mut unique: Vec<ModelSpec> = Vec::with_capacity(models.len());
        for model in models {
            if unique.iter().any(|existing| existing.id == model.id) {
                tracing::warn!(model_id = %model.id, "Duplicate model id in configuration ignored");
                continue;
            }
            unique.push(model);
        }
        Self { models: unique }
    }

    /// Model with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|model| model.id == id)
    }

    /// Validate `id` and look it up.
    ///
    /// # Errors
    ///
    /// `400` for a malformed id, `404` for an unknown one.
    pub fn resolve(&self, id: &str) -> VoxtrainResult<&ModelSpec> {
        validate_model_id(id)?;
        self.get(id).ok_or_else(|| VoxtrainError::unknown_model(id))
    }

    /// Models in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter()
    }

    /// Number of configured models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no models are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Row of `GET /api/models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    /// Model id
    pub id: String,
    /// Description from configuration
    pub description: String,
    /// `<models_dir>/<id>` exists
    pub downloaded: bool,
    /// `<train_dir>/<id>/sentences.yaml` exists
    pub has_sentences: bool,
    /// A transcriber handle is cached
    pub loaded: bool,
}

impl ModelStatus {
    /// Inspect the filesystem for `model`.
    #[must_use]
    pub fn inspect(model: &ModelSpec, storage: &StorageSettings, loaded: bool) -> Self {
        Self {
            id: model.id.clone(),
            description: model.description.clone(),
            downloaded: storage.model_dir(&model.id).is_dir(),
            has_sentences: storage.sentences_path(&model.id).is_file(),
            loaded,
        }
    }
}
