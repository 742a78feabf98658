//! Per-model sentence templates (`sentences.yaml`).

use crate::error::{VoxtrainError, VoxtrainResult};
use serde_yaml::Value;
use std::path::Path;

/// Validated contents of a sentence file.
#[derive(Debug, Clone, PartialEq)]
pub struct SentencesFile {
    /// The `sentences` block, as written
    pub sentences: Value,
    /// Words the transcriber should drop from its output
    pub skip_words: Vec<String>,
}

impl SentencesFile {
    /// Validate sentence-file YAML.
    ///
    /// # Errors
    ///
    /// [`VoxtrainError::Yaml`] for malformed YAML, [`VoxtrainError::BadRequest`]
    /// when the `sentences` block is missing or empty.
    pub fn parse(text: &str) -> VoxtrainResult<Self> {
        let document: Value = serde_yaml::from_str(text)?;
        let Value::Mapping(mut document) = document else {
            return Err(VoxtrainError::BadRequest(
                "Missing sentences block".to_string(),
            ));
        };

        let sentences = document
            .remove("sentences")
            .ok_or_else(|| VoxtrainError::BadRequest("Missing sentences block".to_string()))?;
        if is_empty(&sentences) {
            return Err(VoxtrainError::BadRequest("No sentences".to_string()));
        }

        let skip_words = match document.remove("skip_words") {
            None | Some(Value::Null) => Vec::new(),
            Some(words) => serde_yaml::from_value(words)?,
        };

        Ok(Self {
            sentences,
            skip_words,
        })
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(entries) => entries.is_empty(),
        Value::Number(_) | Value::Tagged(_) => false,
    }
}

/// Stored sentence text, or an empty string when none was saved yet.
///
/// # Errors
///
/// Any I/O error other than a missing file.
pub async fn read(path: &Path) -> VoxtrainResult<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err.into()),
    }
}

/// Validate `text` and write it to `path`, creating parent directories.
///
/// Nothing is written when validation fails.
///
/// # Errors
///
/// Validation errors from [`SentencesFile::parse`] or I/O errors.
pub async fn write(path: &Path, text: &str) -> VoxtrainResult<SentencesFile> {
    let parsed = SentencesFile::parse(text)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, text).await?;
    tracing::info!(path = %path.display(), skip_words = parsed.skip_words.len(), "Saved sentences");
    Ok(parsed)
}

/// Skip words from a stored sentence file; empty when absent or invalid.
pub async fn skip_words_at(path: &Path) -> Vec<String> {
    let Ok(text) = tokio::fs::read_to_string(path).await else {
        return Vec::new();
    };
    match SentencesFile::parse(&text) {
        Ok(file) => file.skip_words,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Ignoring invalid sentence file");
            Vec::new()
        }
    }
}
