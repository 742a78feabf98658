//! Job identity: what kind of work runs against which resource.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The long-running operations this service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Fetch a model archive and unpack it into the models directory.
    Download,
    /// Train a downloaded model against its sentence file.
    Train,
}

impl JobKind {
    /// Line emitted by the runner before the job body starts.
    #[must_use]
    pub const fn start_line(self) -> Option<&'static str> {
        match self {
            Self::Download => None,
            Self::Train => Some("Training started"),
        }
    }

    /// Line emitted by the runner after the job body succeeds.
    #[must_use]
    pub const fn success_line(self) -> &'static str {
        match self {
            Self::Download => "Return to models page to continue",
            Self::Train => "Training complete",
        }
    }

    /// Lowercase name used in logs and resource keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Train => "train",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scope of mutual exclusion: one job kind against one model.
///
/// Downloads and training of the same model use different keys, so they
/// never wait on each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Kind of job that mutates the resource.
    pub kind: JobKind,
    /// Model identifier.
    pub id: String,
}

impl ResourceKey {
    /// Key for downloading `model_id`.
    pub fn download(model_id: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Download,
            id: model_id.into(),
        }
    }

    /// Key for training `model_id`.
    pub fn train(model_id: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Train,
            id: model_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A single invocation of a job against a resource key.
///
/// Exists only for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Unique ID of this invocation.
    pub id: JobId,
    /// Resource the job mutates.
    pub key: ResourceKey,
}

impl Job {
    /// Create a job with a fresh ID.
    #[must_use]
    pub fn new(key: ResourceKey) -> Self {
        Self {
            id: JobId::new(),
            key,
        }
    }

    /// Kind of work this job does.
    #[must_use]
    pub const fn kind(&self) -> JobKind {
        self.key.kind
    }
}
