//! Test helpers: fake collaborators, config and an `axum-test` server.

pub mod server;

pub use server::TestServer;

use crate::config::{StorageSettings, VoxtrainConfig};
use crate::download::{ArchiveDownload, ArchiveSource};
use crate::jobs::{JobError, JobResult};
use crate::models::ModelSpec;
use crate::state::AppState;
use crate::training::MockTrainer;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::{Compression, GzBuilder};
use futures_util::{stream, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Config rooted in `root` with a single `en-test` model.
pub fn test_config(root: &Path) -> VoxtrainConfig {
    let mut config = VoxtrainConfig::default();
    config.storage = StorageSettings {
        models_dir: root.join("models"),
        train_dir: root.join("train"),
        tools_dir: root.join("tools"),
    };
    config.models = vec![ModelSpec {
        id: "en-test".to_string(),
        url: "http://models.test/en-test.tar.gz".to_string(),
        description: "English test model".to_string(),
    }];
    config
}

/// State over [`test_config`] with inert collaborators.
pub fn test_state(root: &Path) -> AppState {
    AppState::with_collaborators(
        test_config(root),
        Arc::new(ScriptedArchiveSource::new(None)),
        Arc::new(MockTrainer::new()),
    )
    .unwrap()
}

fn model_tar(model_id: &str) -> Vec<u8> {
    let contents = b"--sample-frequency=16000\n";
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append_data(&mut header, format!("{model_id}/model.conf"), &contents[..])
        .unwrap();
    builder.into_inner().unwrap()
}

fn gzip(builder: GzBuilder, data: &[u8]) -> Vec<u8> {
    let mut encoder = builder.write(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// A gzip'd tar holding `<model_id>/model.conf`.
pub fn model_archive(model_id: &str) -> Vec<u8> {
    gzip(GzBuilder::new(), &model_tar(model_id))
}

/// Same as [`model_archive`], padded to exactly `size` bytes with a gzip
/// header comment.
pub fn model_archive_of_size(model_id: &str, size: usize) -> Vec<u8> {
    let tar = model_tar(model_id);
    let unpadded = gzip(GzBuilder::new(), &tar).len();
    // The comment adds its bytes plus a NUL terminator.
    assert!(size > unpadded, "{size} bytes cannot hold a {unpadded} byte archive");
    let comment = vec![b'x'; size - unpadded - 1];

    let archive = gzip(GzBuilder::new().comment(comment), &tar);
    assert_eq!(archive.len(), size);
    archive
}

#[derive(Debug, Clone)]
enum Step {
    Chunk(Duration, Bytes),
    Fail(String),
}

/// Archive source that replays a fixed script of delayed chunks.
#[derive(Debug, Clone)]
pub struct ScriptedArchiveSource {
    content_length: Option<u64>,
    steps: Vec<Step>,
}

impl ScriptedArchiveSource {
    /// Empty script announcing `content_length`.
    pub const fn new(content_length: Option<u64>) -> Self {
        Self {
            content_length,
            steps: Vec::new(),
        }
    }

    /// Deliver `bytes` after waiting `delay`.
    #[must_use]
    pub fn chunk_after(mut self, delay: Duration, bytes: impl Into<Bytes>) -> Self {
        self.steps.push(Step::Chunk(delay, bytes.into()));
        self
    }

    /// Fail the transfer with a transport error.
    #[must_use]
    pub fn fail_with(mut self, message: &str) -> Self {
        self.steps.push(Step::Fail(message.to_string()));
        self
    }
}

#[async_trait]
impl ArchiveSource for ScriptedArchiveSource {
    async fn open(&self, _url: &str) -> JobResult<ArchiveDownload> {
        let chunks = stream::iter(self.steps.clone())
            .then(|step| async move {
                match step {
                    Step::Chunk(delay, bytes) => {
                        tokio::time::sleep(delay).await;
                        Ok(bytes)
                    }
                    Step::Fail(message) => Err(JobError::Transport(message)),
                }
            })
            .boxed();

        Ok(ArchiveDownload {
            content_length: self.content_length,
            chunks,
        })
    }
}
