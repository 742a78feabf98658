//! Model archive download and extraction.
//!
//! The archive is streamed into a scratch directory while progress is
//! reported, then unpacked into the models directory on the blocking pool.
//!
//! Progress lines, in order:
//!
//! ```text
//! Expecting 1000 byte(s)      (only when the length is known)
//! 50%                         (at most once per report interval)
//! Download complete
//! Model extracted
//! ```

use crate::jobs::{JobError, JobResult, ProgressSender};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, info};

/// File name of the archive inside the scratch directory.
const ARCHIVE_NAME: &str = "model.tar.gz";

/// An opened archive: its announced length and its body.
pub struct ArchiveDownload {
    /// `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
    /// Body chunks in arrival order.
    pub chunks: BoxStream<'static, JobResult<Bytes>>,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Where model archives come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Start fetching `url`.
    async fn open(&self, url: &str) -> JobResult<ArchiveDownload>;
}

/// Fetches archives over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
}

impl HttpArchiveSource {
    /// Use an existing client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn open(&self, url: &str) -> JobResult<ArchiveDownload> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_length = response.content_length();
        debug!(url, ?content_length, "Archive response received");

        Ok(ArchiveDownload {
            content_length,
            chunks: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(JobError::from))
                .boxed(),
        })
    }
}

/// Rate limit for progress lines: reports only when strictly more than
/// `interval` has passed since the last report.
#[derive(Debug)]
struct ReportThrottle {
    interval: Duration,
    last: Instant,
}

impl ReportThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

fn progress_line(downloaded: u64, total: Option<u64>) -> String {
    match total {
        Some(total) if total > 0 => format!("{}%", downloaded.saturating_mul(100) / total),
        _ => format!("Bytes downloaded: {downloaded}"),
    }
}

/// Stream `download` into `destination`, reporting progress.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Fails on a transport error from the source or a write error.
pub async fn fetch_archive(
    download: ArchiveDownload,
    destination: &Path,
    report_interval: Duration,
    progress: &ProgressSender,
) -> JobResult<u64> {
    let ArchiveDownload {
        content_length,
        mut chunks,
    } = download;

    if let Some(total) = content_length {
        progress.send(format!("Expecting {total} byte(s)"));
    }

    let mut file = tokio::fs::File::create(destination).await?;
    let mut throttle = ReportThrottle::new(report_interval);
    let mut downloaded: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if throttle.ready() {
            progress.send(progress_line(downloaded, content_length));
        }
    }
    file.flush().await?;

    Ok(downloaded)
}

/// Unpack a gzip'd tar archive into `destination`, creating it if needed.
///
/// Entries that would land outside `destination` are skipped.
///
/// # Errors
///
/// Returns [`JobError::Archive`] for a corrupt archive and
/// [`JobError::Io`] when the destination cannot be created.
pub fn extract_archive(archive: &Path, destination: &Path) -> JobResult<()> {
    std::fs::create_dir_all(destination)?;
    let file = std::fs::File::open(archive)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(destination)
        .map_err(|err| JobError::Archive(err.to_string()))
}

/// Download the archive at `url` and extract it into `models_dir`.
///
/// # Errors
///
/// Any transport, filesystem or archive failure; nothing is promoted into
/// `models_dir` unless the whole archive was received.
pub async fn download_and_extract(
    source: &dyn ArchiveSource,
    url: &str,
    models_dir: &Path,
    report_interval: Duration,
    progress: &ProgressSender,
) -> JobResult<()> {
    let download = source.open(url).await?;

    let scratch = tempfile::tempdir()?;
    let archive_path = scratch.path().join(ARCHIVE_NAME);
    let bytes = fetch_archive(download, &archive_path, report_interval, progress).await?;
    info!(url, bytes, "Archive downloaded");
    progress.send("Download complete");

    let destination: PathBuf = models_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive(&archive_path, &destination))
        .await
        .map_err(|err| JobError::failed(format!("Extraction did not finish: {err}")))??;
    drop(scratch);

    info!(models_dir = %models_dir.display(), "Archive extracted");
    progress.send("Model extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::progress_channel;
    use crate::jobs::{Job, JobRunner, ResourceKey};
    use crate::testing::{model_archive, model_archive_of_size, ScriptedArchiveSource};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_progress_reported_for_spaced_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedArchiveSource::new(Some(1000))
            .chunk_after(Duration::from_millis(1100), vec![0_u8; 500])
            .chunk_after(Duration::from_millis(1100), vec![0_u8; 500]);
        let (tx, rx) = progress_channel();

        let written = fetch_archive(
            source.open("http://models.test/en.tar.gz").await.unwrap(),
            &dir.path().join(ARCHIVE_NAME),
            Duration::from_secs(1),
            &tx,
        )
        .await
        .unwrap();
        tx.close();

        assert_eq!(written, 1000);
        assert_eq!(
            rx.collect_lines().await,
            vec!["Expecting 1000 byte(s)", "50%", "100%"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_job_streams_complete_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let models_dir = dir.path().join("models");
        let archive = model_archive_of_size("en-test", 1000);
        let source = Arc::new(
            ScriptedArchiveSource::new(Some(1000))
                .chunk_after(Duration::from_millis(1100), archive[..500].to_vec())
                .chunk_after(Duration::from_millis(1100), archive[500..].to_vec()),
        );

        let runner = JobRunner::default();
        let rx = {
            let models_dir = models_dir.clone();
            runner.spawn(
                Job::new(ResourceKey::download("en-test")),
                None,
                move |progress| async move {
                    download_and_extract(
                        &*source,
                        "http://models.test/en-test.tar.gz",
                        &models_dir,
                        Duration::from_secs(1),
                        &progress,
                    )
                    .await
                },
            )
        };

        assert_eq!(
            rx.collect_lines().await,
            vec![
                "Expecting 1000 byte(s)",
                "50%",
                "100%",
                "Download complete",
                "Model extracted",
                "Return to models page to continue",
            ]
        );
        assert!(models_dir.join("en-test/model.conf").is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_chunks_are_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ScriptedArchiveSource::new(None);
        for _ in 0..10 {
            source = source.chunk_after(Duration::from_millis(300), vec![1_u8; 10]);
        }
        let (tx, rx) = progress_channel();

        fetch_archive(
            source.open("http://models.test/en.tar.gz").await.unwrap(),
            &dir.path().join(ARCHIVE_NAME),
            Duration::from_secs(1),
            &tx,
        )
        .await
        .unwrap();
        tx.close();

        // Chunks land every 300ms; reports fire at 1.2s and 2.4s.
        assert_eq!(
            rx.collect_lines().await,
            vec!["Bytes downloaded: 40", "Bytes downloaded: 80"]
        );
    }

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(500, Some(1000)), "50%");
        assert_eq!(progress_line(999, Some(1000)), "99%");
        assert_eq!(progress_line(12, Some(0)), "Bytes downloaded: 12");
        assert_eq!(progress_line(12, None), "Bytes downloaded: 12");
    }

    #[tokio::test]
    async fn test_download_and_extract_unpacks_model() {
        let dir = tempfile::tempdir().unwrap();
        let archive = model_archive("en-test");
        let source = ScriptedArchiveSource::new(Some(archive.len() as u64))
            .chunk_after(Duration::ZERO, archive);
        let (tx, rx) = progress_channel();

        download_and_extract(
            &source,
            "http://models.test/en-test.tar.gz",
            &dir.path().join("models"),
            Duration::from_secs(1),
            &tx,
        )
        .await
        .unwrap();
        tx.close();

        let lines = rx.collect_lines().await;
        assert!(lines[0].starts_with("Expecting "));
        assert_eq!(&lines[lines.len() - 2..], ["Download complete", "Model extracted"]);
        assert!(dir.path().join("models/en-test/model.conf").is_file());
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails_after_download() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedArchiveSource::new(None)
            .chunk_after(Duration::ZERO, b"definitely not gzip".to_vec());
        let (tx, rx) = progress_channel();

        let err = download_and_extract(
            &source,
            "http://models.test/en-test.tar.gz",
            &dir.path().join("models"),
            Duration::from_secs(1),
            &tx,
        )
        .await
        .unwrap_err();
        tx.close();

        assert!(matches!(err, JobError::Archive(_)));
        assert_eq!(rx.collect_lines().await, vec!["Download complete"]);
    }

    #[tokio::test]
    async fn test_transport_error_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScriptedArchiveSource::new(Some(100))
            .chunk_after(Duration::ZERO, vec![0_u8; 10])
            .fail_with("connection reset by peer");
        let (tx, rx) = progress_channel();

        let err = download_and_extract(
            &source,
            "http://models.test/en-test.tar.gz",
            &dir.path().join("models"),
            Duration::from_secs(1),
            &tx,
        )
        .await
        .unwrap_err();
        tx.close();

        assert_eq!(err.to_string(), "connection reset by peer");
        assert_eq!(rx.collect_lines().await, vec!["Expecting 100 byte(s)"]);
        assert!(!dir.path().join("models").exists());
    }
}
