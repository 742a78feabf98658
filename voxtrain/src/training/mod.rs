//! Model training through an external program.
//!
//! Training is blocking work: [`Trainer::train`] runs on the blocking pool and
//! forwards every line the trainer prints as a progress line.

use crate::config::{StorageSettings, TrainingSettings};
use crate::jobs::{JobError, JobResult, ProgressSender};
use crate::models::language_of;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Locations of the speech toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Kaldi installation
    pub kaldi_dir: PathBuf,
    /// Phonetisaurus binary
    pub phonetisaurus_bin: PathBuf,
    /// OpenGRM installation
    pub opengrm_dir: PathBuf,
    /// OpenFST installation
    pub openfst_dir: PathBuf,
}

impl ToolPaths {
    /// Standard layout below `tools_dir`.
    #[must_use]
    pub fn under(tools_dir: &Path) -> Self {
        Self {
            kaldi_dir: tools_dir.join("kaldi"),
            phonetisaurus_bin: tools_dir.join("phonetisaurus"),
            opengrm_dir: tools_dir.join("opengrm"),
            openfst_dir: tools_dir.join("openfst"),
        }
    }
}

/// Everything a trainer needs for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainRequest {
    /// Model being trained
    pub model_id: String,
    /// Language code derived from the model id
    pub language: String,
    /// Sentence templates to train on
    pub sentence_files: Vec<PathBuf>,
    /// Extracted model
    pub model_dir: PathBuf,
    /// Output directory
    pub train_dir: PathBuf,
    /// Toolchain locations
    pub tools: ToolPaths,
}

impl TrainRequest {
    /// Build the request for `model_id` from the storage layout.
    #[must_use]
    pub fn for_model(storage: &StorageSettings, model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            language: language_of(model_id).to_string(),
            sentence_files: vec![storage.sentences_path(model_id)],
            model_dir: storage.model_dir(model_id),
            train_dir: storage.model_train_dir(model_id),
            tools: ToolPaths::under(&storage.tools_dir),
        }
    }

    fn arguments(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--language".into(), self.language.clone().into()];
        for file in &self.sentence_files {
            args.push("--sentences".into());
            args.push(file.into());
        }
        for (flag, path) in [
            ("--kaldi-dir", &self.tools.kaldi_dir),
            ("--model-dir", &self.model_dir),
            ("--train-dir", &self.train_dir),
            ("--phonetisaurus-bin", &self.tools.phonetisaurus_bin),
            ("--opengrm-dir", &self.tools.opengrm_dir),
            ("--openfst-dir", &self.tools.openfst_dir),
        ] {
            args.push(flag.into());
            args.push(path.into());
        }
        args
    }
}

/// Trains a model, emitting log lines as it goes. Blocking.
#[cfg_attr(test, mockall::automock)]
pub trait Trainer: Send + Sync {
    /// Run training for `request`.
    ///
    /// # Errors
    ///
    /// Any failure; its message becomes the job's `ERROR:` line.
    fn train(&self, request: &TrainRequest, progress: &ProgressSender) -> JobResult<()>;
}

/// Runs an external training program.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandTrainer {
    /// Trainer for the configured program.
    #[must_use]
    pub fn new(settings: &TrainingSettings) -> Self {
        Self {
            program: settings.program.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }

    fn spawn_error(&self, err: &std::io::Error) -> JobError {
        if err.kind() == std::io::ErrorKind::NotFound {
            JobError::Training(format!("{} not found", self.program.display()))
        } else {
            JobError::Training(format!("{}: {err}", self.program.display()))
        }
    }
}

impl Trainer for CommandTrainer {
    fn train(&self, request: &TrainRequest, progress: &ProgressSender) -> JobResult<()> {
        let started = Instant::now();
        std::fs::create_dir_all(&request.train_dir)?;

        let mut child = Command::new(&self.program)
            .args(&self.extra_args)
            .args(request.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(&err))?;
        info!(
            model_id = %request.model_id,
            program = %self.program.display(),
            pid = child.id(),
            "Training program started"
        );

        let stderr_pump = child.stderr.take().map(|stderr| {
            let progress = progress.clone();
            std::thread::spawn(move || forward_lines(stderr, &progress))
        });
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, progress);
        }
        if let Some(pump) = stderr_pump {
            if pump.join().is_err() {
                warn!(model_id = %request.model_id, "stderr reader thread panicked");
            }
        }

        let status = child.wait()?;
        debug!(
            model_id = %request.model_id,
            seconds = started.elapsed().as_secs_f64(),
            %status,
            "Training program finished"
        );
        if status.success() {
            Ok(())
        } else {
            Err(JobError::Training(format!("training exited with {status}")))
        }
    }
}

/// Send each line of `reader` as a progress line until EOF or a read error.
fn forward_lines<R: Read>(reader: R, progress: &ProgressSender) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                progress.send(line.trim_end_matches(['\n', '\r']));
            }
            Err(err) => {
                warn!(error = %err, "Stopped reading trainer output");
                break;
            }
        }
    }
}
