//! Job endpoints: start a download or training job and stream its progress.
//!
//! Everything that can go wrong before the job starts (unknown model, bad
//! id, busy key under the `reject` policy) is answered with a single
//! `ERROR:` line and a 4xx status. Once the job is running, the response is
//! always `200` and failures arrive as the final streamed line.

use super::ModelQuery;
use crate::download::download_and_extract;
use crate::error::VoxtrainResult;
use crate::jobs::{Job, JobSnapshot, ResourceKey};
use crate::state::AppState;
use crate::streaming::ProgressStream;
use crate::training::TrainRequest;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

/// `POST /api/download?id=<model>`
pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> VoxtrainResult<ProgressStream> {
    let model = state.models().resolve(&query.id)?.clone();
    let key = ResourceKey::download(&model.id);
    let scope = state.begin_job(key.clone()).await?;

    let archives = state.archives();
    let models_dir = state.config().storage.models_dir.clone();
    let interval = state.config().jobs.report_interval();

    let progress = state
        .runner()
        .spawn(Job::new(key), Some(scope), move |progress| async move {
            download_and_extract(archives.as_ref(), &model.url, &models_dir, interval, &progress)
                .await
        });
    Ok(ProgressStream::new(progress))
}

/// `POST /api/train?id=<model>`
///
/// Acquiring the `train:<id>` key drops the model's cached transcriber
/// before the trainer touches any file.
pub async fn train(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> VoxtrainResult<ProgressStream> {
    let model_id = state.models().resolve(&query.id)?.id.clone();
    let key = ResourceKey::train(&model_id);
    let scope = state.begin_job(key.clone()).await?;

    let request = TrainRequest::for_model(&state.config().storage, &model_id);
    let trainer = state.trainer();

    let progress = state
        .runner()
        .spawn_blocking(Job::new(key), Some(scope), move |progress| {
            trainer.train(&request, &progress)
        });
    Ok(ProgressStream::new(progress))
}

/// Body of `GET /api/jobs`
#[derive(Debug, Serialize, Deserialize)]
pub struct JobsOverview {
    /// Jobs still running, oldest first
    pub active: Vec<JobSnapshot>,
    /// Finished jobs, newest first
    pub recent: Vec<JobSnapshot>,
}

/// `GET /api/jobs`
#[allow(clippy::unused_async)]
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsOverview> {
    Json(JobsOverview {
        active: state.runner().active_jobs(),
        recent: state.runner().recent_jobs(),
    })
}
