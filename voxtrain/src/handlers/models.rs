//! Model management endpoints.

use super::ModelQuery;
use crate::error::VoxtrainResult;
use crate::jobs::ResourceKey;
use crate::models::ModelStatus;
use crate::sentences;
use crate::state::AppState;
use crate::streaming::CONTENT_TYPE;
use crate::transcriber::Transcriber;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

/// `GET /api/models`
#[allow(clippy::unused_async)]
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelStatus>> {
    let storage = &state.config().storage;
    let statuses = state
        .models()
        .iter()
        .map(|model| {
            let loaded = state
                .guard()
                .cached(&ResourceKey::train(&model.id))
                .is_some();
            ModelStatus::inspect(model, storage, loaded)
        })
        .collect();
    Json(statuses)
}

/// `GET /api/sentences?id=<model>`
pub async fn get_sentences(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> VoxtrainResult<impl IntoResponse> {
    let model = state.models().resolve(&query.id)?;
    let text = sentences::read(&state.config().storage.sentences_path(&model.id)).await?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], text))
}

/// `POST /api/sentences?id=<model>` with the YAML as a plain-text body
///
/// A loaded transcriber picks up the new skip words immediately.
pub async fn save_sentences(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
    body: String,
) -> VoxtrainResult<StatusCode> {
    let model = state.models().resolve(&query.id)?;
    let saved = sentences::write(&state.config().storage.sentences_path(&model.id), &body).await?;

    let skip_words = saved.skip_words;
    let refreshed = state
        .guard()
        .update_cached(&ResourceKey::train(&model.id), move |transcriber| {
            transcriber.with_skip_words(skip_words)
        })
        .await;
    if refreshed {
        tracing::debug!(model_id = %model.id, "Refreshed transcriber skip words");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/transcriber?id=<model>`
///
/// Loads the model's transcriber, or returns the cached one. Refused with
/// `409` while the model is being trained.
pub async fn load_transcriber(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> VoxtrainResult<Json<Transcriber>> {
    let model_id = state.models().resolve(&query.id)?.id.clone();
    let storage = &state.config().storage;

    let transcriber = state
        .guard()
        .get_or_load(&ResourceKey::train(&model_id), || {
            Transcriber::load(storage, &model_id)
        })
        .await?;
    Ok(Json(Transcriber::clone(&transcriber)))
}

#[cfg(test)]
mod tests {
    use crate::jobs::ResourceKey;
    use crate::testing::{test_config, ScriptedArchiveSource, TestServer};
    use crate::training::MockTrainer;
    use axum::http::StatusCode;
    use std::sync::Arc;

    const SENTENCES: &str = "sentences:\n  - turn on the light\nskip_words: [um]\n";

    fn server(root: &std::path::Path) -> TestServer {
        TestServer::with_collaborators(
            test_config(root),
            Arc::new(ScriptedArchiveSource::new(None)),
            Arc::new(MockTrainer::new()),
        )
    }

    #[tokio::test]
    async fn test_sentences_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = server.get("/api/sentences?id=en-test").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "");

        server
            .post("/api/sentences?id=en-test")
            .text(SENTENCES)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let response = server.get("/api/sentences?id=en-test").await;
        assert_eq!(response.text(), SENTENCES);
    }

    #[tokio::test]
    async fn test_invalid_sentences_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = server
            .post("/api/sentences?id=en-test")
            .text("skip_words: [um]\n")
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.text(), "ERROR: Missing sentences block\n");
    }

    #[tokio::test]
    async fn test_models_listing_reflects_state() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let models: serde_json::Value = server.get("/api/models").await.json();
        assert_eq!(models[0]["id"], "en-test");
        assert_eq!(models[0]["downloaded"], false);
        assert_eq!(models[0]["loaded"], false);

        std::fs::create_dir_all(dir.path().join("models/en-test")).unwrap();
        std::fs::create_dir_all(dir.path().join("train/en-test")).unwrap();
        server
            .post("/api/transcriber?id=en-test")
            .await
            .assert_status_ok();

        let models: serde_json::Value = server.get("/api/models").await.json();
        assert_eq!(models[0]["downloaded"], true);
        assert_eq!(models[0]["loaded"], true);
    }

    #[tokio::test]
    async fn test_transcriber_refused_while_training() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models/en-test")).unwrap();
        std::fs::create_dir_all(dir.path().join("train/en-test")).unwrap();
        let server = server(dir.path());

        let scope = server
            .state()
            .guard()
            .try_begin_exclusive(ResourceKey::train("en-test"))
            .await
            .unwrap();
        let response = server.post("/api/transcriber?id=en-test").await;
        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            response.text(),
            "ERROR: A train job is already running for en-test\n"
        );

        drop(scope);
        let transcriber: serde_json::Value =
            server.post("/api/transcriber?id=en-test").await.json();
        assert_eq!(transcriber["model_id"], "en-test");
    }

    #[tokio::test]
    async fn test_transcriber_for_missing_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = server.post("/api/transcriber?id=en-test").await;
        response.assert_status_not_found();
        assert_eq!(response.text(), "ERROR: Model not downloaded: en-test\n");
    }

    #[tokio::test]
    async fn test_saving_sentences_refreshes_loaded_skip_words() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models/en-test")).unwrap();
        std::fs::create_dir_all(dir.path().join("train/en-test")).unwrap();
        let server = server(dir.path());

        server
            .post("/api/sentences?id=en-test")
            .text(SENTENCES)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let loaded: serde_json::Value = server.post("/api/transcriber?id=en-test").await.json();
        assert_eq!(loaded["skip_words"], serde_json::json!(["um"]));

        server
            .post("/api/sentences?id=en-test")
            .text("sentences:\n  - turn on the light\nskip_words: [uh]\n")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let cached = server
            .state()
            .guard()
            .cached(&ResourceKey::train("en-test"))
            .unwrap();
        assert_eq!(cached.skip_words, vec!["uh"]);

        let models: serde_json::Value = server.get("/api/models").await.json();
        assert_eq!(models[0]["loaded"], true);
    }

    #[tokio::test]
    async fn test_overlapping_transcriber_loads_both_succeed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models/en-test")).unwrap();
        std::fs::create_dir_all(dir.path().join("train/en-test")).unwrap();
        let server = server(dir.path());

        let (first, second) = tokio::join!(
            async { server.post("/api/transcriber?id=en-test").await },
            async { server.post("/api/transcriber?id=en-test").await },
        );
        first.assert_status_ok();
        second.assert_status_ok();
        assert!(!server.state().guard().is_held(&ResourceKey::train("en-test")));
    }
}
