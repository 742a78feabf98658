//! Test server utilities using axum-test

use crate::config::VoxtrainConfig;
use crate::download::ArchiveSource;
use crate::handlers::router;
use crate::state::AppState;
use crate::training::Trainer;
use std::sync::Arc;

/// Test server wrapper for integration testing
///
/// A thin wrapper around `axum_test::TestServer` that keeps the
/// [`AppState`] reachable so tests can inspect the runner and guard.
pub struct TestServer {
    inner: axum_test::TestServer,
    state: AppState,
}

impl TestServer {
    /// Serve the full router over `state`
    pub fn new(state: AppState) -> Self {
        let inner = axum_test::TestServer::new(router(state.clone())).unwrap();
        Self { inner, state }
    }

    /// Serve the full router with the given collaborators
    pub fn with_collaborators(
        config: VoxtrainConfig,
        archives: Arc<dyn ArchiveSource>,
        trainer: Arc<dyn Trainer>,
    ) -> Self {
        Self::new(AppState::with_collaborators(config, archives, trainer).unwrap())
    }

    /// State behind the router
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Make a GET request to the server
    pub fn get(&self, path: &str) -> axum_test::TestRequest {
        self.inner.get(path)
    }

    /// Make a POST request to the server
    pub fn post(&self, path: &str) -> axum_test::TestRequest {
        self.inner.post(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_serves_liveness() {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::new(crate::testing::test_state(dir.path()));

        let response = server.get("/health/live").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::new(crate::testing::test_state(dir.path()));

        server.get("/api/nope").await.assert_status_not_found();
    }
}
