//! Axum routes for block and manifest storage
//!
//! ```text
//! GET  /healthz             readiness probe
//! HEAD /blocks/:id          200 | 404
//! PUT  /blocks/:id          idempotent insert
//! GET  /blocks/:id          200 + bytes | 404
//! HEAD /manifests/:id       200 | 404
//! PUT  /manifests/:id       idempotent insert
//! GET  /manifests/:id       200 + bytes | 404
//! ```
//!
//! Axum answers HEAD on the GET routes automatically, dropping the body.
//! Store I/O runs on the blocking pool so request workers never stall on
//! the filesystem.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use shard::{LocalStore, ShardError};

/// Shared handler state: the store every request operates on
#[derive(Clone)]
pub struct ServerState {
    store: Arc<LocalStore>,
}

impl ServerState {
    /// Wrap an initialized store for request handlers
    pub fn new(store: LocalStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Build the router for a store
pub fn app(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/blocks/:id", get(get_block).put(put_block))
        .route("/manifests/:id", get(get_manifest).put(put_manifest))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the protocol on an already-bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: ServerState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}

async fn healthz() -> &'static str {
    "ok"
}

fn status_for(e: &ShardError) -> StatusCode {
    match e {
        ShardError::NotFound { .. } => StatusCode::NOT_FOUND,
        ShardError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run a blocking store operation off the async workers
async fn run_store<T, F>(operation: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce() -> shard::Result<T> + Send + 'static,
{
    let result = tokio::task::spawn_blocking(operation).await.map_err(|e| {
        error!(error = %e, "store task panicked");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    result.map_err(|e| {
        let status = status_for(&e);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %e, "store operation failed");
        } else {
            warn!(error = %e, status = %status, "request rejected");
        }
        status
    })
}

async fn get_block(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Bytes, StatusCode> {
    let store = state.store.clone();
    let bytes = run_store(move || store.read_object(&id)).await?;
    Ok(Bytes::from(bytes))
}

async fn put_block(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let store = state.store.clone();
    run_store(move || store.write_object(&id, &body)).await?;
    Ok(StatusCode::OK)
}

async fn get_manifest(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Bytes, StatusCode> {
    let store = state.store.clone();
    let bytes = run_store(move || store.read_manifest(&id)).await?;
    Ok(Bytes::from(bytes))
}

async fn put_manifest(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, StatusCode> {
    let store = state.store.clone();
    run_store(move || store.write_manifest(&id, &body)).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_state_shares_one_store() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("storage"));
        store.init().unwrap();

        let state = ServerState::new(store);
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.store, &cloned.store));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ShardError::NotFound {
                id: "ab".repeat(32)
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ShardError::InvalidIdentity("..".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ShardError::Codec("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
