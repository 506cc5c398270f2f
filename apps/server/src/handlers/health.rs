use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub store_ok: bool,
    pub open_drafts: usize,
    pub open_chats: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store_ok = {
        let store = state.repo.lock().await.store().clone();
        store.ping().await
    };

    Json(HealthResponse {
        status: if store_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        store_ok,
        open_drafts: state.drafts.len(),
        open_chats: state.chats.len(),
    })
}
