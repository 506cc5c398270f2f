pub mod admin;
pub mod chat;
pub mod client;
pub mod health;

use axum::{http::StatusCode, Json};
use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ApiResponse::error(msg)))
}

/// Log a persistence failure and hide the details from the client.
pub fn store_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %e, "Store write failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "DB error")
}

/// Server-held per-client state (wizard drafts, chat transcripts).
#[derive(Debug)]
pub struct Session<T> {
    pub value: T,
    touched: Instant,
}

impl<T> Session<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            touched: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.touched = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.touched.elapsed()
    }
}

/// Drop sessions nobody touched within `max_idle`. Returns how many went.
pub fn purge_idle<T>(sessions: &DashMap<String, Session<T>>, max_idle: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, session| session.idle_for() < max_idle);
    before - sessions.len()
}
