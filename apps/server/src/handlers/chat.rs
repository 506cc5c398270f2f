use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::{api_error, ApiError, Session};
use crate::{
    assistant::{ChatEntry, ChatTranscript},
    models::{ApiResponse, ChatMessageRequest},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: String,
    pub entries: Vec<ChatEntry>,
    pub waiting: bool,
}

impl ChatView {
    fn new(id: &str, transcript: &ChatTranscript) -> Self {
        Self {
            id: id.to_string(),
            entries: transcript.entries().to_vec(),
            waiting: transcript.is_waiting(),
        }
    }
}

fn chat_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Conversa não encontrada")
}

/// POST /api/chat — open a conversation with the greeting
pub async fn create_chat(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ChatView>> {
    let id = uuid::Uuid::new_v4().to_string();
    let transcript = ChatTranscript::new();
    let view = ChatView::new(&id, &transcript);
    state.chats.insert(id, Session::new(transcript));
    Json(ApiResponse::success(view))
}

/// GET /api/chat/:id
pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ChatView>>, ApiError> {
    let session = state.chats.get(&id).ok_or_else(chat_not_found)?;
    Ok(Json(ApiResponse::success(ChatView::new(&id, &session.value))))
}

/// POST /api/chat/:id/messages — ask and wait for the reply
///
/// The transcript is only locked to record the question and the answer,
/// never across the remote call, so several questions can be in flight.
/// Each answer fills the slot its question reserved.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ChatMessageRequest>,
) -> Result<Json<ApiResponse<ChatView>>, ApiError> {
    let question = body.message.trim().to_string();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Mensagem vazia"));
    }

    let ticket = {
        let mut session = state.chats.get_mut(&id).ok_or_else(chat_not_found)?;
        session.touch();
        session
            .value
            .ask(&question)
            .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Mensagem vazia"))?
    };

    let reply = state.assistant.advise(&question).await;

    // The conversation may have been purged while we waited.
    let mut session = state.chats.get_mut(&id).ok_or_else(chat_not_found)?;
    session.value.resolve(ticket, reply);
    session.touch();
    Ok(Json(ApiResponse::success(ChatView::new(&id, &session.value))))
}
