use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use super::{api_error, store_error, ApiError};
use crate::{
    auth,
    models::*,
    pricing::{self, PriceParseError},
    AppState,
};

/// Helper: reject requests without a valid admin session token
fn extract_admin(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

    if !auth::is_admin_header(header, &state.admin_passphrase) {
        return Err(api_error(StatusCode::FORBIDDEN, "Acesso negado"));
    }
    Ok(())
}

fn require_confirm(query: &ConfirmQuery) -> Result<(), ApiError> {
    if query.confirm {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            "Confirme a exclusão com confirm=true",
        ))
    }
}

/// POST /api/admin/login — trade the passphrase for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if !auth::check_passphrase(&body.passphrase, &state.admin_passphrase) {
        tracing::warn!("Admin login rejected");
        return Err(api_error(StatusCode::UNAUTHORIZED, "Senha incorreta"));
    }

    tracing::info!("Admin logged in");
    Ok(Json(ApiResponse::success(LoginResponse {
        token: auth::session_token(&state.admin_passphrase),
    })))
}

/// GET /api/admin/appointments — every appointment plus revenue figures
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<AdminDashboard>>, ApiError> {
    extract_admin(&headers, &state)?;

    let repo = state.repo.lock().await;
    let completed_count = repo.appointments().iter().filter(|app| app.completed).count();
    let revenue_cents = pricing::revenue_total(repo.appointments());
    let appointments = repo
        .appointments()
        .iter()
        .map(|app| AdminAppointment {
            confirm_url: app.confirmation_link(&state.shop.barber_name),
            appointment: app.clone(),
        })
        .collect();

    Ok(Json(ApiResponse::success(AdminDashboard {
        appointments,
        completed_count,
        revenue_cents,
        revenue_label: format_cents(revenue_cents),
    })))
}

/// POST /api/admin/appointments/:id/toggle — flip the completed flag
pub async fn toggle_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    extract_admin(&headers, &state)?;

    let mut repo = state.repo.lock().await;
    let completed = repo
        .toggle_completed(&id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Agendamento não encontrado"))?;

    Ok(Json(ApiResponse::success(completed)))
}

/// DELETE /api/admin/appointments/:id?confirm=true
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    extract_admin(&headers, &state)?;
    require_confirm(&query)?;

    let mut repo = state.repo.lock().await;
    if !repo.remove_appointment(&id).await.map_err(store_error)? {
        return Err(api_error(StatusCode::NOT_FOUND, "Agendamento não encontrado"));
    }

    Ok(Json(ApiResponse::success("Agendamento excluído")))
}

/// PUT /api/admin/services/:id — edit price and description
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, ApiError> {
    extract_admin(&headers, &state)?;

    let price = pricing::parse_price_input(&body.price).map_err(|e| {
        let msg = match e {
            PriceParseError::Empty => "Informe o preço".to_string(),
            PriceParseError::Invalid(raw) => format!("Preço inválido: {}", raw),
            PriceParseError::TooLarge(raw) => format!("Preço acima do limite: {}", raw),
        };
        api_error(StatusCode::BAD_REQUEST, msg)
    })?;

    let mut repo = state.repo.lock().await;
    let service = repo
        .update_service(&id, price, body.description.trim())
        .await
        .map_err(store_error)?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Serviço não encontrado"))?;

    Ok(Json(ApiResponse::success(service)))
}

/// POST /api/admin/gallery — add a photo to the top of the gallery
pub async fn add_gallery_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AddGalleryItemRequest>,
) -> Result<Json<ApiResponse<GalleryItem>>, ApiError> {
    extract_admin(&headers, &state)?;

    let image_url = body.image_url.trim();
    if image_url.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Envie uma imagem"));
    }

    let barber_name = body
        .barber_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&state.shop.barber_name)
        .to_string();

    let item = GalleryItem {
        id: uuid::Uuid::new_v4().to_string(),
        image_url: image_url.to_string(),
        category: body.category,
        barber_name,
        description: body.description.trim().to_string(),
    };

    let mut repo = state.repo.lock().await;
    repo.add_gallery_item(item.clone())
        .await
        .map_err(store_error)?;

    Ok(Json(ApiResponse::success(item)))
}

/// DELETE /api/admin/gallery/:id?confirm=true
pub async fn remove_gallery_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<ApiResponse<&'static str>>, ApiError> {
    extract_admin(&headers, &state)?;
    require_confirm(&query)?;

    let mut repo = state.repo.lock().await;
    if !repo.remove_gallery_item(&id).await.map_err(store_error)? {
        return Err(api_error(StatusCode::NOT_FOUND, "Foto não encontrada"));
    }

    Ok(Json(ApiResponse::success("Foto removida")))
}
