use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{api_error, store_error, ApiError, Session};
use crate::{
    loyalty::LoyaltyStatus,
    models::*,
    pricing,
    repository::{Repository, RepositoryError},
    wizard::{BookingWizard, WizardError, WizardView},
    AppState,
};

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ── Shop, catalog, slots, gallery ──

/// GET /api/shop
pub async fn shop_info(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ShopInfo>> {
    Json(ApiResponse::success(state.shop.clone()))
}

/// GET /api/services
pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<ApiResponse<Vec<Service>>> {
    let repo = state.repo.lock().await;
    Json(ApiResponse::success(repo.services().to_vec()))
}

/// GET /api/slots?date=YYYY-MM-DD — every business hour with its occupancy
pub async fn day_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Json<ApiResponse<Vec<SlotView>>> {
    let repo = state.repo.lock().await;
    Json(ApiResponse::success(pricing::day_slots(
        repo.appointments(),
        query.date,
    )))
}

/// GET /api/gallery?category=haircut
pub async fn list_gallery(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GalleryQuery>,
) -> Json<ApiResponse<Vec<GalleryItem>>> {
    let repo = state.repo.lock().await;
    let items = repo
        .gallery()
        .iter()
        .filter(|item| query.category.is_none() || query.category == Some(item.category))
        .cloned()
        .collect();
    Json(ApiResponse::success(items))
}

// ── Booking wizard ──

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub id: String,
    #[serde(flatten)]
    pub view: WizardView,
}

fn draft_not_found() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Agendamento não encontrado")
}

fn wizard_error(e: WizardError) -> ApiError {
    api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

fn draft_response(
    state: &AppState,
    repo: &Repository,
    id: &str,
    wizard: &BookingWizard,
) -> DraftResponse {
    DraftResponse {
        id: id.to_string(),
        view: wizard.view(
            repo.appointments(),
            repo.services(),
            today(),
            &state.shop.pix_key,
        ),
    }
}

/// Apply `edit` to a draft and return its refreshed view. A rejected edit
/// leaves the draft as it was.
fn edit_draft(
    state: &AppState,
    repo: &Repository,
    id: &str,
    edit: impl FnOnce(&mut BookingWizard) -> Result<(), WizardError>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let mut session = state.drafts.get_mut(id).ok_or_else(draft_not_found)?;
    session.touch();
    edit(&mut session.value).map_err(wizard_error)?;
    Ok(Json(ApiResponse::success(draft_response(
        state,
        repo,
        id,
        &session.value,
    ))))
}

/// POST /api/bookings/drafts — start a new booking at step 1
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<DraftResponse>> {
    let id = uuid::Uuid::new_v4().to_string();
    let wizard = BookingWizard::new(today());

    let repo = state.repo.lock().await;
    let response = draft_response(&state, &repo, &id, &wizard);
    state.drafts.insert(id.clone(), Session::new(wizard));
    tracing::debug!(draft_id = %id, "Booking draft opened");

    Json(ApiResponse::success(response))
}

/// GET /api/bookings/drafts/:id
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |_| Ok(()))
}

/// PUT /api/bookings/drafts/:id/time
pub async fn choose_time(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ChooseTimeRequest>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| {
        wizard.choose_time(body.date, &body.time)
    })
}

/// PUT /api/bookings/drafts/:id/service
pub async fn choose_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ChooseServiceRequest>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| wizard.choose_service(body.service))
}

/// PUT /api/bookings/drafts/:id/details — also refreshes loyalty status
pub async fn enter_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DetailsRequest>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| {
        wizard.enter_details(
            repo.appointments(),
            &body.customer_name,
            &body.phone,
            body.address.as_deref(),
        )
    })
}

/// PUT /api/bookings/drafts/:id/payment
pub async fn choose_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| {
        wizard.choose_payment(body.payment_method)
    })
}

/// POST /api/bookings/drafts/:id/next
pub async fn next_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| {
        wizard.advance(repo.appointments(), today()).map(|_| ())
    })
}

/// POST /api/bookings/drafts/:id/back
pub async fn previous_step(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<DraftResponse>>, ApiError> {
    let repo = state.repo.lock().await;
    edit_draft(&state, &repo, &id, |wizard| wizard.back().map(|_| ()))
}

/// POST /api/bookings/drafts/:id/submit — persist the appointment
///
/// The draft survives a rejected submit so the customer can go back and
/// pick another time.
pub async fn submit_draft(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Appointment>>, ApiError> {
    let mut repo = state.repo.lock().await;

    let appointment = {
        let session = state.drafts.get(&id).ok_or_else(draft_not_found)?;
        session
            .value
            .submit(
                repo.appointments(),
                repo.services(),
                uuid::Uuid::new_v4().to_string(),
                Utc::now(),
            )
            .map_err(wizard_error)?
    };

    match repo.add_appointment(appointment.clone()).await {
        Ok(()) => {}
        Err(RepositoryError::SlotTaken) => {
            return Err(api_error(
                StatusCode::CONFLICT,
                "Esse horário acabou de ser reservado. Volte e escolha outro.",
            ));
        }
        Err(RepositoryError::Store(e)) => return Err(store_error(e)),
    }

    state.drafts.remove(&id);
    Ok(Json(ApiResponse::success(appointment)))
}

// ── Customer portal ──

/// GET /api/customers/:phone — booking history and loyalty card
pub async fn customer_portal(
    State(state): State<Arc<AppState>>,
    Path(phone): Path<String>,
) -> Result<Json<ApiResponse<CustomerPortal>>, ApiError> {
    let phone = phone.trim().to_string();
    if phone.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Informe seu WhatsApp"));
    }

    let repo = state.repo.lock().await;
    let mut appointments: Vec<Appointment> = repo
        .appointments()
        .iter()
        .filter(|app| app.phone == phone)
        .cloned()
        .collect();
    appointments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let loyalty = LoyaltyStatus::for_phone(repo.appointments(), &phone);

    Ok(Json(ApiResponse::success(CustomerPortal {
        phone,
        appointments,
        loyalty,
    })))
}

/// GET /api/customer/session — phone remembered from the last portal login
pub async fn get_customer_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CustomerSession>>, ApiError> {
    let repo = state.repo.lock().await;
    let phone = repo.customer_phone().await.map_err(store_error)?;
    Ok(Json(ApiResponse::success(CustomerSession { phone })))
}

/// PUT /api/customer/session
pub async fn set_customer_session(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CustomerSessionRequest>,
) -> Result<Json<ApiResponse<CustomerSession>>, ApiError> {
    let phone = body.phone.trim();
    if phone.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Informe seu WhatsApp"));
    }

    let repo = state.repo.lock().await;
    repo.set_customer_phone(phone).await.map_err(store_error)?;
    Ok(Json(ApiResponse::success(CustomerSession {
        phone: Some(phone.to_string()),
    })))
}

/// DELETE /api/customer/session — "Sair"
pub async fn clear_customer_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CustomerSession>>, ApiError> {
    let repo = state.repo.lock().await;
    repo.clear_customer_phone().await.map_err(store_error)?;
    Ok(Json(ApiResponse::success(CustomerSession { phone: None })))
}
