mod assistant;
mod auth;
mod db;
mod handlers;
mod loyalty;
mod models;
mod pricing;
mod rate_limit;
mod repository;
mod wizard;

use anyhow::Context;
use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use dashmap::DashMap;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use assistant::{AdviceAssistant, ChatTranscript, GeminiClient, GeminiConfig};
use handlers::Session;
use models::ShopInfo;
use rate_limit::{rate_limit, RateLimiter, Tier};
use repository::Repository;
use wizard::BookingWizard;

/// Shared application state accessible from all handlers.
pub struct AppState {
    /// Every collection mutation goes through this lock, one at a time.
    pub repo: Mutex<Repository>,
    pub drafts: DashMap<String, Session<BookingWizard>>,
    pub chats: DashMap<String, Session<ChatTranscript>>,
    pub assistant: AdviceAssistant,
    pub admin_passphrase: String,
    pub shop: ShopInfo,
    pub started_at: Instant,
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;
/// Drafts and chats untouched for this long are dropped.
const SESSION_MAX_IDLE: Duration = Duration::from_secs(2 * 60 * 60);

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn shop_info_from_env() -> ShopInfo {
    ShopInfo {
        address: env_or(
            "SHOP_ADDRESS",
            "R. Manuel Vila D'Alba, 447 - Jardim das Oliveiras, São Paulo - SP, 08111-570",
        ),
        phone: env_or("SHOP_PHONE", "(11) 970570433"),
        pix_key: env_or("SHOP_PIX_KEY", "970570433"),
        instagram: env_or("SHOP_INSTAGRAM", "eovictormota"),
        barber_name: env_or("SHOP_BARBER_NAME", "Victor Mota"),
        business_hours: pricing::BUSINESS_HOURS.to_vec(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Tracing ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── Config ──
    let database_url = env_or("DATABASE_URL", "sqlite:barbershop.db?mode=rwc");
    let host = env_or("HOST", "0.0.0.0");
    let port = env_or("PORT", "3000");
    let admin_passphrase =
        std::env::var("ADMIN_PASSPHRASE").context("ADMIN_PASSPHRASE must be set")?;
    if admin_passphrase.is_empty() {
        anyhow::bail!("ADMIN_PASSPHRASE must not be empty");
    }
    let webapp_url = std::env::var("WEBAPP_URL").unwrap_or_default();

    let defaults = GeminiConfig::default();
    let gemini = GeminiConfig {
        api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
        model: env_or("GEMINI_MODEL", &defaults.model),
        endpoint: env_or("GEMINI_ENDPOINT", &defaults.endpoint),
        timeout_secs: env_or("ADVICE_TIMEOUT_SECS", "30")
            .parse()
            .context("ADVICE_TIMEOUT_SECS must be a number")?,
    };
    if gemini.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, style advice will answer with the fallback");
    }

    // ── Store ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;
    db::run_migrations(&pool).await?;

    let repo = Repository::load(db::KvStore::new(pool)).await?;
    tracing::info!(
        appointments = repo.appointments().len(),
        gallery = repo.gallery().len(),
        services = repo.services().len(),
        "Collections loaded"
    );

    let state = Arc::new(AppState {
        repo: Mutex::new(repo),
        drafts: DashMap::new(),
        chats: DashMap::new(),
        assistant: AdviceAssistant::new(Arc::new(GeminiClient::new(gemini)?)),
        admin_passphrase,
        shop: shop_info_from_env(),
        started_at: Instant::now(),
    });

    let rate_limiter = RateLimiter::with_defaults();

    // ── Background task: cleanup stale rate limit entries and idle sessions ──
    let cleanup_limiter = rate_limiter.clone();
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
            let drafts = handlers::purge_idle(&cleanup_state.drafts, SESSION_MAX_IDLE);
            let chats = handlers::purge_idle(&cleanup_state.chats, SESSION_MAX_IDLE);
            if drafts + chats > 0 {
                tracing::info!(drafts, chats, "Purged idle sessions");
            }
        }
    });

    // ── CORS: whitelist WEBAPP_URL when configured, otherwise allow any ──
    let cors = if !webapp_url.is_empty() {
        let origins: Vec<HeaderValue> = vec![
            webapp_url
                .parse()
                .context("WEBAPP_URL must be a valid header value")?,
            HeaderValue::from_static("http://localhost:5173"), // Vite dev server
        ];
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = build_router(state, &rate_limiter).layer(cors);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Barbershop server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// All routes, grouped by rate-limit tier.
fn build_router(state: Arc<AppState>, rate_limiter: &RateLimiter) -> Router {
    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only endpoints
    let public_routes = Router::new()
        .route("/api/shop", get(handlers::client::shop_info))
        .route("/api/services", get(handlers::client::list_services))
        .route("/api/slots", get(handlers::client::day_slots))
        .route("/api/gallery", get(handlers::client::list_gallery))
        .layer(from_fn_with_state(rate_limiter.guard(Tier::Public), rate_limit));

    // 3. Booking: wizard drafts, customer portal and remembered phone
    let booking_routes = Router::new()
        .route("/api/bookings/drafts", post(handlers::client::create_draft))
        .route("/api/bookings/drafts/{id}", get(handlers::client::get_draft))
        .route(
            "/api/bookings/drafts/{id}/time",
            put(handlers::client::choose_time),
        )
        .route(
            "/api/bookings/drafts/{id}/service",
            put(handlers::client::choose_service),
        )
        .route(
            "/api/bookings/drafts/{id}/details",
            put(handlers::client::enter_details),
        )
        .route(
            "/api/bookings/drafts/{id}/payment",
            put(handlers::client::choose_payment),
        )
        .route(
            "/api/bookings/drafts/{id}/next",
            post(handlers::client::next_step),
        )
        .route(
            "/api/bookings/drafts/{id}/back",
            post(handlers::client::previous_step),
        )
        .route(
            "/api/bookings/drafts/{id}/submit",
            post(handlers::client::submit_draft),
        )
        .route(
            "/api/customers/{phone}",
            get(handlers::client::customer_portal),
        )
        .route(
            "/api/customer/session",
            get(handlers::client::get_customer_session)
                .put(handlers::client::set_customer_session)
                .delete(handlers::client::clear_customer_session),
        )
        .layer(from_fn_with_state(rate_limiter.guard(Tier::Booking), rate_limit));

    // 4. Chat: every message is a remote model call
    let chat_routes = Router::new()
        .route("/api/chat", post(handlers::chat::create_chat))
        .route("/api/chat/{id}", get(handlers::chat::get_chat))
        .route(
            "/api/chat/{id}/messages",
            post(handlers::chat::send_message),
        )
        .layer(from_fn_with_state(rate_limiter.guard(Tier::Chat), rate_limit));

    // 5. Admin
    let admin_routes = Router::new()
        .route("/api/admin/login", post(handlers::admin::login))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::dashboard),
        )
        .route(
            "/api/admin/appointments/{id}/toggle",
            post(handlers::admin::toggle_appointment),
        )
        .route(
            "/api/admin/appointments/{id}",
            delete(handlers::admin::delete_appointment),
        )
        .route(
            "/api/admin/services/{id}",
            put(handlers::admin::update_service),
        )
        .route("/api/admin/gallery", post(handlers::admin::add_gallery_item))
        .route(
            "/api/admin/gallery/{id}",
            delete(handlers::admin::remove_gallery_item),
        )
        .layer(from_fn_with_state(rate_limiter.guard(Tier::Admin), rate_limit));

    Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(chat_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{AdviceClient, AdviceError};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const PASS: &str = "Player@07!";

    struct Stylist;

    #[async_trait::async_trait]
    impl AdviceClient for Stylist {
        async fn complete(&self, _system: &str, _prompt: &str) -> Result<String, AdviceError> {
            Ok("Degradê na régua, mano!".into())
        }
    }

    /// Echoes the question back. The one mentioning "primeira" answers slowly.
    struct SlowEcho;

    #[async_trait::async_trait]
    impl AdviceClient for SlowEcho {
        async fn complete(&self, _system: &str, prompt: &str) -> Result<String, AdviceError> {
            let question = prompt.rsplit("Pergunta: ").next().unwrap_or("").to_string();
            if question.contains("primeira") {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(format!("resposta: {}", question))
        }
    }

    async fn test_state(client: Arc<dyn AdviceClient>) -> Arc<AppState> {
        let repo = Repository::load(db::test_store().await).await.unwrap();
        Arc::new(AppState {
            repo: Mutex::new(repo),
            drafts: DashMap::new(),
            chats: DashMap::new(),
            assistant: AdviceAssistant::new(client),
            admin_passphrase: PASS.into(),
            shop: shop_info_from_env(),
            started_at: Instant::now(),
        })
    }

    async fn test_app() -> Router {
        build_router(test_state(Arc::new(Stylist)).await, &RateLimiter::new())
    }

    /// Give `phone` ten completed visits, i.e. one free haircut.
    async fn seed_completed_visits(state: &AppState, phone: &str) {
        let mut repo = state.repo.lock().await;
        for n in 0..10u64 {
            repo.add_appointment(models::Appointment {
                id: format!("visit-{}", n),
                customer_name: "João".into(),
                phone: phone.into(),
                address: None,
                date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + chrono::Days::new(n),
                time: "10:00".into(),
                service: models::ServiceKind::Haircut,
                price: models::Price::fixed(5000),
                payment_method: models::PaymentMethod::Cash,
                created_at: chrono::Utc::now(),
                completed: true,
            })
            .await
            .unwrap();
        }
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn tomorrow() -> String {
        (chrono::Local::now().date_naive() + chrono::Days::new(1)).to_string()
    }

    /// Walk a fresh draft to the review step and return its id.
    async fn draft_at_review(app: &Router, date: &str, time: &str) -> String {
        draft_at_review_with(app, date, time, "haircut_beard", "pix_on_site").await
    }

    async fn draft_at_review_with(
        app: &Router,
        date: &str,
        time: &str,
        service: &str,
        payment: &str,
    ) -> String {
        let (_, draft) = call(app, Method::POST, "/api/bookings/drafts", None, None).await;
        let id = draft["data"]["id"].as_str().unwrap().to_string();
        let base = format!("/api/bookings/drafts/{}", id);

        let steps = [
            ("time", json!({"date": date, "time": time})),
            ("service", json!({"service": service})),
            (
                "details",
                json!({"customer_name": "João", "phone": "11999990000"}),
            ),
            ("payment", json!({"payment_method": payment})),
        ];
        for (field, body) in steps {
            let (status, _) = call(
                app,
                Method::PUT,
                &format!("{}/{}", base, field),
                Some(body),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK, "editing {}", field);
            let (status, _) = call(app, Method::POST, &format!("{}/next", base), None, None).await;
            assert_eq!(status, StatusCode::OK, "advancing past {}", field);
        }
        id
    }

    async fn admin_token(app: &Router) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/api/admin/login",
            Some(json!({"passphrase": PASS})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let app = test_app().await;
        let (status, body) = call(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store_ok"], true);
    }

    #[tokio::test]
    async fn test_catalog_defaults() {
        let app = test_app().await;
        let (_, body) = call(&app, Method::GET, "/api/services", None, None).await;
        let services = body["data"].as_array().unwrap();
        assert_eq!(services.len(), 6);
        assert_eq!(services[5]["price"]["kind"], "quoted");
    }

    #[tokio::test]
    async fn test_booking_flow_end_to_end() {
        let app = test_app().await;
        let date = tomorrow();
        let id = draft_at_review(&app, &date, "10:00").await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"]["cents"], 7000);
        assert_eq!(body["data"]["payment_method"], "pix_on_site");

        // Draft is gone once submitted.
        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/bookings/drafts/{}", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, slots) = call(&app, Method::GET, &format!("/api/slots?date={}", date), None, None).await;
        let ten = slots["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["time"] == "10:00")
            .unwrap();
        assert_eq!(ten["occupied"], true);
    }

    #[tokio::test]
    async fn test_second_booking_same_slot_conflicts() {
        let app = test_app().await;
        let date = tomorrow();
        let first = draft_at_review(&app, &date, "11:00").await;
        let second = draft_at_review(&app, &date, "11:00").await;

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", first),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", second),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // The losing draft survives for the customer to go back.
        let (status, body) = call(
            &app,
            Method::GET,
            &format!("/api/bookings/drafts/{}", second),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["step"], "review");
    }

    #[tokio::test]
    async fn test_advance_without_time_is_rejected() {
        let app = test_app().await;
        let (_, draft) = call(&app, Method::POST, "/api/bookings/drafts", None, None).await;
        let id = draft["data"]["id"].as_str().unwrap();
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/next", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let app = test_app().await;
        let (status, _) = call(&app, Method::GET, "/api/admin/appointments", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(
            &app,
            Method::GET,
            "/api/admin/appointments",
            None,
            Some("deadbeef"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/admin/login",
            Some(json!({"passphrase": "wrong"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_toggle_revenue_and_delete() {
        let app = test_app().await;
        let id = draft_at_review(&app, &tomorrow(), "13:00").await;
        let (_, booked) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", id),
            None,
            None,
        )
        .await;
        let app_id = booked["data"]["id"].as_str().unwrap().to_string();
        let token = admin_token(&app).await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/admin/appointments/{}/toggle", app_id),
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], true);

        let (_, dash) = call(&app, Method::GET, "/api/admin/appointments", None, Some(&token)).await;
        assert_eq!(dash["data"]["revenue_cents"], 7000);
        assert_eq!(dash["data"]["completed_count"], 1);

        let uri = format!("/api/admin/appointments/{}", app_id);
        let (status, _) = call(&app, Method::DELETE, &uri, None, Some(&token)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("{}?confirm=true", uri),
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, dash) = call(&app, Method::GET, "/api/admin/appointments", None, Some(&token)).await;
        assert!(dash["data"]["appointments"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_edits_price() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/admin/services/1",
            Some(json!({"price": "45,50", "description": "Corte clássico"})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"]["cents"], 4550);

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/admin/services/1",
            Some(json!({"price": "barato", "description": ""})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_quoted_price_stays_out_of_revenue() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/admin/services/1",
            Some(json!({"price": "Sob Consulta", "description": "Corte"})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let id = draft_at_review_with(&app, &tomorrow(), "14:00", "haircut", "cash").await;
        let (status, booked) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", id),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booked["data"]["price"]["kind"], "quoted");
        let app_id = booked["data"]["id"].as_str().unwrap().to_string();

        call(
            &app,
            Method::POST,
            &format!("/api/admin/appointments/{}/toggle", app_id),
            None,
            Some(&token),
        )
        .await;

        let (_, dash) = call(&app, Method::GET, "/api/admin/appointments", None, Some(&token)).await;
        assert_eq!(dash["data"]["completed_count"], 1);
        assert_eq!(dash["data"]["revenue_cents"], 0);
        assert!(dash["data"]["appointments"][0]["confirm_url"]
            .as_str()
            .unwrap()
            .starts_with("https://wa.me/11999990000"));
    }

    #[tokio::test]
    async fn test_one_reward_cannot_be_redeemed_twice() {
        let state = test_state(Arc::new(Stylist)).await;
        seed_completed_visits(&state, "11999990000").await;
        let app = build_router(state.clone(), &RateLimiter::new());

        let date = tomorrow();
        let first =
            draft_at_review_with(&app, &date, "09:00", "haircut", "loyalty_redemption").await;
        let second =
            draft_at_review_with(&app, &date, "14:00", "haircut", "loyalty_redemption").await;

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", first),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["price"]["cents"], 0);
        assert_eq!(body["data"]["payment_method"], "loyalty_redemption");

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/bookings/drafts/{}/submit", second),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["ok"], false);

        let (_, portal) = call(&app, Method::GET, "/api/customers/11999990000", None, None).await;
        assert_eq!(portal["data"]["loyalty"]["redemptions_used"], 1);
        assert_eq!(portal["data"]["loyalty"]["available"], 0);
    }

    #[tokio::test]
    async fn test_gallery_add_filter_remove() {
        let app = test_app().await;
        let token = admin_token(&app).await;

        let (status, added) = call(
            &app,
            Method::POST,
            "/api/admin/gallery",
            Some(json!({"image_url": "data:image/png;base64,AAAA", "category": "platinum"})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(added["data"]["barber_name"], "Victor Mota");
        let item_id = added["data"]["id"].as_str().unwrap().to_string();

        let (_, platinum) = call(&app, Method::GET, "/api/gallery?category=platinum", None, None).await;
        assert_eq!(platinum["data"].as_array().unwrap().len(), 1);
        let (_, haircut) = call(&app, Method::GET, "/api/gallery?category=haircut", None, None).await;
        assert!(haircut["data"].as_array().unwrap().is_empty());

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/admin/gallery/{}?confirm=true", item_id),
            None,
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, all) = call(&app, Method::GET, "/api/gallery", None, None).await;
        assert!(all["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_customer_session_and_portal() {
        let app = test_app().await;
        let (_, body) = call(&app, Method::GET, "/api/customer/session", None, None).await;
        assert_eq!(body["data"]["phone"], Value::Null);

        let (status, _) = call(
            &app,
            Method::PUT,
            "/api/customer/session",
            Some(json!({"phone": "11999990000"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::GET, "/api/customer/session", None, None).await;
        assert_eq!(body["data"]["phone"], "11999990000");

        let (_, portal) = call(&app, Method::GET, "/api/customers/11999990000", None, None).await;
        assert_eq!(portal["data"]["loyalty"]["remaining_to_reward"], 10);

        call(&app, Method::DELETE, "/api/customer/session", None, None).await;
        let (_, body) = call(&app, Method::GET, "/api/customer/session", None, None).await;
        assert_eq!(body["data"]["phone"], Value::Null);
    }

    #[tokio::test]
    async fn test_chat_greets_then_answers() {
        let app = test_app().await;
        let (_, chat) = call(&app, Method::POST, "/api/chat", None, None).await;
        let id = chat["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(chat["data"]["entries"].as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/chat/{}/messages", id),
            Some(json!({"message": "Qual corte combina comigo?"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let entries = body["data"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2]["text"], "Degradê na régua, mano!");
        assert_eq!(body["data"]["waiting"], false);

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/chat/{}/messages", id),
            Some(json!({"message": "   "})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_questions_in_flight_keep_their_order() {
        let app = build_router(test_state(Arc::new(SlowEcho)).await, &RateLimiter::new());
        let (_, chat) = call(&app, Method::POST, "/api/chat", None, None).await;
        let id = chat["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/chat/{}/messages", id);

        let ((first, _), (second, _)) = tokio::join!(
            call(
                &app,
                Method::POST,
                &uri,
                Some(json!({"message": "primeira pergunta"})),
                None,
            ),
            call(
                &app,
                Method::POST,
                &uri,
                Some(json!({"message": "segunda pergunta"})),
                None,
            ),
        );
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);

        let (_, body) = call(&app, Method::GET, &format!("/api/chat/{}", id), None, None).await;
        assert_eq!(body["data"]["waiting"], false);
        let entries = body["data"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 5);
        // Every answer sits right after its own question.
        for pair in entries[1..].chunks(2) {
            assert_eq!(pair[0]["role"], "user");
            assert_eq!(pair[1]["role"], "assistant");
            assert_eq!(
                pair[1]["text"].as_str().unwrap(),
                format!("resposta: {}", pair[0]["text"].as_str().unwrap())
            );
        }
    }
}
