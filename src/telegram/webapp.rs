//! HTTP API used by the registration web app.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::chat::Preferences;
use crate::core::config;
use crate::storage::db::{self, DbPool};
use crate::storage::users::{self, User, UserUpdate};
use crate::telegram::webapp_auth::{self, InitDataError};

/// Header carrying the Telegram Web App init data
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

// ============================================================================
// STATE
// ============================================================================

/// Shared state for all endpoints
#[derive(Clone)]
pub struct WebAppState {
    pub db_pool: Arc<DbPool>,
    pub bot_token: String,
    /// Whether `/user/{id}` requires init data for that same user
    pub auth_required: bool,
    pub auth_max_age_secs: i64,
    pub cors_origins: Vec<String>,
}

impl WebAppState {
    /// State with every setting taken from the environment
    pub fn from_config(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            bot_token: config::BOT_TOKEN.clone(),
            auth_required: *config::webapp::AUTH_REQUIRED,
            auth_max_age_secs: *config::webapp::AUTH_MAX_AGE_SECS,
            cors_origins: config::webapp::CORS_ORIGINS.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "initData")]
    pub init_data: Option<String>,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                log::error!("Web API internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::Internal(format!("DB pool error: {}", e))
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        ApiError::Internal(format!("DB error: {}", e))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Checks that the request carries valid init data for `user_id`.
fn authorize(state: &WebAppState, headers: &HeaderMap, user_id: i64) -> Result<(), ApiError> {
    if !state.auth_required {
        return Ok(());
    }

    let init_data = headers
        .get(INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Telegram init data".to_string()))?;

    let authenticated = webapp_auth::validate_telegram_webapp_data(init_data, &state.bot_token, state.auth_max_age_secs)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid init data: {}", e)))?;

    if authenticated != user_id {
        log::warn!("User {} tried to access profile {}", authenticated, user_id);
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect::<Vec<_>>();
    layer.allow_origin(AllowOrigin::list(origins))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Creates the web API router
pub fn create_webapp_router(state: WebAppState) -> Router {
    let cors = cors_layer(&state.cors_origins);

    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/user/{id}", get(handle_get_user).put(handle_update_user))
        .route("/verify", post(handle_verify))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Serves `app` on `0.0.0.0:port` until the server fails
pub async fn run_webapp_server(port: u16, app: Router) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    log::info!("Starting web API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /user/{id} - full profile
async fn handle_get_user(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorize(&state, &headers, user_id)?;

    let conn = db::get_connection(&state.db_pool)?;
    let user = users::get_user(&conn, user_id)?.ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// PUT /user/{id} - partial profile update
async fn handle_update_user(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    body: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers, user_id)?;

    let Json(mut update) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    if let Some(raw) = update.preferences.take() {
        let preferences: Preferences = raw
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid preferences: {}", e)))?;
        update.preferences = Some(preferences.to_string());
    }

    let conn = db::get_connection(&state.db_pool)?;
    if !users::update_user(&conn, user_id, &update)? {
        return Err(ApiError::NotFound("User not found".to_string()));
    }
    log::info!("Profile of user {} updated from the web app", user_id);

    Ok(Json(serde_json::json!({ "message": "User data updated successfully" })))
}

/// POST /verify - checks Telegram init data and echoes the signed fields
async fn handle_verify(
    State(state): State<Arc<WebAppState>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let init_data = body
        .ok()
        .and_then(|Json(req)| req.init_data)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing initData".to_string()))?;

    let now = chrono::Utc::now().timestamp();
    let verified = webapp_auth::verify_init_data(&init_data, &state.bot_token, state.auth_max_age_secs, now)
        .map_err(|e| match e {
            InitDataError::Expired(_) => ApiError::Forbidden("Request expired".to_string()),
            InitDataError::MissingHash | InitDataError::InvalidHash => ApiError::Forbidden("Invalid hash".to_string()),
            InitDataError::Malformed(msg) => ApiError::Forbidden(msg),
        })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user": verified.fields,
    })))
}
