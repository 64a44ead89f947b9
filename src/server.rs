//! Bounty Review Server
//!
//! HTTP surface for the sponsor dashboard. Handlers are thin: they extract
//! the acting sponsor from headers and delegate to the controller, which
//! owns every invariant.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::dashboard::BountyDashboardController;
use crate::error::ReviewError;
use crate::models::{ListQuery, SponsorContext};
use crate::store::{NewBounty, NewSubmission};

pub struct AppState {
    pub controller: Arc<BountyDashboardController>,
    pub started_at: std::time::Instant,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/bounties", post(create_bounty_handler))
        .route("/bounties/:id", get(get_bounty_handler))
        .route(
            "/bounties/:id/submissions",
            get(list_submissions_handler).post(create_submission_handler),
        )
        .route("/bounties/:id/winners/assign", post(assign_handler))
        .route("/bounties/:id/winners/revoke", post(revoke_handler))
        .route("/bounties/:id/winners/reassign", post(reassign_handler))
        .route("/bounties/:id/publish", post(publish_handler))
        .route(
            "/bounties/:id/submissions/:sid/payment",
            post(payment_handler),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Error mapping
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ReviewError::InvalidRank { .. } | ReviewError::OutOfRange { .. } => {
                StatusCode::BAD_REQUEST
            }
            ReviewError::PositionTaken { .. }
            | ReviewError::AnnouncementLocked
            | ReviewError::NotPaidRevocable
            | ReviewError::PublishBlocked { .. } => StatusCode::CONFLICT,
            ReviewError::Forbidden => StatusCode::FORBIDDEN,
            ReviewError::NotFound { .. } => StatusCode::NOT_FOUND,
            ReviewError::LedgerInconsistent { .. }
            | ReviewError::Storage(_)
            | ReviewError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

/// Acting identity from the session provider's headers. Mutations and
/// sponsor-scoped reads both require it.
fn sponsor_from_headers(headers: &HeaderMap) -> Result<SponsorContext, ReviewError> {
    let sponsor_id = headers
        .get("x-sponsor-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ReviewError::Forbidden)?;
    let override_authority = headers
        .get("x-sponsor-role")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("admin"))
        .unwrap_or(false);
    Ok(SponsorContext {
        sponsor_id: sponsor_id.to_string(),
        override_authority,
    })
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub uptime_secs: u64,
    pub version: String,
    pub service: String,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "bounty-review".to_string(),
    })
}

async fn get_bounty_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let bounty = state.controller.get_bounty(&ctx, &bounty_id)?;
    Ok(Json(bounty).into_response())
}

async fn list_submissions_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let page = state.controller.list_submissions(&ctx, &bounty_id, &query)?;
    Ok(Json(page).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignRequest {
    submission_id: String,
    rank_label: String,
}

async fn assign_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssignRequest>,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let bounty =
        state
            .controller
            .assign_winner(&ctx, &bounty_id, &req.submission_id, &req.rank_label)?;
    Ok(Json(bounty).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeRequest {
    submission_id: String,
}

async fn revoke_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<RevokeRequest>,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let bounty = state
        .controller
        .revoke_winner(&ctx, &bounty_id, &req.submission_id)?;
    Ok(Json(bounty).into_response())
}

async fn reassign_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssignRequest>,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let bounty =
        state
            .controller
            .reassign_winner(&ctx, &bounty_id, &req.submission_id, &req.rank_label)?;
    Ok(Json(bounty).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct PublishRequest {
    #[serde(default)]
    force: bool,
}

async fn publish_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PublishRequest>,
) -> Result<Response, ReviewError> {
    let ctx = sponsor_from_headers(&headers)?;
    let bounty = state
        .controller
        .publish_results(&ctx, &bounty_id, req.force)?;
    Ok(Json(bounty).into_response())
}

async fn create_bounty_handler(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewBounty>,
) -> Result<Response, ReviewError> {
    let bounty = state.controller.create_bounty(new)?;
    Ok((StatusCode::CREATED, Json(bounty)).into_response())
}

async fn create_submission_handler(
    State(state): State<Arc<AppState>>,
    Path(bounty_id): Path<String>,
    Json(new): Json<NewSubmission>,
) -> Result<Response, ReviewError> {
    let submission = state.controller.create_submission(&bounty_id, new)?;
    Ok((StatusCode::CREATED, Json(submission)).into_response())
}

#[derive(Debug, Deserialize)]
struct PaymentRequest {
    paid: bool,
}

async fn payment_handler(
    State(state): State<Arc<AppState>>,
    Path((_bounty_id, submission_id)): Path<(String, String)>,
    Json(req): Json<PaymentRequest>,
) -> Result<Response, ReviewError> {
    let submission = state.controller.record_payment(&submission_id, req.paid)?;
    Ok(Json(submission).into_response())
}

/// Run the server
pub async fn run_server(
    host: &str,
    port: u16,
    controller: Arc<BountyDashboardController>,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        controller,
        started_at: std::time::Instant::now(),
    });

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting Bounty Review server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
