//! HTTP boundary — axum router over the settlement core.
//!
//! Handlers parse decimal strings, call into the services, and map the error
//! taxonomy onto status codes: Validation → 400, NotFound → 404,
//! Atomicity → 503 (retryable), Internal → 500.

use std::net::SocketAddr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::settlement::error::HiveError;
use crate::settlement::service::SubmitRequest;
use crate::settlement::types::{
    CreateAgentRequest, CreateAgentResponse, TradeReceipt, TradeRequest, TradeResponse,
    UpdatedStats,
};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agent/create", post(create_agent))
        .route("/api/agent/:key", get(get_agent).delete(delete_agent))
        .route("/api/trade", post(submit_trade))
        .route("/api/collective/insights", get(insights))
        .route("/api/stats", get(network_stats))
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 API listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct ApiError(HiveError);

impl From<HiveError> for ApiError {
    fn from(e: HiveError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HiveError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            HiveError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            HiveError::Atomicity(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            HiveError::Internal(m) => {
                error!("💥 internal error: {m}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "HiveMind API is running",
        "timestamp": Utc::now(),
    }))
}

async fn create_agent(
    State(state): State<AppState>,
    body: Option<Json<CreateAgentRequest>>,
) -> Json<CreateAgentResponse> {
    let name = body.and_then(|Json(b)| b.name);
    let agent = state.store.register_agent(name).await;
    Json(CreateAgentResponse {
        success: true,
        agent_key: agent.key,
        name: agent.name,
        created_at: agent.created_at,
    })
}

async fn get_agent(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let profile = state.queries.agent_profile(&key).await?;
    Ok(Json(profile).into_response())
}

async fn delete_agent(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    state.store.remove_agent(&key).await?;
    Ok(Json(json!({ "success": true, "message": "Agent and all trades deleted" })).into_response())
}

async fn submit_trade(
    State(state): State<AppState>,
    Json(body): Json<TradeRequest>,
) -> Result<Json<TradeResponse>, ApiError> {
    let amount_in = parse_amount(&body.amount_in, "amountIn")?;
    let amount_out = parse_amount(&body.amount_out, "amountOut")?;

    let outcome = state
        .settlement
        .submit(SubmitRequest {
            agent_key: body.agent_key,
            token_in: body.token_in,
            token_out: body.token_out,
            amount_in,
            amount_out,
            strategy_fingerprint: body.strategy_fingerprint,
        })
        .await?;

    Ok(Json(TradeResponse {
        success: true,
        trade: TradeReceipt {
            id: outcome.trade.id,
            agent_key: outcome.trade.agent_key,
            profit_loss: outcome.trade.profit_loss,
            success: outcome.trade.success,
            committed_at: outcome.trade.committed_at,
        },
        updated_stats: UpdatedStats::from(outcome.stats),
    }))
}

#[derive(Debug, Deserialize)]
struct InsightsParams {
    limit: Option<usize>,
}

async fn insights(
    State(state): State<AppState>,
    Query(params): Query<InsightsParams>,
) -> impl IntoResponse {
    let insights = state.queries.insights(params.limit).await;
    Json(crate::settlement::types::InsightsResponse { insights })
}

async fn network_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.queries.network_stats().await)
}

fn parse_amount(raw: &str, field: &str) -> Result<Decimal, ApiError> {
    let value: Decimal = raw
        .trim()
        .parse()
        .map_err(|_| HiveError::Validation(format!("{field} is not a valid decimal: {raw:?}")))?;
    if value.is_sign_negative() {
        return Err(HiveError::Validation(format!("{field} must be non-negative")).into());
    }
    Ok(value)
}
