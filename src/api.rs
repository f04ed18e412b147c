//! HTTP API for the Pricing Engine.
//!
//! This module exposes the engine, the stored pricing rules and the
//! calculation audit log as a small REST API using the
//! [`axum`](https://crates.io/crates/axum) framework.  Authentication,
//! rate limiting and tenant separation are expected to be handled in
//! front of this service.

use crate::audit::{AuditLog, CalculationLog};
use crate::context::Fields;
use crate::engine::PricingEngine;
use crate::error::ApiError;
use crate::models::{PricingRequest, PricingResponse, StrategyKind};
use crate::rules::{NewRule, PricingRule, RuleFilter, RuleStore, RuleUpdate};
use crate::settings::Settings;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_LOG_LIMIT: usize = 50;
const MAX_LOG_LIMIT: usize = 100;

/// Application state shared across requests.
pub struct AppState {
    pub engine: Arc<PricingEngine>,
    pub rules: RuleStore,
    pub audit: Arc<AuditLog>,
}

impl AppState {
    pub fn new(audit_capacity: usize) -> Self {
        let engine = Arc::new(PricingEngine::new());
        Self {
            rules: RuleStore::new(engine.clone()),
            engine,
            audit: Arc::new(AuditLog::new(audit_capacity)),
        }
    }
}

/// A calculation request: the pricing request itself plus an inline
/// configuration, used when no `rule_id` is given.
#[derive(Debug, Clone, Deserialize)]
pub struct CalculateRequest {
    #[serde(flatten)]
    pub request: PricingRequest,
    #[serde(default)]
    pub config: Fields,
}

/// Body of POST /api/v1/pricing/calculate/batch.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Evaluated independently; results come back in the same order.
    pub items: Vec<CalculateRequest>,
}

/// Outcome of one batch item: exactly one of `response` or `error`.
#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<PricingResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

/// Body of POST /api/v1/pricing/validate.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub strategy: String,
    #[serde(default)]
    pub config: Fields,
}

/// Query string of GET /api/v1/logs.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Number of entries to return, newest first.  Defaults to 50 and
    /// must lie in 1..=100.
    pub limit: Option<usize>,
    /// Only entries produced by this strategy.
    pub strategy_type: Option<StrategyKind>,
}

/// One entry of GET /api/v1/pricing/strategies.
#[derive(Debug, Serialize)]
pub struct StrategyDescriptor {
    #[serde(rename = "type")]
    pub kind: StrategyKind,
    pub name: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [&'static str],
}

fn describe(kind: StrategyKind) -> StrategyDescriptor {
    match kind {
        StrategyKind::CostPlus => StrategyDescriptor {
            kind,
            name: "Cost-Plus Pricing",
            description: "Adds a fixed or percentage markup and optional tax to the base cost",
            required_fields: &["base_cost", "markup_value"],
        },
        StrategyKind::Geographic => StrategyDescriptor {
            kind,
            name: "Geographic Pricing",
            description: "Applies regional multipliers based on location",
            required_fields: &["base_price", "location"],
        },
        StrategyKind::TimeBased => StrategyDescriptor {
            kind,
            name: "Time-Based Surge Pricing",
            description: "Adjusts price based on time windows and demand",
            required_fields: &["base_price"],
        },
        StrategyKind::RuleBased => StrategyDescriptor {
            kind,
            name: "Rule-Based Pricing",
            description: "Applies custom conditional rules to determine price",
            required_fields: &["base_price"],
        },
    }
}

/// Build the API router around the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/pricing/strategies", get(strategies_handler))
        .route("/api/v1/pricing/calculate", post(calculate_handler))
        .route("/api/v1/pricing/calculate/batch", post(batch_handler))
        .route("/api/v1/pricing/validate", post(validate_handler))
        .route("/api/v1/rules", post(create_rule_handler).get(list_rules_handler))
        .route(
            "/api/v1/rules/:id",
            get(get_rule_handler).put(update_rule_handler).delete(delete_rule_handler),
        )
        .route("/api/v1/logs", get(logs_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "pricing-engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Handler for GET /api/v1/pricing/strategies
async fn strategies_handler(State(state): State<Arc<AppState>>) -> Json<Vec<StrategyDescriptor>> {
    let descriptors = state
        .engine
        .list_strategies()
        .into_iter()
        .filter_map(|name| name.parse().ok())
        .map(describe)
        .collect();
    Json(descriptors)
}

/// Picks the configuration for a request: the stored rule's when a
/// `rule_id` is given, the inline one otherwise.
async fn resolve_config(state: &AppState, req: &CalculateRequest) -> Result<Fields, ApiError> {
    let Some(rule_id) = req.request.rule_id else {
        return Ok(req.config.clone());
    };
    let requested: StrategyKind = req.request.strategy.parse()?;
    let rule = state.rules.get(rule_id).await?;
    if !rule.is_active {
        return Err(ApiError::RuleInactive(rule_id));
    }
    if rule.strategy_type != requested {
        return Err(ApiError::StrategyMismatch {
            rule_id,
            rule_strategy: rule.strategy_type.to_string(),
            requested: req.request.strategy.clone(),
        });
    }
    Ok(rule.config)
}

/// Records a served calculation without holding up the response.
fn spawn_audit(state: &AppState, req: &PricingRequest, resp: &PricingResponse, elapsed_ms: u64) {
    let entry = CalculationLog::new(
        resp.strategy,
        req.rule_id,
        serde_json::to_value(req).unwrap_or(Value::Null),
        serde_json::to_value(resp).unwrap_or(Value::Null),
        elapsed_ms,
    );
    let audit = state.audit.clone();
    tokio::spawn(async move {
        audit.record(entry).await;
    });
}

/// Handler for POST /api/v1/pricing/calculate
async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CalculateRequest>,
) -> Result<Json<PricingResponse>, ApiError> {
    let config = resolve_config(&state, &body).await?;
    let started = Instant::now();
    let response = state.engine.calculate(&body.request, &config)?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        strategy = %response.strategy,
        final_price = response.final_price,
        elapsed_ms,
        "price calculated"
    );
    spawn_audit(&state, &body.request, &response, elapsed_ms);
    Ok(Json(response))
}

/// Handler for POST /api/v1/pricing/calculate/batch
async fn batch_handler(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<BatchRequest>,
) -> Result<Json<Value>, ApiError> {
    // Rule lookups happen first; items whose config cannot be resolved
    // are answered directly and skipped by the engine.
    let mut resolved = Vec::with_capacity(batch.items.len());
    let mut results: Vec<Option<BatchItemResult>> = Vec::with_capacity(batch.items.len());
    for item in &batch.items {
        match resolve_config(&state, item).await {
            Ok(config) => {
                resolved.push((item.request.clone(), config));
                results.push(None);
            }
            Err(err) => results.push(Some(error_item(&err))),
        }
    }

    let engine = state.engine.clone();
    let requests: Vec<PricingRequest> = resolved.iter().map(|(req, _)| req.clone()).collect();
    let started = Instant::now();
    let calculated = tokio::task::spawn_blocking(move || engine.calculate_batch(resolved))
        .await
        .map_err(|err| ApiError::Internal(format!("batch calculation aborted: {err}")))?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let mut calculated = requests.iter().zip(calculated);
    for slot in results.iter_mut().filter(|slot| slot.is_none()) {
        let Some((req, outcome)) = calculated.next() else {
            break;
        };
        *slot = Some(match outcome {
            Ok(resp) => {
                spawn_audit(&state, req, &resp, elapsed_ms);
                BatchItemResult {
                    response: Some(resp),
                    error: None,
                }
            }
            Err(err) => error_item(&ApiError::from(err)),
        });
    }

    info!(items = results.len(), elapsed_ms, "batch calculated");
    Ok(Json(json!({ "results": results })))
}

fn error_item(err: &ApiError) -> BatchItemResult {
    BatchItemResult {
        response: None,
        error: Some(json!({"message": err.to_string(), "type": err.type_name()})),
    }
}

/// Handler for POST /api/v1/pricing/validate
async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<Value>, ApiError> {
    state.engine.validate_config(&body.strategy, &body.config)?;
    Ok(Json(json!({"valid": true, "strategy": body.strategy})))
}

async fn create_rule_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewRule>,
) -> Result<(StatusCode, Json<PricingRule>), ApiError> {
    let rule = state.rules.create(body).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn list_rules_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RuleFilter>,
) -> Json<Vec<PricingRule>> {
    Json(state.rules.list(&filter).await)
}

async fn get_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PricingRule>, ApiError> {
    Ok(Json(state.rules.get(id).await?))
}

async fn update_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RuleUpdate>,
) -> Result<Json<PricingRule>, ApiError> {
    Ok(Json(state.rules.update(id, body).await?))
}

async fn delete_rule_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.rules.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/v1/logs
async fn logs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<CalculationLog>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);
    if limit == 0 || limit > MAX_LOG_LIMIT {
        return Err(ApiError::BadRequest(format!("limit must be between 1 and {MAX_LOG_LIMIT}")));
    }
    Ok(Json(state.audit.recent(limit, query.strategy_type).await))
}

/// Launch the API server.  Binds to the configured address and blocks
/// until the server terminates (e.g. on Ctrl-C).
pub async fn serve(settings: &Settings) -> Result<()> {
    let state = Arc::new(AppState::new(settings.audit.capacity));
    let router = build_router(state);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("pricing engine listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
