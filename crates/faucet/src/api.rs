//! HTTP API for faucet service

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::FaucetConfig;
use crate::error::FaucetError;
use crate::metrics::MetricsCollector;
use crate::service::FaucetService;
use crate::tokens::{FundingAmount, TokenId};
use crate::validation::validate_fund_request;

/// Presentation settings the handlers need beyond the service itself.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub explorer_url: String,
    /// Include server-side error detail in responses
    pub expose_errors: bool,
    pub cors_enabled: bool,
    pub port: u16,
}

impl ApiSettings {
    pub fn from_config(config: &FaucetConfig) -> Self {
        Self {
            explorer_url: config.ledger.explorer_url.trim_end_matches('/').to_string(),
            expose_errors: !config.server.environment.is_production(),
            cors_enabled: config.server.cors_enabled,
            port: config.server.listen_addr.port(),
        }
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FaucetService>,
    pub metrics: MetricsCollector,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    fn reject(&self, error: FaucetError) -> ApiError {
        ApiError {
            error,
            expose: self.settings.expose_errors,
        }
    }
}

/// A [`FaucetError`] rendered according to the deployment environment.
pub struct ApiError {
    error: FaucetError,
    expose: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.status_code().is_server_error() {
            error!(error = %self.error, "Request failed");
        }
        self.error.to_response(self.expose)
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/balance/:token", get(balance_handler))
        .route("/rate-limit/:address", get(rate_limit_handler))
        .route("/fund", post(fund_handler));

    let cors_enabled = state.settings.cors_enabled;
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

fn iso(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Health check handler
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let wallet = state.service.service_address();

    match state.service.chain_id().await {
        Ok(chain_id) => Json(json!({
            "success": true,
            "status": "healthy",
            "service": "tempo-faucet",
            "wallet": wallet,
            "chainId": chain_id.to_string(),
            "timestamp": iso(Utc::now()),
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "unhealthy",
                    "error": "Service unavailable",
                })),
            )
                .into_response()
        }
    }
}

pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    let tokens: Vec<Value> = TokenId::ALL
        .iter()
        .map(|token| json!({ "name": token.name(), "address": token.contract().to_hex() }))
        .collect();
    let amounts: Vec<u64> = FundingAmount::ALL.iter().map(|a| a.whole_tokens()).collect();

    Json(json!({
        "success": true,
        "supportedTokens": tokens,
        "allowedAmounts": amounts,
        "walletAddress": state.service.service_address(),
    }))
}

pub async fn balance_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Response> {
    let Ok(token) = token.parse::<TokenId>() else {
        let body = json!({
            "success": false,
            "error": format!("Invalid token. Must be one of: {}", TokenId::names()),
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    };

    let balance = state
        .service
        .balance(token)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(json!({
        "success": true,
        "token": token,
        "balance": balance,
        "address": token.contract().to_hex(),
    }))
    .into_response())
}

pub async fn rate_limit_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<Value>> {
    let snapshot = state
        .service
        .inspect_quota(&address)
        .await
        .map_err(|e| state.reject(e))?;

    Ok(Json(json!({
        "success": true,
        "address": address,
        "requestsUsed": snapshot.count,
        "requestsRemaining": snapshot.remaining,
        "resetAt": snapshot.reset_at.map(iso),
    })))
}

pub async fn fund_handler(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    // An unreadable body is validated like an empty one.
    let body = body.map(|Json(value)| value).unwrap_or(Value::Null);

    let request = validate_fund_request(&body).map_err(|details| {
        warn!(?details, "Validation failed");
        state.reject(FaucetError::Validation(details))
    })?;

    let receipt = state
        .service
        .request_funding(&request)
        .await
        .map_err(|e| state.reject(e))?;

    let transfer = &receipt.transfer;
    let tx_hash = transfer.tx_hash.to_string();
    info!(recipient = %transfer.recipient, %tx_hash, "Funding request completed");

    Ok(Json(json!({
        "success": true,
        "message": "Tokens sent successfully",
        "data": {
            "recipient": transfer.recipient,
            "token": transfer.token,
            "tokenAddress": transfer.token.contract().to_hex(),
            "amount": transfer.amount,
            "txHash": tx_hash,
            "explorerUrl": state.settings.explorer_tx_url(&tx_hash),
        },
        "rateLimit": {
            "remaining": receipt.quota.remaining,
            "resetAt": iso(receipt.quota.reset_at),
        },
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.gather() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Human-readable window length, e.g. "24 hours" or "30 minutes".
fn describe_window(window: Duration) -> String {
    let minutes = window.as_secs() / 60;
    let (value, unit) = if minutes >= 60 {
        (minutes / 60, "hour")
    } else if minutes >= 1 {
        (minutes, "minute")
    } else {
        (window.as_secs(), "second")
    };
    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Landing page
pub async fn root_handler(State(state): State<AppState>) -> Html<String> {
    let policy = state.service.policy();
    let tokens: String = TokenId::ALL
        .iter()
        .map(|t| format!("        <li>{}</li>\n", t.name()))
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Tempo Faucet</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 40px 20px; color: #333; }}
        pre {{ background: #f5f5f5; padding: 15px; border-radius: 4px; overflow-x: auto; }}
        .info {{ background: #f0f0f0; padding: 15px; border-radius: 4px; margin: 20px 0; }}
    </style>
</head>
<body>
    <h1>Tempo Faucet</h1>
    <p>A faucet service for Tempo testnet tokens</p>

    <div class="info">
        <strong>Service Address:</strong> {address}<br>
        <strong>Rate Limit:</strong> {max} requests per {window}
    </div>

    <h2>Usage</h2>
    <pre><code>curl -X POST http://localhost:{port}/api/fund \
  -H "Content-Type: application/json" \
  -d '{{"address": "0xYourWalletAddress", "token": "pathUSD", "amount": 5000}}'</code></pre>

    <h2>Available Tokens</h2>
    <ul>
{tokens}    </ul>

    <h2>Endpoints</h2>
    <ul>
        <li><code>GET /api/health</code> - Health check</li>
        <li><code>GET /api/info</code> - Service information</li>
        <li><code>POST /api/fund</code> - Request tokens</li>
        <li><code>GET /api/balance/:token</code> - Check faucet balance</li>
        <li><code>GET /api/rate-limit/:address</code> - Check rate limit status</li>
        <li><code>GET /metrics</code> - Prometheus metrics</li>
    </ul>
</body>
</html>
"#,
        address = state.service.service_address(),
        max = policy.max_requests(),
        window = describe_window(policy.window()),
        port = state.settings.port,
        tokens = tokens,
    ))
}
