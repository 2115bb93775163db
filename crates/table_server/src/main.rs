use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
    protocol::{LoginRequest, LoginResponse, LoginUser, Predicate, AUTH_HEADER, FILTER_PARAM},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, info, warn};

mod app_state;
mod auth;
mod config;
mod store;

use app_state::AppState;
use auth::{mint_token, user_id_for, verify_token, TokenConfig};
use config::load_settings;

const MAX_BODY_BYTES: usize = 64 * 1024;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let state = AppState::new(TokenConfig {
        secret: settings.token_secret,
        ttl_seconds: settings.token_ttl_seconds,
    });
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "table server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/login/:provider", post(login))
        .route("/logout", post(logout))
        .route("/tables/:table", get(query_records).post(insert_record))
        .route(
            "/tables/:table/:id",
            patch(update_record).delete(delete_record),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match error.code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> ApiResult<UserId> {
    let token = headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| reject(ApiError::unauthorized("missing authentication token")))?;
    verify_token(&state.tokens, token).map_err(|e| {
        debug!(error = %e, "auth: rejected token");
        reject(ApiError::unauthorized("invalid authentication token"))
    })
}

async fn healthz() -> &'static str {
    "ok"
}

async fn login(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(reject(ApiError::validation("username must not be empty")));
    }

    let user_id = user_id_for(&provider, username);
    let token = mint_token(&state.tokens, &user_id)
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    info!(user_id = %user_id, %provider, "auth: signed in");

    Ok(Json(LoginResponse {
        user: LoginUser { user_id },
        authentication_token: token,
    }))
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    match authorize(&state, &headers) {
        Ok(user_id) => info!(user_id = %user_id, "auth: signed out"),
        Err(_) => debug!("auth: logout without a valid token"),
    }
    StatusCode::NO_CONTENT
}

async fn query_records(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Value>>> {
    authorize(&state, &headers)?;
    let predicate = params
        .get(FILTER_PARAM)
        .map(|raw| Predicate::parse(raw))
        .transpose()
        .map_err(|e| reject(ApiError::validation(format!("invalid filter: {e}"))))?;

    let records = state.store.lock().await.query(&table, predicate.as_ref());
    debug!(%table, count = records.len(), "tables: query");
    Ok(Json(records))
}

async fn insert_record(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(record): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    authorize(&state, &headers)?;
    let inserted = state
        .store
        .lock()
        .await
        .insert(&table, record)
        .map_err(reject)?;
    let id = inserted["id"].as_str().unwrap_or_default();
    debug!(%table, %id, "tables: insert");
    Ok((StatusCode::CREATED, Json(inserted)))
}

async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(record): Json<Value>,
) -> ApiResult<Json<Value>> {
    authorize(&state, &headers)?;
    let updated = state
        .store
        .lock()
        .await
        .update(&table, &id, record)
        .map_err(|e| {
            warn!(%table, %id, error = %e.message, "tables: update rejected");
            reject(e)
        })?;
    Ok(Json(updated))
}

async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((table, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    authorize(&state, &headers)?;
    state
        .store
        .lock()
        .await
        .delete(&table, &id)
        .map_err(reject)?;
    debug!(%table, %id, "tables: delete");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
