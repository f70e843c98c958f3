use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::db::Database;
use crate::error::ServiceError;
use crate::service::{
    CreateMatchRequest, CreateSubscriptionRequest, DeleteSubscriptionRequest, MatchService,
    SubscriptionService,
};

const ALIAS_SEARCH_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub matches: MatchService,
    pub subscriptions: SubscriptionService,
}

/// Build the Axum router for the public API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/matches", post(create_match_handler))
        .route("/v1/matches/:id", get(get_match_handler))
        .route(
            "/v1/subscriptions",
            post(create_subscription_handler).delete(delete_subscription_handler),
        )
        .route("/v1/aliases", get(aliases_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Maps service errors onto status codes with a `{"error": ...}` body.
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_bad_request() => StatusCode::BAD_REQUEST,
            ServiceError::SubscriptionAlreadyExists(_) | ServiceError::FixtureAlreadyTracked(_) => {
                StatusCode::CONFLICT
            }
            ServiceError::MatchNotFound(_) | ServiceError::SubscriptionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateMatchBody {
    starts_at: DateTime<Utc>,
    alias_home: String,
    alias_away: String,
}

/// POST /v1/matches
async fn create_match_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateMatchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .matches
        .create(CreateMatchRequest {
            starts_at: body.starts_at,
            alias_home: body.alias_home,
            alias_away: body.alias_away,
        })
        .await?;
    Ok(Json(json!({ "match_id": id })))
}

/// GET /v1/matches/:id
async fn get_match_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.matches.get(id)?))
}

#[derive(Debug, Deserialize)]
struct CreateSubscriptionBody {
    match_id: i64,
    url: String,
    secret_key: String,
}

/// POST /v1/subscriptions
async fn create_subscription_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSubscriptionBody>,
) -> Result<StatusCode, ApiError> {
    state.subscriptions.create(CreateSubscriptionRequest {
        match_id: body.match_id,
        url: body.url,
        secret_key: body.secret_key,
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct DeleteSubscriptionParams {
    starts_at: DateTime<Utc>,
    alias_home: String,
    alias_away: String,
    secret_key: String,
    url: String,
}

/// DELETE /v1/subscriptions?starts_at=&alias_home=&alias_away=&secret_key=&url=
async fn delete_subscription_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteSubscriptionParams>,
) -> Result<StatusCode, ApiError> {
    state.subscriptions.delete(DeleteSubscriptionRequest {
        starts_at: params.starts_at,
        alias_home: params.alias_home,
        alias_away: params.alias_away,
        secret_key: params.secret_key,
        url: params.url,
    })?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AliasParams {
    #[serde(default)]
    search: String,
}

/// GET /v1/aliases?search=
async fn aliases_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AliasParams>,
) -> Result<impl IntoResponse, ApiError> {
    let aliases = state
        .db
        .search_aliases(&params.search, ALIAS_SEARCH_LIMIT)
        .map_err(ServiceError::from)?;
    Ok(Json(json!({ "aliases": aliases })))
}
