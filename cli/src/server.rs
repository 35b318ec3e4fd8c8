use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use stride_core::Error;
use stride_core::store::{self, Direction, Document, DocumentStore};

const BODY_LIMIT: usize = 5 * 1024 * 1024; // 5 MB

#[derive(Clone)]
struct AppState {
    store: Arc<dyn DocumentStore>,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => {
                error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => Self::BadRequest(msg),
            Error::NotFound(msg) => Self::NotFound(msg),
            Error::Remote(msg) | Error::Auth(msg) => Self::Internal(msg),
        }
    }
}

// --- Query parsing ---

/// `where=field:value` and `order=field[:asc|desc]`, in any number and order.
/// Filter values are read as JSON when they parse, so `completed:true`
/// matches a boolean and `userId:"42"` a string; anything else is a string.
fn parse_query(params: &[(String, String)]) -> Result<store::Query, ApiError> {
    let mut query = store::Query::new();
    for (key, raw) in params {
        match key.as_str() {
            "where" => {
                let (field, value) = raw.split_once(':').ok_or_else(|| {
                    ApiError::BadRequest(format!("Invalid filter '{raw}'. Use field:value"))
                })?;
                let value = serde_json::from_str::<Value>(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                query = query.where_eq(field, value);
            }
            "order" => {
                let (field, direction) = match raw.split_once(':') {
                    Some((field, "asc")) => (field, Direction::Asc),
                    Some((field, "desc")) => (field, Direction::Desc),
                    Some((_, other)) => {
                        return Err(ApiError::BadRequest(format!(
                            "Invalid sort direction '{other}'. Use asc or desc"
                        )));
                    }
                    None => (raw.as_str(), Direction::Asc),
                };
                query = query.order_by(field, direction);
            }
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Unknown query parameter '{other}'"
                )));
            }
        }
    }
    Ok(query)
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn list_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Document>>, ApiError> {
    store::validate_collection(&name)?;
    let query = parse_query(&params)?;
    let docs = state.store.query(&name, &query).await?;
    Ok(Json(docs))
}

async fn create_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    store::validate_collection(&name)?;
    let doc = state.store.insert(&name, body).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn get_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    store::validate_collection(&name)?;
    let doc = state
        .store
        .get(&name, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No document {name}/{id}")))?;
    Ok(Json(doc))
}

async fn put_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, ApiError> {
    store::validate_collection(&name)?;
    Ok(Json(state.store.set(&name, &id, body).await?))
}

async fn patch_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, ApiError> {
    store::validate_collection(&name)?;
    Ok(Json(state.store.update(&name, &id, body).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    store::validate_collection(&name)?;
    if state.store.delete(&name, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No document {name}/{id}")))
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/collections/{name}",
            get(list_documents).post(create_document),
        )
        .route(
            "/api/collections/{name}/{id}",
            get(get_document)
                .put(put_document)
                .patch(patch_document)
                .delete(delete_document),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    store: Arc<dyn DocumentStore>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        store,
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let head = key.get(..4).unwrap_or_default();
        let tail = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
        eprintln!("API key: {head}...{tail} (see api_key file in data directory)");
    } else {
        warn!("Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(
            bind,
            "Listening on a non-local address with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve `store` on an ephemeral local port and return its base URL.
#[cfg(test)]
pub(crate) async fn spawn_local(
    store: Arc<dyn DocumentStore>,
    api_key: Option<String>,
) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = build_router(AppState { store, api_key });
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(format!("http://{addr}"))
}
