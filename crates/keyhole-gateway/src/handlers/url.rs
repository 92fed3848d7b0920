use crate::error::{AppError, Result};
use crate::model::{CreateUrlRequest, CreateUrlResponse, UrlResponse};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyhole_core::{ShortKey, UrlOptions, UrlRecord};
use keyhole_shortener::ShortenParams;

/// `POST /v1/urls`. Always answers 200; failures fall back to the input URL.
pub async fn create_url_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateUrlRequest>,
) -> Json<CreateUrlResponse> {
    let params = ShortenParams {
        namespace: request.namespace.unwrap_or_default(),
        url_options: UrlOptions {
            protocol: request.protocol,
            host: request.host,
            port: request.port,
            ..UrlOptions::default()
        },
    };

    let url = state
        .shortener
        .shorten_optional(request.original_url.as_deref(), params)
        .await;

    Json(CreateUrlResponse { url })
}

/// `GET /v1/urls/{key}`.
pub async fn get_url_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UrlResponse>> {
    let record = resolve(&state, &key).await?;
    Ok(Json(record.into()))
}

/// `GET /t/{key}`: permanent redirect to the original URL.
pub async fn redirect_handler(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> Result<Response> {
    let record = resolve(&state, &key).await?;
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, record.original_url)],
    )
        .into_response())
}

async fn resolve(state: &AppState, key: &str) -> Result<UrlRecord> {
    let key = ShortKey::parse(key).ok_or(AppError::NotFound)?;
    state
        .redirector
        .resolve(&key)
        .await?
        .ok_or(AppError::NotFound)
}
