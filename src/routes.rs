use std::sync::Arc;

use bytes::Bytes;
use poem::http::{header, StatusCode};
use poem::middleware::Tracing;
use poem::web::Data;
use poem::{get, handler, Body, Endpoint, EndpointExt, Request, Response, Route};
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::cache::{CacheResult, ResultCache};
use crate::error::CacheError;
use crate::freshness::format_http_date;
use crate::path::Variant;

/// The prefix results are served under.
pub const RESULTS_PREFIX: &str = "/v1/results";

pub struct ApiState {
    cache: ResultCache,
    max_upload_size: Option<usize>,
}

impl ApiState {
    pub fn new(cache: ResultCache, max_upload_size: Option<usize>) -> Self {
        Self {
            cache,
            max_upload_size,
        }
    }
}

pub fn app(state: Arc<ApiState>) -> impl Endpoint {
    Route::new()
        .at(
            format!("{}/*identity", RESULTS_PREFIX),
            get(fetch_result).put(store_result).head(head_result),
        )
        .data(state)
        .with(Tracing)
}

/// The identity of a request is everything after the results prefix,
/// including the query string.
fn request_identity(req: &Request) -> String {
    let path = req.uri().path();
    let path = path.strip_prefix(RESULTS_PREFIX).unwrap_or(path);

    match req.uri().query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

fn accepts_webp(req: &Request) -> bool {
    req.headers()
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("image/webp"))
}

fn request_variant(req: &Request, state: &ApiState) -> Variant {
    state.cache.variant_for(accepts_webp(req))
}

#[handler]
async fn fetch_result(req: &Request, state: Data<&Arc<ApiState>>) -> Response {
    let identity = request_identity(req);
    let variant = request_variant(req, &state);

    match state.cache.get(&identity, variant).await {
        Ok(CacheResult::Hit(result)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, result.metadata.content_type)
            .header(header::CONTENT_LENGTH, result.metadata.content_length.to_string())
            .header(
                header::LAST_MODIFIED,
                format_http_date(result.metadata.last_modified),
            )
            .body(Body::from(result.buffer)),
        Ok(CacheResult::Miss) => empty_response(StatusCode::NOT_FOUND),
        Err(e) => error_response(e),
    }
}

#[handler]
async fn store_result(req: &Request, state: Data<&Arc<ApiState>>, body: Body) -> Response {
    let body = match read_upload(req, body, state.max_upload_size).await {
        Ok(body) => body,
        Err(resp) => return resp,
    };

    let identity = request_identity(req);
    let variant = request_variant(req, &state);

    match state.cache.put(&identity, variant, body).await {
        Ok(key) => json_response(StatusCode::OK, Some(json!({ "key": key }))),
        Err(e) => error_response(e),
    }
}

#[handler]
async fn head_result(req: &Request, state: Data<&Arc<ApiState>>) -> Response {
    let identity = request_identity(req);
    let variant = request_variant(req, &state);

    match state.cache.last_updated(&identity, variant).await {
        Ok(Some(last_modified)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::LAST_MODIFIED, format_http_date(last_modified))
            .finish(),
        Ok(None) => empty_response(StatusCode::NOT_FOUND),
        Err(e) => error_response(e),
    }
}

/// Reads an uploaded result, never buffering more than `limit` bytes.
async fn read_upload(req: &Request, body: Body, limit: Option<usize>) -> Result<Bytes, Response> {
    let limit = match limit {
        None => {
            return body
                .into_bytes()
                .await
                .map_err(|e| bad_body_response(&e));
        },
        Some(limit) => limit,
    };

    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if matches!(declared, Some(len) if len > limit as u64) {
        return Err(too_large_response(limit));
    }

    let mut buff = Vec::with_capacity(declared.map(|len| len as usize).unwrap_or(0));
    body.into_async_read()
        .take(limit as u64 + 1)
        .read_to_end(&mut buff)
        .await
        .map_err(|e| bad_body_response(&e))?;

    if buff.len() > limit {
        return Err(too_large_response(limit));
    }

    Ok(Bytes::from(buff))
}

fn too_large_response(limit: usize) -> Response {
    json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        Some(json!({
            "message": format!("result exceeds the maximum upload size of {} bytes", limit),
        })),
    )
}

fn bad_body_response(e: &dyn std::fmt::Display) -> Response {
    warn!("Failed to read uploaded result: {}", e);

    json_response(
        StatusCode::BAD_REQUEST,
        Some(json!({
            "message": "failed to read request body",
        })),
    )
}

/// A standard JSON response with the content type set to application/json
fn json_response(status: StatusCode, data: Option<Value>) -> Response {
    let payload = json!({
        "status": status.as_u16(),
        "data": data,
    });

    Response::builder()
        .status(status)
        .content_type("application/json")
        .body(payload.to_string())
}

fn empty_response(status: StatusCode) -> Response {
    Response::builder().status(status).finish()
}

fn error_response(e: CacheError) -> Response {
    error!("{:#}", anyhow::Error::from(e));

    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(json!({
            "message": "result storage is unavailable",
        })),
    )
}
