// Prefix forwarding
//
// `{prefix}/rest?query` goes to `{target}/rest?query` with method, headers and
// the fully buffered body. Backend answers are mirrored (status, body,
// Content-Type) with `Access-Control-Allow-Origin: *` added. A forwarding
// failure is answered with 502 and the `Proxy error` envelope, the only
// response this proxy ever makes up.

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use macprov_api::classify::{PROXY_ERROR, error_chain};

use crate::{MAX_BODY_BYTES, ProxyState};

/// Never forwarded upstream. Accept-Encoding is dropped because the body is
/// mirrored decoded and Content-Encoding is not.
const DROPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
    "accept-encoding",
];

/// Body of the 502 answer when the backend could not be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyErrorBody {
    pub error: String,
    pub message: String,
    pub target: String,
}

pub(crate) async fn forward(State(state): State<ProxyState>, req: Request) -> Response {
    let (parts, body) = req.into_parts();

    let Some(rest) = strip_prefix(parts.uri.path(), &state.config.prefix) else {
        debug!(path = parts.uri.path(), "outside proxy prefix");
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response();
    };
    let target = backend_url(&state.config.target, rest, parts.uri.query());

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "request body rejected");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({ "error": "Request body too large" })),
            )
                .into_response();
        }
    };

    debug!(method = %parts.method, %target, "forwarding");
    match send(&state, parts.method, &parts.headers, &target, body).await {
        Ok(response) => response,
        Err(err) => gateway_error(&target, &error_chain(&err)),
    }
}

async fn send(
    state: &ProxyState,
    method: Method,
    headers: &HeaderMap,
    target: &str,
    body: Bytes,
) -> Result<Response, reqwest::Error> {
    let mut forwarded = headers.clone();
    for name in DROPPED_REQUEST_HEADERS {
        forwarded.remove(*name);
    }

    let mut request = state
        .http
        .request(method, target)
        .headers(forwarded)
        .timeout(state.config.timeout);
    if !body.is_empty() {
        request = request.body(body);
    }

    let upstream = request.send().await?;
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    let location = upstream.headers().get(header::LOCATION).cloned();
    let bytes = upstream.bytes().await?;

    debug!(status = status.as_u16(), bytes = bytes.len(), "backend answered");
    let mut response = (
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        ],
        Body::from(bytes),
    )
        .into_response();
    if let Some(location) = location {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

fn gateway_error(target: &str, cause: &str) -> Response {
    warn!(%target, cause, "backend unreachable");
    let body = ProxyErrorBody {
        error: PROXY_ERROR.into(),
        message: cause.into(),
        target: target.into(),
    };
    (
        StatusCode::BAD_GATEWAY,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))],
        Json(body),
    )
        .into_response()
}

/// Remainder of `path` after `prefix`, only on a segment boundary.
fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

fn backend_url(target: &Url, rest: &str, query: Option<&str>) -> String {
    let base = target.as_str().trim_end_matches('/');
    match query {
        Some(query) => format!("{base}{rest}?{query}"),
        None => format!("{base}{rest}"),
    }
}
