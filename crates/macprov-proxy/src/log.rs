// Receiving end of the remote log sink: `POST /api/log` with
// `{level, message, data?}`. Entries are re-emitted through tracing under the
// `client` target. Unknown levels are logged at info.

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use macprov_api::LogLevel;

#[derive(Debug, Deserialize)]
struct IncomingEntry {
    #[serde(default)]
    level: String,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

pub(crate) async fn receive(body: Bytes) -> StatusCode {
    let entry: IncomingEntry = match serde_json::from_slice(&body) {
        Ok(entry) => entry,
        Err(e) => {
            debug!(error = %e, "malformed log entry");
            return StatusCode::BAD_REQUEST;
        }
    };

    let level = entry.level.parse().unwrap_or(LogLevel::Info);
    let data = entry.data.map(|d| d.to_string()).unwrap_or_default();
    let message = entry.message;
    match level {
        LogLevel::Debug => debug!(target: "client", data = %data, "{message}"),
        LogLevel::Info => info!(target: "client", data = %data, "{message}"),
        LogLevel::Warn => warn!(target: "client", data = %data, "{message}"),
        LogLevel::Error => error!(target: "client", data = %data, "{message}"),
    }
    StatusCode::NO_CONTENT
}
