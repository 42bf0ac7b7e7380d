// Remote log sink
//
// Fire-and-forget `POST /api/log` with `{level, message, data?}`. Delivery
// failures are swallowed: a broken sink must never change what the caller does.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;
use url::Url;

use crate::error::Error;

pub const LOG_PATH: &str = "/api/log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One entry as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Handle to the remote sink. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LogSink {
    http: reqwest::Client,
    endpoint: Url,
}

impl LogSink {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    /// Sink at `/api/log` on the same origin as `base` (scheme, host, port).
    pub fn for_origin(http: reqwest::Client, base: &Url) -> Result<Self, Error> {
        let endpoint = base.join(LOG_PATH)?;
        Ok(Self::new(http, endpoint))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Queue `entry` for delivery and return immediately.
    ///
    /// Outside a Tokio runtime the entry is dropped.
    pub fn emit(&self, entry: LogEntry) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let sink = self.clone();
        handle.spawn(async move {
            if let Err(e) = sink.deliver(&entry).await {
                debug!(error = %e, "log sink delivery failed");
            }
        });
    }

    /// Deliver one entry and wait for the answer. Used by `emit`; exposed for tests.
    pub async fn deliver(&self, entry: &LogEntry) -> Result<(), reqwest::Error> {
        self.http
            .post(self.endpoint.clone())
            .json(entry)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
