use thiserror::Error;

/// Construction-time errors for the `macprov-api` crate.
///
/// Request-time failures never surface through this type: status lookups
/// fail with a [`ClassifiedError`](crate::ClassifiedError) and provisioning
/// failures are returned inside a [`ProvisionOutcome`](crate::ProvisionOutcome).
#[derive(Debug, Error)]
pub enum Error {
    /// Base URL or endpoint could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying `reqwest::Client` could not be built (TLS backend, CA file).
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
