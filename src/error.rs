/// Failures while retrieving or reading a filter export.
///
/// Every variant aborts the filter's cycle before any state is written.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The tracker rejected the configured credentials.
    #[error("tracker rejected the credentials: invalid username or password")]
    Unauthorized,

    /// The tracker answered with a non-success status other than 401.
    #[error("tracker returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("tracker request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The export could not be turned into issue records.
    #[error("malformed filter export: {0}")]
    Malformed(String),
}
