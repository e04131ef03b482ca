use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// The request never produced a response body.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Upstream answered with a non-zero envelope code.
    #[error("Upstream rejected request (code {code}): {message}")]
    UpstreamRejected { code: i64, message: String },

    /// An HTML page came back where JSON was expected (rate limit or block page).
    #[error("Upstream returned HTML instead of JSON")]
    Blocked,

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
