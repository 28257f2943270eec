use thiserror::Error;

/// Errors a single ask-request can end in.
///
/// No variant is retried automatically: a failure either propagates to the
/// caller or, on the lenient bridge path, is logged and swallowed.
#[derive(Error, Debug)]
pub enum AskError {
    /// The query registry is absent or malformed. Fatal at startup.
    #[error("Query registry error: {0}")]
    Config(String),
    /// The model endpoint could not be reached or answered non-success.
    #[error("LM Studio request failed: {0}")]
    BridgeUnavailable(String),
    /// The model answered, but no fenced SQL block could be extracted.
    #[error("Could not parse SQL code block from LM Studio response")]
    ParseFailure,
    /// The safety gate refused the statement.
    #[error("{0}")]
    Rejected(String),
    /// Driver-level failure, wrapped with the underlying message.
    #[error("Database error: {0}")]
    Database(String),
}
