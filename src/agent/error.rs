/// Errors that end an agent invocation, or that describe one bad event in the stream.
///
/// The `Display` text of every variant is shown to the user as the assistant's
/// reply when an exchange fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvocationError {
    #[error("AWS credentials unavailable: {0}")]
    Credentials(String),
    #[error("Failed to sign request: {0}")]
    Signing(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Agent service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Agent service raised {kind}: {message}")]
    Service { kind: String, message: String },
    #[error("Corrupted response stream: {0}")]
    Framing(String),
    #[error("Malformed stream event: {0}")]
    MalformedEvent(String),
}

impl InvocationError {
    /// A malformed event is skipped; every other error ends the invocation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, InvocationError::MalformedEvent(_))
    }
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        InvocationError::Transport(err.to_string())
    }
}
