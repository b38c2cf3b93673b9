use crate::generate::client::GenerationError;

/// Convenience result type used across facepatch.
pub type PatchResult<T> = Result<T, PatchError>;

/// Top-level error taxonomy used by the selection and compositing pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PatchError {
    /// Selection outside image bounds or not square.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// A bitmap failed to decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// The generation call failed (after retries, for the retryable kinds).
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Feathering or drawing the patch into the base failed.
    #[error("composite error: {0}")]
    Composite(String),

    /// Invalid options or degenerate geometry supplied by the caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// A generation request is already in flight for this session.
    #[error("busy: {0}")]
    Busy(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PatchError {
    pub fn invalid_region(msg: impl Into<String>) -> Self {
        Self::InvalidRegion(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn composite(msg: impl Into<String>) -> Self {
        Self::Composite(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Message suitable for showing to the person editing.
    ///
    /// Content-policy reasons are passed through verbatim; transient failures collapse into a
    /// generic retry-later message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Generation(GenerationError::ContentPolicyBlocked { reason }) => reason.clone(),
            Self::Generation(GenerationError::MissingCredential) => {
                "no API credential is configured for the image service".to_string()
            }
            Self::Generation(GenerationError::NoImageReturned { detail }) if !detail.is_empty() => {
                format!("the image service returned no image: {detail}")
            }
            Self::Generation(GenerationError::NoImageReturned { .. }) => {
                "the image service returned no image".to_string()
            }
            Self::Generation(_) => {
                "the image service is unavailable right now, please try again later".to_string()
            }
            Self::Decode(_) => "that image could not be opened".to_string(),
            Self::Composite(_) => "comparison view unavailable".to_string(),
            Self::Busy(_) => "a generation is already running".to_string(),
            Self::InvalidRegion(_) | Self::Validation(_) | Self::Other(_) => self.to_string(),
        }
    }
}
