use std::future::Future;

use crate::raster::bitmap::Bitmap;

/// Failure kinds reported by the image generation service.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no API credential configured")]
    MissingCredential,

    #[error("rate limited by the image service")]
    RateLimited,

    #[error("image service unavailable")]
    ServiceUnavailable,

    #[error("image service timed out")]
    Timeout,

    /// Carries the service's human-readable reason.
    #[error("blocked by content policy: {reason}")]
    ContentPolicyBlocked { reason: String },

    /// Carries whatever text the service sent instead of an image.
    #[error("no image returned: {detail}")]
    NoImageReturned { detail: String },
}

impl GenerationError {
    /// Transient kinds worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServiceUnavailable | Self::Timeout
        )
    }
}

/// The two images and prompt for one generation call.
#[derive(Clone, Copy, Debug)]
pub struct GenerationInput<'a> {
    /// Face to transplant.
    pub source_face: &'a Bitmap,
    /// Square crop of the reference photo to paint it into.
    pub target_crop: &'a Bitmap,
    pub prompt: &'a str,
}

/// Boundary to the external generative image service.
///
/// Implementations own transport, request schema and decoding of the response; they return one
/// bitmap or a typed failure. Retries and timeouts are applied by the caller
/// ([`generate_with_retry`](crate::generate::retry::generate_with_retry)).
pub trait GenerationClient {
    fn generate(
        &self,
        input: GenerationInput<'_>,
    ) -> impl Future<Output = Result<Bitmap, GenerationError>>;
}
