//! Contract for the external image generation service and the retry driver around it.

pub mod client;
pub mod retry;
