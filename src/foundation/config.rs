use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::error::{PatchError, PatchResult};
use crate::generate::retry::RetryPolicy;

const DEFAULT_PROMPT: &str = "Replace the face in the second image with the face from the first \
image. Keep the pose, lighting, skin tone transitions and framing of the second image.";

/// Tunables for one editing session.
///
/// Every field has a default, so a JSON document only needs to name what it changes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionOpts {
    /// A released drag commits only when the native square is wider than this.
    pub min_selection_px: u32,
    /// Longest side of the crop handed to the generation call.
    pub max_crop_dim: u32,
    /// Feather band width as a fraction of the patch's shorter side.
    pub feather_ratio: f32,
    /// Split fraction the comparison view resets to for every new composite.
    pub default_split: f32,
    /// Hard timeout raced against each generation attempt.
    pub generation_timeout_ms: u64,
    /// Backoff applied to retryable generation failures.
    pub retry: RetryPolicy,
    /// Text prompt sent alongside the two images.
    pub prompt: String,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            min_selection_px: 50,
            max_crop_dim: 1024,
            feather_ratio: 0.15,
            default_split: 0.5,
            generation_timeout_ms: 90_000,
            retry: RetryPolicy::default(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl SessionOpts {
    /// Parse options from a JSON document.
    pub fn from_json_str(s: &str) -> PatchResult<Self> {
        let opts: Self = serde_json::from_str(s)
            .map_err(|e| PatchError::validation(format!("session options json: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Read options from a JSON file.
    pub fn load(path: &Path) -> PatchResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read session options '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Apply `FACEPATCH_*` environment overrides. Unparseable or zero values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("FACEPATCH_MAX_CROP_DIM").filter(|&n| n > 0) {
            self.max_crop_dim = v;
        }
        if let Some(v) = env_parse::<f32>("FACEPATCH_FEATHER_RATIO")
            .filter(|v| v.is_finite() && (0.0..=0.5).contains(v))
        {
            self.feather_ratio = v;
        }
        if let Some(v) = env_parse::<u64>("FACEPATCH_GENERATION_TIMEOUT_MS").filter(|&n| n > 0) {
            self.generation_timeout_ms = v;
        }
        self
    }

    pub fn validate(&self) -> PatchResult<()> {
        if self.max_crop_dim == 0 {
            return Err(PatchError::validation("max_crop_dim must be > 0"));
        }
        if !self.feather_ratio.is_finite() || !(0.0..=0.5).contains(&self.feather_ratio) {
            return Err(PatchError::validation(
                "feather_ratio must be finite and within [0, 0.5]",
            ));
        }
        if !self.default_split.is_finite() || !(0.0..=1.0).contains(&self.default_split) {
            return Err(PatchError::validation(
                "default_split must be finite and within [0, 1]",
            ));
        }
        if self.generation_timeout_ms == 0 {
            return Err(PatchError::validation("generation_timeout_ms must be > 0"));
        }
        self.retry.validate()
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
