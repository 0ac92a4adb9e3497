//! Configuration types for intake, progress simulation and analysis.
//!
//! Two structs cover the two halves of the library:
//!
//! * [`SessionConfig`]: everything the session core consumes: the working-set
//!   cap, the size limit, the accept set, transcoding knobs and progress
//!   timings, plus an optional [`SessionObserver`].
//! * [`AnalyzerConfig`]: how [`crate::analyze::LlmAnalyzer`] talks to the
//!   vision model.
//!
//! Both are built through builders that clamp values into range and validate
//! on `build()`, and both have `Default` impls carrying the documented
//! defaults.

use crate::error::ScanError;
use crate::file::RawFile;
use crate::observer::ObserverRef;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Upper bound for [`AnalyzerConfig::max_retries`].
pub const MAX_RETRIES: u32 = 10;

/// Configuration for a [`crate::Session`].
///
/// # Example
/// ```rust
/// use scanalyze::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .max_files(1)
///     .max_size_mb(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_size_bytes(), 20 * 1024 * 1024);
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Maximum number of files in the working set. Minimum 1. Default: 1.
    pub max_files: usize,

    /// Maximum payload size after transcoding, in megabytes. Default: 20.
    pub max_size_mb: u64,

    /// Accepted media-type patterns and their file extensions.
    pub accept: AcceptMap,

    /// Longest edge, in pixels, of a transcoded image. Default: 1200.
    pub max_dimension: u32,

    /// JPEG quality (1–100) of a transcoded image. Default: 80.
    pub jpeg_quality: u8,

    /// How many candidates of one batch are transcoded at once. Default: 4.
    pub intake_concurrency: usize,

    /// Tick interval of the per-file upload animation. Default: 100 ms.
    pub upload_tick_ms: u64,

    /// Tick interval of the analysis animation. Default: 150 ms.
    pub analysis_tick_ms: u64,

    /// Percentage added on every tick. Default: 5.
    pub progress_step: u8,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives admission, progress and analysis events.
    pub observer: Option<ObserverRef>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_files: 1,
            max_size_mb: 20,
            accept: AcceptMap::default(),
            max_dimension: 1200,
            jpeg_quality: 80,
            intake_concurrency: 4,
            upload_tick_ms: 100,
            analysis_tick_ms: 150,
            progress_step: 5,
            download_timeout_secs: 120,
            observer: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("max_files", &self.max_files)
            .field("max_size_mb", &self.max_size_mb)
            .field("accept", &self.accept)
            .field("max_dimension", &self.max_dimension)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("intake_concurrency", &self.intake_concurrency)
            .field("upload_tick_ms", &self.upload_tick_ms)
            .field("analysis_tick_ms", &self.analysis_tick_ms)
            .field("progress_step", &self.progress_step)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn SessionObserver>"))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The size limit in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(MIB)
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_millis(self.upload_tick_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_tick_ms)
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n.max(1);
        self
    }

    pub fn max_size_mb(mut self, mb: u64) -> Self {
        self.config.max_size_mb = mb;
        self
    }

    pub fn accept(mut self, accept: AcceptMap) -> Self {
        self.config.accept = accept;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(16);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn intake_concurrency(mut self, n: usize) -> Self {
        self.config.intake_concurrency = n.max(1);
        self
    }

    pub fn upload_tick_ms(mut self, ms: u64) -> Self {
        self.config.upload_tick_ms = ms;
        self
    }

    pub fn analysis_tick_ms(mut self, ms: u64) -> Self {
        self.config.analysis_tick_ms = ms;
        self
    }

    pub fn progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step.clamp(1, 100);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, ScanError> {
        let c = &self.config;
        if c.max_files == 0 {
            return Err(ScanError::InvalidConfig("max_files must be ≥ 1".into()));
        }
        if c.max_size_mb == 0 {
            return Err(ScanError::InvalidConfig("max_size_mb must be ≥ 1".into()));
        }
        if c.accept.is_empty() {
            return Err(ScanError::InvalidConfig(
                "accept set must name at least one media type".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Accept set ───────────────────────────────────────────────────────────

/// Mapping from media-type pattern (`image/*`, `application/pdf`) to the file
/// extensions a picker should offer for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptMap(BTreeMap<String, Vec<String>>);

impl Default for AcceptMap {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            "image/*".to_string(),
            [".jpeg", ".jpg", ".png", ".gif", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        map.insert("application/pdf".to_string(), vec![".pdf".to_string()]);
        Self(map)
    }
}

impl AcceptMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Add (or replace) a pattern.
    pub fn with(mut self, pattern: impl Into<String>, extensions: &[&str]) -> Self {
        self.0.insert(
            pattern.into(),
            extensions.iter().map(|e| e.to_string()).collect(),
        );
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every extension of every pattern, for file pickers.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.0.values().flatten().map(String::as_str)
    }

    /// Does the declared media type match one of the patterns?
    pub fn accepts_media_type(&self, media_type: &str) -> bool {
        let media_type = media_type.trim().to_ascii_lowercase();
        self.0.keys().any(|pattern| match pattern.strip_suffix("/*") {
            Some(top) => media_type
                .split_once('/')
                .is_some_and(|(t, _)| t == top),
            None => pattern.eq_ignore_ascii_case(&media_type),
        })
    }

    pub fn accepts(&self, file: &RawFile) -> bool {
        self.accepts_media_type(file.media_type())
    }
}

// ── Analyzer configuration ───────────────────────────────────────────────

/// Configuration for [`crate::analyze::LlmAnalyzer`].
///
/// # Example
/// ```rust
/// use scanalyze::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .model("gpt-4.1-mini")
///     .pdf_max_pages(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.pdf_max_pages, 4);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// LLM model identifier. If None, uses `gpt-4.1-nano` for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens generated for one analysis. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts after a failed call, at most [`MAX_RETRIES`]. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout in seconds; `None` leaves timing to the provider. Default: 120.
    pub api_timeout_secs: Option<u64>,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// How many PDF pages are rasterised and attached. Default: 10.
    pub pdf_max_pages: usize,

    /// Longest edge of a rasterised PDF page. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Password for encrypted PDFs.
    pub pdf_password: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: Some(120),
            system_prompt: None,
            pdf_max_pages: 10,
            max_rendered_pixels: 2000,
            pdf_password: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("pdf_max_pages", &self.pdf_max_pages)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .finish()
    }
}

impl AnalyzerConfig {
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    /// Retries after the first attempt, capped at [`MAX_RETRIES`].
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pdf_max_pages(mut self, n: usize) -> Self {
        self.config.pdf_max_pages = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, ScanError> {
        if self.config.max_tokens == 0 {
            return Err(ScanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if self.config.api_timeout_secs == Some(0) {
            return Err(ScanError::InvalidConfig(
                "api_timeout_secs must be ≥ 1 when set".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = SessionConfig::default();
        assert_eq!(c.max_files, 1);
        assert_eq!(c.max_size_mb, 20);
        assert_eq!(c.max_size_bytes(), 20 * 1024 * 1024);
        assert_eq!(c.max_dimension, 1200);
        assert_eq!(c.jpeg_quality, 80);
        assert_eq!(c.upload_interval(), Duration::from_millis(100));
        assert_eq!(c.analysis_interval(), Duration::from_millis(150));
        assert_eq!(c.progress_step, 5);
    }

    #[test]
    fn builder_clamps_values() {
        let c = SessionConfig::builder()
            .max_files(0)
            .jpeg_quality(0)
            .progress_step(0)
            .build()
            .unwrap();
        assert_eq!(c.max_files, 1);
        assert_eq!(c.jpeg_quality, 1);
        assert_eq!(c.progress_step, 1);
    }

    #[test]
    fn builder_rejects_zero_size_and_empty_accept() {
        assert!(SessionConfig::builder().max_size_mb(0).build().is_err());
        assert!(SessionConfig::builder().accept(AcceptMap::new()).build().is_err());
    }

    #[test]
    fn accept_map_matches_wildcards_and_exact_types() {
        let accept = AcceptMap::default();
        assert!(accept.accepts_media_type("image/png"));
        assert!(accept.accepts_media_type("image/webp"));
        assert!(accept.accepts_media_type("IMAGE/JPEG"));
        assert!(accept.accepts_media_type("application/pdf"));
        assert!(!accept.accepts_media_type("application/msword"));
        assert!(!accept.accepts_media_type("imagery"));
        assert!(!accept.accepts_media_type(""));
    }

    #[test]
    fn accept_map_lists_extensions() {
        let accept = AcceptMap::new().with("text/plain", &[".txt"]);
        assert_eq!(accept.extensions().collect::<Vec<_>>(), vec![".txt"]);
        assert_eq!(accept.patterns().collect::<Vec<_>>(), vec!["text/plain"]);
        assert!(AcceptMap::default().extensions().any(|e| e == ".pdf"));
    }

    #[test]
    fn analyzer_defaults() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.pdf_max_pages, 10);
        assert!(AnalyzerConfig::builder().max_tokens(0).build().is_err());
        assert!(AnalyzerConfig::builder()
            .api_timeout_secs(Some(0))
            .build()
            .is_err());
    }

    #[test]
    fn analyzer_builder_caps_retries() {
        let c = AnalyzerConfig::builder().max_retries(500).build().unwrap();
        assert_eq!(c.max_retries, MAX_RETRIES);
        let c = AnalyzerConfig::builder().max_retries(2).build().unwrap();
        assert_eq!(c.max_retries, 2);
    }
}
