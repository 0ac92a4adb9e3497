//! The analyzer seam: prompt + file in, result text out.
//!
//! [`Analyzer`] is what the session calls when a request is submitted. Tests
//! and embedders plug in their own; [`LlmAnalyzer`] is the production
//! implementation backed by an edgequake-llm vision provider.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::file::RawFile;
use crate::pipeline::{encode, llm, render};
use crate::prompts::pdf_pages_context;
use async_trait::async_trait;
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Turns a prompt and a file into an analysis result.
///
/// Called at most once per submitted request, on a task of its own: the call
/// runs to completion even when the submitting caller stops waiting. A reset
/// in the meantime makes the session discard the outcome.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, prompt: &str, file: &RawFile) -> Result<String, AnalysisError>;
}

/// Vision-model analyzer.
///
/// Images are attached as they are. PDFs are rasterised first: up to
/// `pdf_max_pages` leading pages are attached and a short note tells the
/// model how many pages it is missing. Any other media type is refused.
#[derive(Clone)]
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    config: AnalyzerConfig,
}

impl fmt::Debug for LlmAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmAnalyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LlmAnalyzer {
    /// Resolve the provider described by `config` and build the analyzer.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalysisError> {
        let provider = resolve_provider(&config)?;
        info!(
            "LLM provider resolved ({})",
            config.provider_name.as_deref().unwrap_or("auto")
        );
        Ok(Self { provider, config })
    }

    /// Build directly around a provider, ignoring `config.provider`.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: AnalyzerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    async fn attachments(&self, file: &RawFile) -> Result<(Vec<ImageData>, Option<String>), AnalysisError> {
        if file.is_image() {
            return Ok((vec![encode::encode_payload(file)], None));
        }
        if file.is_pdf() {
            let rendered = render::render_pdf(file, &self.config).await?;
            let sent = rendered.pages.len();
            let images = rendered
                .pages
                .iter()
                .map(encode::encode_page)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AnalysisError::Render {
                    name: file.name().to_string(),
                    detail: e.to_string(),
                })?;
            debug!("Attaching {} of {} pages of '{}'", sent, rendered.total_pages, file.name());
            return Ok((images, pdf_pages_context(sent, rendered.total_pages)));
        }
        Err(AnalysisError::UnsupportedMedia {
            media_type: file.media_type().to_string(),
        })
    }
}

#[async_trait]
impl Analyzer for LlmAnalyzer {
    async fn analyze(&self, prompt: &str, file: &RawFile) -> Result<String, AnalysisError> {
        let (images, note) = self.attachments(file).await?;
        llm::request_analysis(&self.provider, prompt, images, note, &self.config).await
    }
}

/// Create a provider by name via [`ProviderFactory::create_llm_provider`].
fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the provider, in order of precedence:
///
/// 1. a pre-built provider in the config
/// 2. `provider_name` (+ `model`, defaulting to [`DEFAULT_MODEL`])
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. full auto-detection via [`ProviderFactory::from_env`]
fn resolve_provider(config: &AnalyzerConfig) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Analyzer for Echo {
        async fn analyze(&self, prompt: &str, file: &RawFile) -> Result<String, AnalysisError> {
            Ok(format!("{prompt} / {}", file.name()))
        }
    }

    #[tokio::test]
    async fn analyzer_is_object_safe() {
        let analyzer: Arc<dyn Analyzer> = Arc::new(Echo);
        let file = RawFile::new("a.png", "image/png", vec![1u8]);
        let out = analyzer.analyze("describe", &file).await.unwrap();
        assert_eq!(out, "describe / a.png");
    }
}
