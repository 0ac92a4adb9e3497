//! Vision call: build the chat messages and drive the provider with retries.
//!
//! Prompt text lives in [`crate::prompts`]; this module only knows about
//! message layout, retry and timeout.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 responses are transient. Exponential backoff
//! (`retry_backoff_ms * 2^attempt`) with a 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s before giving up.

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Ask the provider to analyse `images` according to the user's `prompt`.
///
/// ## Message Layout
///
/// 1. **System message**: the analysis prompt (or the configured override)
/// 2. **Context message** *(optional)*: e.g. "pages 1-10 of 42 are attached"
/// 3. **User message**: the prompt text with every image attached
pub async fn request_analysis(
    provider: &Arc<dyn LLMProvider>,
    prompt: &str,
    images: Vec<ImageData>,
    context_note: Option<String>,
    config: &AnalyzerConfig,
) -> Result<String, AnalysisError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let mut messages = vec![ChatMessage::system(system_prompt)];
    if let Some(note) = context_note {
        messages.push(ChatMessage::system(note));
    }
    messages.push(ChatMessage::user_with_images(prompt, images));

    let options = build_options(config);
    let mut last_err: Option<AnalysisError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!("retry {}/{} after {}ms", attempt, config.max_retries, backoff);
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(&messages, Some(&options));
        let outcome = match config.api_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), call).await {
                Ok(res) => res.map_err(|e| e.to_string()),
                Err(_) => {
                    warn!("attempt {} timed out after {}s", attempt + 1, secs);
                    last_err = Some(AnalysisError::Timeout { secs });
                    continue;
                }
            },
            None => call.await.map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(response) => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(response.content);
            }
            Err(message) => {
                warn!("attempt {} failed: {}", attempt + 1, message);
                last_err = Some(AnalysisError::Api {
                    retries: config.max_retries,
                    message,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AnalysisError::Internal("no attempt was made".into())))
}

/// Build `CompletionOptions` from the analyzer config.
fn build_options(config: &AnalyzerConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Delay before retry number `attempt` (1-based). Saturates instead of
/// overflowing for long retry chains.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_retry() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
    }

    #[test]
    fn backoff_saturates_on_long_retry_chains() {
        assert_eq!(backoff_ms(500, 65), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }

    #[test]
    fn build_options_defaults() {
        let config = AnalyzerConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
