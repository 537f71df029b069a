use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::{info, warn};

use dockhand_core::config::{ModelConfig, RetryConfig};
use dockhand_core::error::{DockhandError, Result};
use dockhand_core::traits::LlmClient;
use dockhand_core::types::*;

/// An LLM client that retries failed requests and falls back to alternative models.
pub struct RetryingClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

fn is_retryable(e: &DockhandError) -> bool {
    match e {
        DockhandError::LlmRequest(msg) => {
            ["429", "500", "502", "503", "504", "timeout", "connection"]
                .iter()
                .any(|needle| msg.contains(needle))
        }
        DockhandError::LlmStream(_) => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let base = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((base as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self
                    .primary
                    .chat_stream(&config, messages.clone(), &tools)
                    .await
                {
                    Ok(stream) => return Ok(stream),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        last_err = Some(e);
                    }
                    Err(e) => {
                        last_err = Some(e);
                        break;
                    }
                }
            }

            if !self.fallbacks.is_empty() {
                info!("Primary model exhausted, trying fallback models");
            }
            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client
                    .chat_stream(fb_config, messages.clone(), &tools)
                    .await
                {
                    Ok(stream) => {
                        info!(model = %fb_config.model_id, "Fell back to alternative model");
                        return Ok(stream);
                    }
                    Err(e) => {
                        warn!(model = %fb_config.model_id, error = %e, "Fallback model also failed");
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| DockhandError::LlmRequest("All providers failed".into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails `failures` times with the given error, then streams one text delta.
    struct FlakyClient {
        calls: Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> DockhandError,
    }

    impl LlmClient for FlakyClient {
        fn chat_stream(
            &self,
            _config: &ModelConfig,
            _messages: Vec<ChatMessage>,
            _tools: &[ToolDefinition],
        ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    return Err((self.error)());
                }
                let items = vec![Ok(StreamDelta::TextDelta("ok".into()))];
                Ok(Box::pin(futures::stream::iter(items)) as BoxStream<'_, Result<StreamDelta>>)
            })
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&DockhandError::LlmRequest("HTTP 429 Too Many Requests".into())));
        assert!(is_retryable(&DockhandError::LlmStream("reset".into())));
        assert!(!is_retryable(&DockhandError::LlmRequest("HTTP 401".into())));
        assert!(!is_retryable(&DockhandError::Cancelled));
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        let backoff = calculate_backoff(20, &config);
        assert!(backoff <= Duration::from_millis(6000));
        assert!(backoff >= Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingClient::new(
            Box::new(FlakyClient {
                calls: calls.clone(),
                failures: 2,
                error: || DockhandError::LlmRequest("HTTP 503".into()),
            }),
            vec![],
            fast_retry(3),
        );

        let result = client
            .chat_stream(&ModelConfig::default(), vec![ChatMessage::user("hi")], &[])
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_goes_to_fallback() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingClient::new(
            Box::new(FlakyClient {
                calls: primary_calls.clone(),
                failures: usize::MAX,
                error: || DockhandError::LlmRequest("HTTP 401".into()),
            }),
            vec![(
                ModelConfig::default(),
                Box::new(FlakyClient {
                    calls: fallback_calls.clone(),
                    failures: 0,
                    error: || DockhandError::Cancelled,
                }) as Box<dyn LlmClient>,
            )],
            fast_retry(3),
        );

        let result = client
            .chat_stream(&ModelConfig::default(), vec![ChatMessage::user("hi")], &[])
            .await;
        assert!(result.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }
}
