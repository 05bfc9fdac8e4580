//! Narrative generation backend.
//!
//! [`NarrativeGenerator`] is the black-box boundary: a directive document in,
//! plain narrative text out. [`ChatCompletionsGenerator`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bizintel_shared::{BizIntelError, GenerationConfig, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One generation call: the synthesized document plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Chat completions client
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Base delay before the first retry; doubles on each further attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Generator backed by an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base = url::Url::parse(&config.base_url).map_err(|e| {
            BizIntelError::config(format!("invalid generation base_url {}: {e}", config.base_url))
        })?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BizIntelError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_base_delay: RETRY_BASE_DELAY,
        })
    }

    /// Override the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn call(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BizIntelError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BizIntelError::Generation(format!(
                "HTTP {status}: {}",
                detail.trim()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BizIntelError::Generation(format!("malformed response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| BizIntelError::Generation("empty response from model".into()))
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionsGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.call(request).await {
                Ok(text) => {
                    debug!(model = %self.model, chars = text.len(), "narrative generated");
                    return Ok(text);
                }
                Err(e) if attempt < self.max_retries => {
                    let delay = self.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(error = %e, attempt, ?delay, "generation failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Scripted generators for pipeline and orchestrator tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    enum Script {
        Reply(String),
        Fail,
        Panic,
    }

    /// Answers by looking for a key in the prompt; unscripted prompts fail.
    #[derive(Default)]
    pub struct ScriptedGenerator {
        scripts: Vec<(String, Script)>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(mut self, key: &str, narrative: impl Into<String>) -> Self {
            self.scripts.push((key.into(), Script::Reply(narrative.into())));
            self
        }

        pub fn fail(mut self, key: &str) -> Self {
            self.scripts.push((key.into(), Script::Fail));
            self
        }

        pub fn panic_on(mut self, key: &str) -> Self {
            self.scripts.push((key.into(), Script::Panic));
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NarrativeGenerator for ScriptedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let script = self
                .scripts
                .iter()
                .find(|(key, _)| request.prompt.contains(key.as_str()))
                .map(|(_, script)| script);
            match script {
                Some(Script::Reply(text)) => Ok(text.clone()),
                Some(Script::Panic) => panic!("scripted generator panic"),
                Some(Script::Fail) | None => {
                    Err(BizIntelError::Generation("scripted failure".into()))
                }
            }
        }
    }
}
