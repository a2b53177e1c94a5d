mod cache;
mod prompt;

pub use cache::CompletionCache;
pub use prompt::{constrain_output, pick_completion, QueryStyle};

use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::env;
use tokio::runtime::Runtime;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionProvider {
    OpenAi,
    Anthropic,
    Local,
}

impl CompletionProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionProvider::OpenAi => "openai",
            CompletionProvider::Anthropic => "anthropic",
            CompletionProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Some(CompletionProvider::OpenAi),
            "anthropic" => Some(CompletionProvider::Anthropic),
            "local" => Some(CompletionProvider::Local),
            _ => None,
        }
    }
}

/// One completion call over a rendered few-shot prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub samples: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 50,
            samples: 25,
            temperature: 0.1,
            stop: vec!["Q".to_string(), "\n".to_string(), "Question".to_string()],
        }
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    http: Client,
    provider: CompletionProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
    Local,
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: String,
    base_url: String,
}

#[derive(Clone)]
struct AnthropicConfig {
    api_key: String,
}

impl CompletionClient {
    pub fn new(provider: CompletionProvider, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        let http = Client::new();
        let config = match provider {
            CompletionProvider::OpenAi => ProviderConfig::OpenAi(OpenAiConfig {
                api_key: read_api_key("OPENAI_API_KEY")?,
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            }),
            CompletionProvider::Anthropic => ProviderConfig::Anthropic(AnthropicConfig {
                api_key: read_api_key("ANTHROPIC_API_KEY")?,
            }),
            CompletionProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        let provider_name =
            env::var("SPANLEARN_LLM_PROVIDER").unwrap_or_else(|_| "local".to_string());
        let provider = CompletionProvider::from_str(&provider_name)
            .ok_or_else(|| anyhow!(format!("unknown provider {provider_name}")))?;
        let model = env::var("SPANLEARN_LLM_MODEL")
            .unwrap_or_else(|_| default_model(provider).to_string());
        Self::new(provider, model)
    }

    pub fn provider(&self) -> CompletionProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, req: &CompletionRequest) -> Result<Vec<String>> {
        match &self.config {
            ProviderConfig::OpenAi(cfg) => self.complete_openai(cfg, req).await,
            ProviderConfig::Anthropic(cfg) => self.complete_anthropic(cfg, req).await,
            ProviderConfig::Local => Ok(vec![synthesize_local_completion(&req.prompt)]),
        }
    }

    pub fn complete_blocking(&self, req: &CompletionRequest) -> Result<Vec<String>> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.complete(req))
    }

    async fn complete_openai(
        &self,
        cfg: &OpenAiConfig,
        req: &CompletionRequest,
    ) -> Result<Vec<String>> {
        const MAX_RETRIES: usize = 6;
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let payload = json!({
            "model": self.model,
            "messages": [ { "role": "user", "content": req.prompt } ],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "n": req.samples,
            "stop": req.stop,
        });
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match self
                .http
                .post(&url)
                .bearer_auth(&cfg.api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| "openai request failed");
                    }
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("openai rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let parsed = response
                .error_for_status()
                .context("openai returned an error")?
                .json::<ChatResponse>()
                .await
                .context("failed to decode openai response")?;
            let completions: Vec<String> = parsed
                .choices
                .into_iter()
                .map(|choice| choice.message.content)
                .collect();
            if completions.is_empty() {
                return Err(anyhow!("missing text in OpenAI response"));
            }
            return Ok(completions);
        }
    }

    async fn complete_anthropic(
        &self,
        cfg: &AnthropicConfig,
        req: &CompletionRequest,
    ) -> Result<Vec<String>> {
        let payload = json!({
            "model": self.model,
            "max_tokens": req.max_tokens,
            "stop_sequences": req.stop,
            "temperature": req.temperature,
            "messages": [ { "role": "user", "content": req.prompt } ],
        });
        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &cfg.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .with_context(|| "anthropic request failed")?
            .error_for_status()
            .context("anthropic returned an error")?
            .json::<AnthropicResponse>()
            .await
            .context("failed to decode anthropic response")?;
        let text = response
            .content
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| anyhow!("missing text in Anthropic response"))?;
        Ok(vec![text])
    }
}

/// Render, complete and select: the one call a synthesis engine makes with a
/// clustered example group and a fresh input. Completions are cached by the
/// rendered prompt; `force_input` overrides the substring-of-input detection.
pub fn run_query(
    client: &CompletionClient,
    cache: &mut CompletionCache,
    style: QueryStyle,
    background: &[(String, String)],
    question: &str,
    force_input: Option<bool>,
) -> Result<String> {
    let prompt = style.render(background, question);
    if cache.get(&prompt).is_none() {
        tracing::debug!(provider = client.provider().as_str(), "completion cache miss");
        let completions = client.complete_blocking(&CompletionRequest::new(prompt.as_str()))?;
        cache.insert(prompt.clone(), completions);
    }
    let completions = cache
        .get(&prompt)
        .cloned()
        .unwrap_or_default();
    let constrained = force_input.unwrap_or_else(|| constrain_output(background));
    Ok(pick_completion(&completions, question, constrained))
}

fn default_model(provider: CompletionProvider) -> &'static str {
    match provider {
        CompletionProvider::OpenAi => "gpt-4.1-mini",
        CompletionProvider::Anthropic => "claude-3-5-sonnet",
        CompletionProvider::Local => "local",
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

/// Deterministic stand-in used without network access: answer with the
/// trailing question of the few-shot prompt.
fn synthesize_local_completion(prompt: &str) -> String {
    if let Some(idx) = prompt.rfind("Q: ") {
        let tail = &prompt[idx + 3..];
        let end = tail.find(" A:").unwrap_or(tail.len());
        return tail[..end].trim().to_string();
    }
    if let Some(idx) = prompt.rfind("Question: ") {
        let tail = &prompt[idx + 10..];
        let end = tail.find("\nAnswer:").unwrap_or(tail.len());
        return tail[..end].trim().to_string();
    }
    if let Some(idx) = prompt.rfind(" =>") {
        let head = &prompt[..idx];
        return head.rsplit('\n').next().unwrap_or(head).trim().to_string();
    }
    prompt.trim().to_string()
}

fn read_api_key(var: &str) -> Result<String> {
    let value = env::var(var).map_err(|_| anyhow!(format!("{var} is not set")))?;
    if var.contains("OPENAI") && !value.starts_with("sk-") {
        return Err(anyhow!(format!("{var} must start with 'sk-'")));
    }
    if var.contains("ANTHROPIC") && !value.starts_with("sk-ant-") {
        return Err(anyhow!(format!("{var} must start with 'sk-ant-'")));
    }
    Ok(value)
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_completion_echoes_the_question() {
        let background = vec![("Total: 42 USD".to_string(), "42".to_string())];
        let prompt = QueryStyle::Short.render(&background, "Total: 13 USD");
        assert_eq!(synthesize_local_completion(&prompt), "Total: 13 USD");
    }

    #[test]
    fn run_query_caches_by_prompt() {
        let client = CompletionClient::new(CompletionProvider::Local, "local").unwrap();
        let mut cache = CompletionCache::in_memory();
        let background = vec![("one two".to_string(), "two".to_string())];

        let answer = run_query(
            &client,
            &mut cache,
            QueryStyle::Short,
            &background,
            "three four",
            None,
        )
        .unwrap();
        // constrained: the echoed question contains itself
        assert_eq!(answer, "three four");
        assert!(!cache.is_empty());
    }

    #[test]
    fn backoff_prefers_retry_after_header() {
        let header = HeaderValue::from_static("7");
        assert_eq!(backoff_delay(1, Some(&header)), Duration::from_secs(7));
        assert_eq!(backoff_delay(2, None), Duration::from_secs(4));
    }
}
