use crate::event::AppEvent;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, LazyLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```(?:\w+)?\s*\n").expect("opening fence should compile"));
static CLOSING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```[\s\S]*$").expect("closing fence should compile"));

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Please set an OpenAI API key.")]
    MissingApiKey,
    #[error("a request is already in flight")]
    Busy,
    #[error("tokio runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Api { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub api_base: String,
    pub model: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub api_key: String,
    pub system: String,
    pub prompt: String,
}

pub fn system_prompt(user_system_prompt: &str, header: &[String]) -> String {
    format!(
        "{user_system_prompt}\nalways respond in csv\nexisting headers:\n{}",
        header.join(",")
    )
}

/// Drops a leading code fence line (with optional language tag) and
/// everything from the closing fence on, then trims.
pub fn trim_response(completion: &str) -> String {
    let without_opening = OPENING_FENCE.replace(completion, "");
    CLOSING_FENCE
        .replace(&without_opening, "")
        .trim()
        .to_string()
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    tx: mpsc::Sender<AppEvent>,
    http: Client,
    config: CompletionConfig,
    runtime_handle: Handle,
    in_flight: Arc<AtomicBool>,
}

impl CompletionClient {
    pub fn new(
        tx: mpsc::Sender<AppEvent>,
        config: CompletionConfig,
    ) -> Result<Self, CompletionError> {
        let runtime_handle = Handle::try_current()
            .map_err(|err| CompletionError::RuntimeUnavailable(err.to_string()))?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            tx,
            http,
            config,
            runtime_handle,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn set_config(&mut self, config: CompletionConfig) {
        self.config = config;
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn send(&self, request: CompletionRequest) -> Result<(), CompletionError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CompletionError::Busy);
        }

        let tx = self.tx.clone();
        let http = self.http.clone();
        let config = self.config.clone();
        let in_flight = Arc::clone(&self.in_flight);

        self.runtime_handle.spawn(async move {
            let started = Instant::now();
            let event = match complete(&http, &config, &request).await {
                Ok(text) => {
                    info!(
                        model = %config.model,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        chars = text.len(),
                        "completion received"
                    );
                    AppEvent::CompletionReceived(text)
                }
                Err(err) => {
                    warn!(model = %config.model, error = %err, "completion failed");
                    AppEvent::CompletionFailed(err.to_string())
                }
            };
            in_flight.store(false, Ordering::SeqCst);
            let _ = tx.send(event);
        });
        Ok(())
    }
}

async fn complete(
    http: &Client,
    config: &CompletionConfig,
    request: &CompletionRequest,
) -> Result<String, CompletionError> {
    let body = ChatRequest {
        model: &config.model,
        messages: [
            ChatMessage {
                role: "system",
                content: &request.system,
            },
            ChatMessage {
                role: "user",
                content: &request.prompt,
            },
        ],
    };

    let response = http
        .post(&config.api_base)
        .bearer_auth(&request.api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError::Api { status, body });
    }

    let chat_response: ChatResponse = response.json().await?;
    Ok(chat_response.into_text())
}

#[cfg(test)]
mod tests {
    use super::{system_prompt, trim_response, ChatMessage, ChatRequest, ChatResponse};
    use serde_json::json;

    #[test]
    fn removes_fence_without_language() {
        assert_eq!(trim_response("```\nHello World\n```"), "Hello World");
    }

    #[test]
    fn removes_fence_with_language() {
        assert_eq!(trim_response("```csv\nname,age\nBob,30\n```"), "name,age\nBob,30");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(
            trim_response("   ```\n   Some code here   \n   ```   "),
            "Some code here"
        );
    }

    #[test]
    fn bare_fence_and_empty_input_become_empty() {
        assert_eq!(trim_response("```"), "");
        assert_eq!(trim_response(""), "");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(trim_response("\n a,b\n1,2 \n"), "a,b\n1,2");
    }

    #[test]
    fn text_after_closing_fence_is_dropped() {
        assert_eq!(
            trim_response("```csv\na,b\n```\nLet me know if you need more."),
            "a,b"
        );
    }

    #[test]
    fn system_prompt_lists_existing_headers() {
        let header = vec!["name".to_string(), "age".to_string()];
        assert_eq!(
            system_prompt("Find people", &header),
            "Find people\nalways respond in csv\nexisting headers:\nname,age"
        );
        assert_eq!(
            system_prompt("", &[]),
            "\nalways respond in csv\nexisting headers:\n"
        );
    }

    #[test]
    fn request_body_has_system_then_user_message() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "hi",
                },
            ],
        };
        let value = serde_json::to_value(&body).expect("request should serialize");
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ]
            })
        );
    }

    #[test]
    fn response_text_comes_from_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "a,b\n1,2"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }))
        .expect("response should parse");
        assert_eq!(response.into_text(), "a,b\n1,2");
    }

    #[test]
    fn missing_content_is_empty_text() {
        let response: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]}))
                .expect("response should parse");
        assert_eq!(response.into_text(), "");

        let response: ChatResponse =
            serde_json::from_value(json!({})).expect("empty response should parse");
        assert_eq!(response.into_text(), "");
    }
}
