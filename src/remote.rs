use crate::config::Config;
use crate::credentials::Credential;
use crate::logging::get_logger;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Role instruction sent with every request
pub const SYSTEM_PROMPT: &str = "你是一个PowerShell命令生成助手。用户会用中文描述想要执行的系统操作，你需要返回对应的PowerShell命令。只返回命令本身，不要解释。";

/// Ways a remote resolution can fail. None of them reach the user as a
/// hard error; the orchestrator falls back to the local resolver.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("secure transport unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("API returned an empty completion")]
    EmptyCompletion,
}

impl RemoteError {
    /// Short code for the log file
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::CapabilityUnavailable(_) => "capability_unavailable",
            RemoteError::Timeout(_) => "timeout",
            RemoteError::Transport(_) => "transport",
            RemoteError::Status { .. } => "http_status",
            RemoteError::MalformedResponse(_) => "malformed_response",
            RemoteError::EmptyCompletion => "empty_completion",
        }
    }
}

/// Request parameters for the chat-completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl From<&Config> for RemoteSettings {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.request_timeout(),
        }
    }
}

/// Something that turns an instruction into a command using a credential
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn complete(&self, instruction: &str, credential: &Credential) -> Result<String, RemoteError>;

    /// Name used in diagnostics
    fn name(&self) -> &str;
}

/// Chat-completion client (DeepSeek-compatible API)
pub struct RemoteResolver {
    client: Client,
    settings: RemoteSettings,
}

impl RemoteResolver {
    /// Build the HTTPS client. Failure here means TLS support is missing
    /// from this runtime, and remote resolution is disabled for the process.
    pub fn new(settings: RemoteSettings) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .https_only(true)
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout)
            .build()
            .map_err(|e| RemoteError::CapabilityUnavailable(e.to_string()))?;

        Ok(Self { client, settings })
    }

    pub fn build_request_body(&self, instruction: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": instruction }
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens
        })
    }

    async fn send(&self, instruction: &str, credential: &Credential) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(credential.expose())
            .json(&self.build_request_body(instruction))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

        extract_command(&json)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_timeout() {
            RemoteError::Timeout(self.settings.timeout)
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl RemoteBackend for RemoteResolver {
    async fn complete(&self, instruction: &str, credential: &Credential) -> Result<String, RemoteError> {
        let started = Instant::now();
        let result = self.send(instruction, credential).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        if let Ok(logger) = get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let outcome = result.as_ref().err().map(RemoteError::code);
                let _ = logger_guard.log_remote_call(&self.settings.model, duration_ms, outcome);
            }
        }

        result
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}

/// `choices[0].message.content`, trimmed
pub fn extract_command(response: &Value) -> Result<String, RemoteError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            RemoteError::MalformedResponse("missing choices[0].message.content".to_string())
        })?;

    let command = content.trim();
    if command.is_empty() {
        return Err(RemoteError::EmptyCompletion);
    }

    Ok(command.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
