use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use super::errors::GatewayError;
use super::formats::{create_request, response_to_completion, Completion};

const COMPLETIONS_PATH: &str = "v1/chat/completions";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Client for an OpenAI-compatible chat-completions gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| GatewayError::RequestFailed(format!("invalid gateway base URL: {e}")))?;
        let base_url = parsed.as_str().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(GatewayError::from)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, payload: &Value) -> Result<Response, GatewayError> {
        let url = format!("{}/{}", self.base_url, COMPLETIONS_PATH);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;
        handle_status(response).await
    }

    /// The non-streaming decision call. Returns the parsed completion with
    /// any tool calls the model requested.
    pub async fn complete(
        &self,
        messages: Vec<Value>,
        tools: &[Value],
    ) -> Result<Completion, GatewayError> {
        let payload = create_request(&self.model, messages, tools, false);
        let response = self.post(&payload).await?;
        let body: Value = response.json().await?;
        response_to_completion(&body)
    }

    /// The streaming follow-up call. Returns the raw response so the caller
    /// can forward its SSE bytes unmodified.
    pub async fn stream_answer(&self, messages: Vec<Value>) -> Result<Response, GatewayError> {
        let payload = create_request(&self.model, messages, &[], true);
        self.post(&payload).await
    }
}

/// Map gateway status codes onto the error taxonomy. Capacity failures (429,
/// 402) keep their identity so the relay can pass them through; anything else
/// collapses to a server error with the body logged here, not surfaced.
async fn handle_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 | 403 => Err(GatewayError::Authentication(format!(
            "gateway rejected credentials: {status}"
        ))),
        429 => Err(GatewayError::RateLimitExceeded(format!("status {status}"))),
        402 => Err(GatewayError::CreditsExhausted(format!("status {status}"))),
        _ => {
            tracing::error!(%status, body = %body, "model gateway error");
            Err(GatewayError::ServerError(format!("status {status}")))
        }
    }
}
