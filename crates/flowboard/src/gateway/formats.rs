//! Request and response shapes for the gateway's chat-completions API.
//!
//! Requests are built as raw JSON values so the relay can echo the model's
//! own assistant message (tool calls included) verbatim into the follow-up
//! call, the way the completions protocol expects.

use crate::conversation::ChatMessage;
use crate::gateway::errors::GatewayError;
use serde_json::{json, Value};

/// The leading system message for a completion request.
pub fn system_message(system: &str) -> Value {
    json!({
        "role": "system",
        "content": system,
    })
}

/// Conversation history in wire form, in order.
pub fn format_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| serde_json::to_value(m).unwrap_or_default())
        .collect()
}

/// A tool execution result, keyed to the tool call that produced it.
pub fn tool_result_message(tool_call_id: &str, content: &str) -> Value {
    json!({
        "role": "tool",
        "tool_call_id": tool_call_id,
        "content": content,
    })
}

/// Build the `/v1/chat/completions` payload. The `tools` array is only
/// attached when non-empty; the `stream` flag is always explicit.
pub fn create_request(model: &str, messages: Vec<Value>, tools: &[Value], stream: bool) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    if !tools.is_empty() {
        payload
            .as_object_mut()
            .expect("payload is an object")
            .insert("tools".to_string(), json!(tools));
    }
    payload
}

/// One tool invocation requested by the model. `arguments` is the raw JSON
/// string exactly as the model produced it; validation happens at execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// The parsed decision response: assistant text, requested tool calls in
/// model order, and the raw assistant message for verbatim echo.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub assistant_message: Value,
}

/// Convert a non-streaming completion response into a [`Completion`].
pub fn response_to_completion(response: &Value) -> Result<Completion, GatewayError> {
    let message = response["choices"][0]
        .get("message")
        .cloned()
        .ok_or_else(|| {
            GatewayError::RequestFailed("no choices in completion response".to_string())
        })?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(String::from);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            let id = call["id"].as_str().unwrap_or_default().to_string();
            let name = call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = call["function"]["arguments"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            tool_calls.push(ToolCallRequest {
                id,
                name,
                arguments,
            });
        }
    }

    Ok(Completion {
        content,
        tool_calls,
        assistant_message: message,
    })
}
