//! The chat relay: decide, act, answer.
//!
//! One POST per chat turn. The relay asks the gateway once (non-streaming)
//! whether tools should run, executes them sequentially against the
//! owner-scoped store, then either synthesizes a one-frame SSE body from the
//! already-complete answer or streams the gateway's follow-up verbatim,
//! prefixed with a synthetic frame naming the executed tools.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;

use flowboard::conversation::ChatMessage;
use flowboard::gateway::formats::{format_messages, system_message, tool_result_message};
use flowboard::gateway::GatewayError;
use flowboard::sse::{data_frame, done_frame};
use flowboard::tools::{execute_tool_call, tool_definitions};

use crate::auth::bearer_token;
use crate::state::AppState;

const SYSTEM_PROMPT: &str = "You are FlowBoard AI, a helpful assistant integrated into a Kanban board app. You can help users with:\n\
1. General questions - answer anything like a knowledgeable assistant\n\
2. Task management - you can CREATE, UPDATE, and DELETE tasks directly on the board using your tools\n\
3. Productivity advice - time management, workflow optimization\n\
\n\
When the user asks you to create a task, move a task, change priority, or delete a task, USE YOUR TOOLS to do it immediately.\n\
When updating or deleting, match the task by title from the user's tasks list to find the correct task_id.\n\
\n\
Be concise, friendly, and actionable. Use markdown formatting when helpful.\n";

#[derive(Debug, Deserialize)]
pub struct ChatRelayRequest {
    messages: Vec<ChatMessage>,
    #[serde(rename = "taskContext", default)]
    task_context: String,
}

/// Bounded failure for a relay request. Everything maps to a JSON error
/// envelope; capacity failures keep their upstream status codes.
#[derive(Debug)]
enum RelayError {
    Unauthorized,
    RateLimited,
    PaymentRequired,
    Internal(String),
}

impl RelayError {
    fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::RateLimitExceeded(_) => RelayError::RateLimited,
            GatewayError::CreditsExhausted(_) => RelayError::PaymentRequired,
            other => {
                tracing::error!(error = %other, "AI gateway error");
                RelayError::Internal("AI gateway error".to_string())
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RelayError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            RelayError::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string())
            }
            RelayError::PaymentRequired => {
                (StatusCode::PAYMENT_REQUIRED, "Payment required".to_string())
            }
            RelayError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(body)
        .expect("static headers are valid")
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match relay(state, headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn relay(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    // Malformed bodies surface the caught error's message, not a 4xx.
    let request: ChatRelayRequest = serde_json::from_slice(&body)
        .map_err(|e| RelayError::Internal(e.to_string()))?;

    let gateway = state
        .gateway
        .as_ref()
        .ok_or_else(|| RelayError::Internal("GATEWAY_API_KEY is not configured".to_string()))?;

    let token = bearer_token(&headers).ok_or(RelayError::Unauthorized)?;
    let user = state.verifier.authenticate(token).await.map_err(|e| {
        tracing::warn!(error = %e, "rejected chat request");
        RelayError::Unauthorized
    })?;

    let system = format!("{SYSTEM_PROMPT}{}", request.task_context);
    let mut messages = vec![system_message(&system)];
    messages.extend(format_messages(&request.messages));

    // Step 1 (decide): one non-streaming call with the tool schemas. This
    // must complete before any mutation happens.
    let decision = gateway
        .complete(messages.clone(), &tool_definitions())
        .await
        .map_err(RelayError::from_gateway)?;

    // Step 2: no tools requested — the answer is already complete, so wrap
    // it in a single SSE frame without a second gateway call.
    if decision.tool_calls.is_empty() {
        let content = decision.content.unwrap_or_default();
        let frame = data_frame(&json!({
            "choices": [{"delta": {"content": content}, "finish_reason": "stop"}],
        }));
        return Ok(sse_response(Body::from(format!("{frame}{}", done_frame()))));
    }

    // Step 3 (act): run the tool calls sequentially, in the model's order.
    // A failed call becomes an error-shaped result for the model; it never
    // aborts the remaining calls.
    let mut executed = Vec::with_capacity(decision.tool_calls.len());
    let mut tool_results = Vec::with_capacity(decision.tool_calls.len());
    for call in &decision.tool_calls {
        let result =
            execute_tool_call(state.store.as_ref(), user.id, &call.name, &call.arguments).await;
        tool_results.push(tool_result_message(&call.id, &result));
        executed.push(call.name.clone());
    }
    tracing::info!(tools = ?executed, user = %user.id, "board mutated via chat");

    // Step 4 (answer): stream the follow-up with the assistant's tool-call
    // message echoed verbatim plus every tool result.
    messages.push(decision.assistant_message);
    messages.extend(tool_results);

    let upstream = gateway
        .stream_answer(messages)
        .await
        .map_err(RelayError::from_gateway)?;

    // The synthetic marker goes out before any upstream byte so the client
    // can tell mutated turns from plain chat without parsing tool semantics.
    let prefix = Bytes::from(data_frame(&json!({"tool_actions": executed})));
    let stream = futures::stream::once(async move { Ok::<_, axum::BoxError>(prefix) })
        .chain(upstream.bytes_stream().map_err(axum::BoxError::from));

    Ok(sse_response(Body::from_stream(stream)))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat", post(chat).layer(DefaultBodyLimit::max(2 * 1024 * 1024)))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthVerifier;
    use serde_json::Value;
    use flowboard::gateway::GatewayClient;
    use flowboard::tasks::{MemoryTaskStore, TaskPriority, TaskStore};
    use tower::ServiceExt;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        app: Router,
        store: Arc<MemoryTaskStore>,
        user_id: Uuid,
        // Held so the mocked auth endpoint stays up for the test's duration.
        _auth_mock: MockServer,
    }

    async fn harness(gateway_mock: &MockServer) -> Harness {
        let auth_mock = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": user_id})),
            )
            .mount(&auth_mock)
            .await;

        let store = Arc::new(MemoryTaskStore::new());
        let state = AppState::new(
            Some(GatewayClient::new(&gateway_mock.uri(), "test-key", "test-model").unwrap()),
            store.clone(),
            AuthVerifier::new(auth_mock.uri(), "publishable"),
        );
        Harness {
            app: routes(state),
            store,
            user_id,
            _auth_mock: auth_mock,
        }
    }

    fn chat_request(body: Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .uri("/chat")
            .method("POST")
            .header("content-type", "application/json")
            .header("authorization", "Bearer user-token")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_plain_answer_synthesizes_single_frame() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Just an answer"}}]
            })))
            .expect(1)
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hello"}], "taskContext": ""}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        let body = body_string(response).await;
        assert_eq!(
            body,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Just an answer\"},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n"
        );
        assert!(!body.contains("tool_actions"));
    }

    #[tokio::test]
    async fn test_tool_call_mutates_board_and_prefixes_marker() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "create_task",
                            "arguments": "{\"title\":\"Review homepage design\",\"priority\":\"high\"}"
                        }
                    }]
                }}]
            })))
            .mount(&gateway)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Created it!\"}}]}\n\ndata: [DONE]\n\n",
                "text/event-stream",
            ))
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(json!({
                "messages": [{
                    "role": "user",
                    "content": "Create a high priority task to review homepage design"
                }],
                "taskContext": ""
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = body_string(response).await;
        assert!(
            body.starts_with("data: {\"tool_actions\":[\"create_task\"]}\n\n"),
            "body was: {body}"
        );
        assert!(body.contains("Created it!"));
        assert!(body.ends_with("data: [DONE]\n\n"));

        let tasks = h.store.list(h.user_id).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, TaskPriority::High);
        assert_eq!(tasks[0].user_id, h.user_id);
    }

    #[tokio::test]
    async fn test_tools_execute_in_model_order() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "tool_calls": [
                        {
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "create_task", "arguments": "{\"title\":\"a\"}"}
                        },
                        {
                            "id": "call_2",
                            "type": "function",
                            "function": {"name": "delete_task", "arguments": "{\"task_id\":\"bogus\"}"}
                        }
                    ]
                }}]
            })))
            .mount(&gateway)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "do both"}]}),
            ))
            .await
            .unwrap();

        // The failed delete does not abort the batch; both names appear, in
        // the model's order.
        let body = body_string(response).await;
        assert!(body.starts_with(
            "data: {\"tool_actions\":[\"create_task\",\"delete_task\"]}\n\n"
        ));
        assert_eq!(h.store.list(h.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_passes_through() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Rate limit exceeded"}"#
        );
        assert!(h.store.list(h.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_quota_passes_through() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Payment required"}"#
        );
    }

    #[tokio::test]
    async fn test_other_gateway_failures_are_opaque() {
        let gateway = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("secret detail"))
            .mount(&gateway)
            .await;

        let h = harness(&gateway).await;
        let response = h
            .app
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert_eq!(body, r#"{"error":"AI gateway error"}"#);
        assert!(!body.contains("secret detail"));
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let gateway = MockServer::start().await;
        let h = harness(&gateway).await;
        let request = axum::http::Request::builder()
            .uri("/chat")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"messages": [{"role": "user", "content": "hi"}]}).to_string(),
            ))
            .unwrap();

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(response).await, r#"{"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn test_rejected_token_is_unauthorized() {
        let gateway = MockServer::start().await;
        let auth_mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&auth_mock)
            .await;

        let state = AppState::new(
            Some(GatewayClient::new(&gateway.uri(), "test-key", "test-model").unwrap()),
            Arc::new(MemoryTaskStore::new()),
            AuthVerifier::new(auth_mock.uri(), "publishable"),
        );
        let response = routes(state)
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_gateway_key_is_config_error() {
        let state = AppState::new(
            None,
            Arc::new(MemoryTaskStore::new()),
            AuthVerifier::new("http://127.0.0.1:1", "publishable"),
        );
        let response = routes(state)
            .oneshot(chat_request(
                json!({"messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"GATEWAY_API_KEY is not configured"}"#
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_internal_error() {
        let gateway = MockServer::start().await;
        let h = harness(&gateway).await;
        let request = axum::http::Request::builder()
            .uri("/chat")
            .method("POST")
            .header("content-type", "application/json")
            .header("authorization", "Bearer user-token")
            .body(Body::from("{not json"))
            .unwrap();

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
