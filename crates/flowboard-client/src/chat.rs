//! A chat session against the relay: one growing transcript, one in-flight
//! send at a time, incremental assistant reconstruction.

use futures::StreamExt;
use serde_json::json;

use flowboard::conversation::{ChatMessage, Role};
use flowboard::sse::SseEvent;

use crate::error::{ClientError, Result};
use crate::streaming::EventStream;
use crate::tasks::TaskCache;
use crate::FlowBoardClient;

const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again in a moment.";
const QUOTA_MESSAGE: &str = "Usage limit reached. Please add credits to continue.";
const APOLOGY_MESSAGE: &str = "Sorry, something went wrong. Please try again.";
const BOARD_UPDATED_NOTICE: &str = "Board updated by AI";

/// What a completed send produced besides transcript updates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub board_updated: bool,
    pub notice: Option<String>,
}

impl FlowBoardClient {
    /// POST a conversation to the relay and return the raw streaming
    /// response. Status handling is the caller's job.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        task_context: &str,
    ) -> Result<reqwest::Response> {
        self.http
            .post_streaming(
                "/chat",
                &json!({"messages": messages, "taskContext": task_context}),
            )
            .await
    }
}

pub struct ChatSession {
    client: FlowBoardClient,
    transcript: Vec<ChatMessage>,
    tasks: TaskCache,
    in_flight: bool,
}

impl ChatSession {
    pub fn new(client: FlowBoardClient) -> Self {
        Self {
            client,
            transcript: Vec::new(),
            tasks: TaskCache::new(),
            in_flight: false,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn tasks(&self) -> &TaskCache {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskCache {
        &mut self.tasks
    }

    /// Send one user message and stream the assistant's reply into the
    /// transcript. Empty input is a no-op; a second send while one is in
    /// flight is refused. Transport and relay failures resolve to a fixed
    /// apology in the transcript — they never propagate out of here.
    pub async fn send(&mut self, text: &str) -> Result<ChatOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(ChatOutcome::default());
        }
        if self.in_flight {
            return Err(ClientError::Busy);
        }

        self.in_flight = true;
        let outcome = self.stream_reply(text).await;
        self.in_flight = false;
        Ok(outcome)
    }

    async fn stream_reply(&mut self, text: &str) -> ChatOutcome {
        self.transcript.push(ChatMessage::user(text));
        let task_context = self.tasks.summary();

        let mut assistant_so_far = String::new();
        let mut board_updated = false;

        let response = match self.client.chat(&self.transcript, &task_context).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                self.append_assistant(&mut assistant_so_far, APOLOGY_MESSAGE);
                return ChatOutcome::default();
            }
        };

        match response.status().as_u16() {
            429 => {
                self.append_assistant(&mut assistant_so_far, RATE_LIMIT_MESSAGE);
                return ChatOutcome::default();
            }
            402 => {
                self.append_assistant(&mut assistant_so_far, QUOTA_MESSAGE);
                return ChatOutcome::default();
            }
            status if !(200..300).contains(&status) => {
                tracing::error!(status, "chat relay returned an error");
                self.append_assistant(&mut assistant_so_far, APOLOGY_MESSAGE);
                return ChatOutcome::default();
            }
            _ => {}
        }

        let mut events = EventStream::new(response.bytes_stream());
        while let Some(event) = events.next().await {
            match event {
                Ok(SseEvent::Delta(content)) => {
                    self.append_assistant(&mut assistant_so_far, &content);
                }
                Ok(SseEvent::ToolActions(_)) => board_updated = true,
                Ok(SseEvent::Done) => {}
                Err(e) => {
                    tracing::error!(error = %e, "chat stream failed");
                    self.append_assistant(&mut assistant_so_far, APOLOGY_MESSAGE);
                    return ChatOutcome::default();
                }
            }
        }

        if board_updated {
            self.tasks.invalidate();
            ChatOutcome {
                board_updated: true,
                notice: Some(BOARD_UPDATED_NOTICE.to_string()),
            }
        } else {
            ChatOutcome::default()
        }
    }

    /// Grow the running assistant buffer and reflect it into the transcript:
    /// replace the trailing assistant message if one exists, otherwise
    /// append one. Never reorders, never duplicates.
    fn append_assistant(&mut self, so_far: &mut String, chunk: &str) {
        so_far.push_str(chunk);
        match self.transcript.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content = so_far.clone();
            }
            _ => self.transcript.push(ChatMessage::assistant(so_far.clone())),
        }
    }
}
