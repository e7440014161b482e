pub mod chat;
pub mod config;
pub mod error;
pub(crate) mod http;
pub mod streaming;
pub mod tasks;

pub use chat::{ChatOutcome, ChatSession};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use flowboard::conversation::{ChatMessage, Role};
pub use flowboard::sse::SseEvent;
pub use streaming::EventStream;
pub use tasks::TaskCache;

use http::HttpClient;

/// Async HTTP client for the FlowBoard chat relay.
///
/// Authentication is via the user's bearer token, configured through
/// [`ClientConfig`]. `FlowBoardClient` is `Clone` — the underlying
/// `reqwest::Client` shares its connection pool across clones.
#[derive(Clone)]
pub struct FlowBoardClient {
    pub(crate) http: HttpClient,
}

impl FlowBoardClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(&config)?,
        })
    }
}
