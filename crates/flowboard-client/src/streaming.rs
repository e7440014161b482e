//! Adapter from a relay response body to decoded [`SseEvent`]s.
//!
//! All framing logic lives in `flowboard::sse::SseDecoder`; this wrapper
//! feeds it transport chunks as they arrive and runs the final flush when
//! the body ends, so a trailing line without a newline is still decoded.

use crate::error::{ClientError, Result};
use bytes::Bytes;
use flowboard::sse::{SseDecoder, SseEvent};
use futures::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    flushed: bool,
}

impl EventStream {
    pub fn new(stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(stream),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            flushed: false,
        }
    }
}

impl Stream for EventStream {
    type Item = Result<SseEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if this.flushed {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.flushed = true;
                    this.pending.extend(this.decoder.flush());
                    if this.pending.is_empty() {
                        return Poll::Ready(None);
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(ClientError::Http(e))));
                }
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending.extend(this.decoder.feed(&chunk));
                }
            }
        }
    }
}
