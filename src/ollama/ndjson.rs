use futures_util::Stream;
use serde::Deserialize;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::error::{Error, Result};

#[derive(Debug, Default, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// Ends at `done: true`. Anything else that ends the body yields one
/// `StreamInterrupted` first.
pub struct ChatChunks<S> {
    inner: S,
    buffer: Vec<u8>,
    eof: bool,
    finished: bool,
}

impl<S> ChatChunks<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
            eof: false,
            finished: false,
        }
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|byte| *byte == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    fn handle_line(&mut self, line: &[u8]) -> Option<Result<String>> {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return None;
        }
        let parsed: ChatLine = match serde_json::from_slice(trimmed) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.finished = true;
                return Some(Err(Error::StreamInterrupted(format!(
                    "invalid chunk from server: {}",
                    err
                ))));
            }
        };
        if let Some(message) = parsed.error {
            self.finished = true;
            return Some(Err(Error::StreamInterrupted(message)));
        }
        if parsed.done {
            self.finished = true;
        }
        let content = parsed
            .message
            .map(|message| message.content)
            .or(parsed.response)
            .unwrap_or_default();
        if content.is_empty() {
            None
        } else {
            Some(Ok(content))
        }
    }
}

impl<S, B, E> Stream for ChatChunks<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }
            if let Some(line) = self.next_line() {
                if let Some(item) = self.handle_line(&line) {
                    return Poll::Ready(Some(item));
                }
                continue;
            }
            if self.eof {
                let rest = std::mem::take(&mut self.buffer);
                if let Some(item) = self.handle_line(&rest) {
                    return Poll::Ready(Some(item));
                }
                if self.finished {
                    return Poll::Ready(None);
                }
                self.finished = true;
                return Poll::Ready(Some(Err(Error::StreamInterrupted(
                    "connection closed before the response finished".to_string(),
                ))));
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(bytes.as_ref());
                }
                Poll::Ready(Some(Err(err))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(Error::StreamInterrupted(err.to_string()))));
                }
                Poll::Ready(None) => self.eof = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
