use futures_util::StreamExt;
use std::ops::Range;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ollama::ModelBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Finished,
    Failed(String),
}

pub struct StreamHandle {
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
    pub cancel: CancellationToken,
}

impl StreamHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Must be called inside a tokio runtime. After cancellation nothing more is sent.
pub fn spawn_stream<B: ModelBackend>(backend: B, model: &str, prompt: &str) -> StreamHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let model = model.to_string();
    let prompt = prompt.to_string();

    tokio::spawn(async move {
        let mut stream = tokio::select! {
            _ = token.cancelled() => return,
            result = backend.stream_chat(&model, &prompt) => match result {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = tx.send(StreamEvent::Failed(err.to_string()));
                    return;
                }
            },
        };
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("completion for {} cancelled", model);
                    return;
                }
                next = stream.next() => next,
            };
            let event = match next {
                Some(Ok(chunk)) => StreamEvent::Chunk(chunk),
                Some(Err(err)) => StreamEvent::Failed(err.to_string()),
                None => StreamEvent::Finished,
            };
            let terminal = !matches!(event, StreamEvent::Chunk(_));
            if token.is_cancelled() || tx.send(event).is_err() || terminal {
                return;
            }
        }
    });

    StreamHandle { events: rx, cancel }
}

pub fn char_selection(primary: usize, secondary: usize) -> Option<Range<usize>> {
    (primary != secondary).then(|| primary.min(secondary)..primary.max(secondary))
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Finished,
    Cancelled,
    Failed(String),
}

#[derive(Default)]
pub struct ModelSession {
    pub model: Option<String>,
    pub prompt: String,
    buffer: String,
    status: SessionStatus,
    handle: Option<StreamHandle>,
}

impl ModelSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn response(&self) -> &str {
        &self.buffer
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<B: ModelBackend>(&mut self, backend: B, model: &str, prompt: &str) {
        self.cancel();
        self.model = Some(model.to_string());
        self.prompt = prompt.to_string();
        self.buffer.clear();
        self.status = SessionStatus::Streaming;
        self.handle = Some(spawn_stream(backend, model, prompt));
    }

    pub fn poll(&mut self) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        let mut changed = false;
        let mut done = false;
        while let Ok(event) = handle.events.try_recv() {
            changed = true;
            match event {
                StreamEvent::Chunk(chunk) => self.buffer.push_str(&chunk),
                StreamEvent::Finished => {
                    self.status = SessionStatus::Finished;
                    done = true;
                    break;
                }
                StreamEvent::Failed(message) => {
                    self.status = SessionStatus::Failed(message);
                    done = true;
                    break;
                }
            }
        }
        if done {
            self.handle = None;
        }
        changed
    }

    /// Queued but unpolled chunks are discarded.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            self.status = SessionStatus::Cancelled;
        }
    }

    pub fn clear(&mut self) {
        self.cancel();
        self.buffer.clear();
        self.status = SessionStatus::Idle;
    }

    /// `range` is in characters, as text widgets report cursors. Out of
    /// range ends are clamped and reversed ranges are normalised.
    pub fn selected_text(&self, range: Range<usize>) -> String {
        let (start, end) = if range.start <= range.end {
            (range.start, range.end)
        } else {
            (range.end, range.start)
        };
        self.buffer
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    pub fn import_text(&self, range: Option<Range<usize>>) -> String {
        let selected = range
            .filter(|range| range.start != range.end)
            .map(|range| self.selected_text(range))
            .unwrap_or_default();
        if selected.trim().is_empty() {
            self.buffer.trim().to_string()
        } else {
            selected
        }
    }
}
