use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::Settings;

mod ndjson;

pub use ndjson::ChatChunks;

pub type BackendFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Dropping a `ChunkStream` must release the underlying connection.
pub trait ModelBackend: Clone + Send + Sync + 'static {
    fn list_models(&self) -> BackendFuture<Vec<String>>;
    fn stream_chat(&self, model: &str, prompt: &str) -> BackendFuture<ChunkStream>;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    http: reqwest::Client,
    system_prompt: Option<String>,
}

impl OllamaClient {
    pub fn new(host: impl Into<String>) -> Self {
        Self::with_timeout(host, Duration::from_secs(10))
    }

    pub fn with_timeout(host: impl Into<String>, connect_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            http,
            system_prompt: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_timeout(
            settings.ollama_host.clone(),
            Duration::from_secs(settings.connect_timeout_secs),
        )
        .with_system_prompt(settings.system_prompt.clone())
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() {
            None
        } else {
            Some(prompt)
        };
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_connect() || err.is_timeout() {
            Error::ServiceUnavailable {
                host: self.host.clone(),
                reason: err.to_string(),
            }
        } else {
            Error::StreamFailed(err.to_string())
        }
    }
}

impl ModelBackend for OllamaClient {
    fn list_models(&self) -> BackendFuture<Vec<String>> {
        let client = self.clone();
        Box::pin(async move {
            let url = format!("{}/api/tags", client.host);
            debug!("GET {}", url);
            let response = client
                .http
                .get(&url)
                .send()
                .await
                .map_err(|err| client.transport_error(err))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|err| client.transport_error(err))?;
            if !status.is_success() {
                return Err(Error::StreamFailed(format!(
                    "model list request failed (status {}): {}",
                    status,
                    error_message(&body)
                )));
            }
            parse_model_list(&body)
        })
    }

    fn stream_chat(&self, model: &str, prompt: &str) -> BackendFuture<ChunkStream> {
        let client = self.clone();
        let model = model.to_string();
        let prompt = prompt.to_string();
        Box::pin(async move {
            let url = format!("{}/api/chat", client.host);
            let mut messages = Vec::new();
            if let Some(system) = client.system_prompt.as_deref() {
                messages.push(json!({"role": "system", "content": system}));
            }
            messages.push(json!({"role": "user", "content": prompt}));
            let body = json!({
                "model": model,
                "messages": messages,
                "stream": true,
            });
            debug!("POST {} (model {})", url, model);
            let response = client
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|err| client.transport_error(err))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = error_message(&text);
                if status == reqwest::StatusCode::NOT_FOUND
                    || message.to_lowercase().contains("not found")
                {
                    return Err(Error::ModelNotFound(model));
                }
                return Err(Error::StreamFailed(format!(
                    "chat request failed (status {}): {}",
                    status, message
                )));
            }

            let chunks = ChatChunks::new(Box::pin(response.bytes_stream()));
            Ok(Box::pin(chunks) as ChunkStream)
        })
    }
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: Option<String>,
    model: Option<String>,
}

fn parse_model_list(body: &str) -> Result<Vec<String>> {
    let parsed: TagsResponse = serde_json::from_str(body)
        .map_err(|err| Error::StreamFailed(format!("invalid model list: {}", err)))?;
    Ok(parsed
        .models
        .into_iter()
        .filter_map(|entry| entry.name.or(entry.model))
        .filter(|name| !name.trim().is_empty())
        .collect())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error)
        .unwrap_or_else(|_| body.trim().to_string())
}
