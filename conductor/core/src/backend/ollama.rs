//! Ollama Backend Implementation
//!
//! Backend for Ollama (local model server).
//!
//! # Ollama API
//!
//! - `/api/chat` - Chat completions with message history, streamed as NDJSON
//! - `/api/tags` - List available models
//!
//! Only the raw response body is handed back; frame handling lives in
//! [`crate::streaming`].

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{ByteStream, ChatBackend, ChatRequest, ModelInfo};
use crate::config::ServerConfig;

/// Ollama backend client
#[derive(Clone)]
pub struct OllamaBackend {
    /// Host address
    host: String,
    /// Port number
    port: u16,
    /// HTTP client
    http_client: reqwest::Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// Only the connect phase is bounded: a generation may legitimately run
    /// for minutes, and cancellation is the way to abort it.
    pub fn new(host: impl Into<String>, port: u16) -> anyhow::Result<Self> {
        Self::with_connect_timeout(host, port, Duration::from_secs(10))
    }

    /// Create a backend with a custom connect timeout
    pub fn with_connect_timeout(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?;

        Ok(Self {
            host: host.into(),
            port,
            http_client,
        })
    }

    /// Create from the `[server]` configuration section
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        Self::with_connect_timeout(
            config.host.clone(),
            config.port,
            Duration::from_millis(config.connect_timeout_ms),
        )
    }

    /// Get the base URL
    ///
    /// A host that already carries a scheme (e.g. `https://gpu-box`) is used verbatim.
    pub fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    /// Get chat endpoint URL
    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url())
    }

    /// Get tags endpoint URL
    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.base_url())
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn open_stream(&self, request: &ChatRequest) -> anyhow::Result<ByteStream> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            num_ctx = request.options.context_size,
            "Opening chat stream"
        );

        let response = self
            .http_client
            .post(self.chat_url())
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Could not reach Ollama at {}: {e}", self.base_url()))?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| anyhow::anyhow!("Stream read failed: {e}")));

        Ok(Box::pin(stream))
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let response = self
            .http_client
            .get(self.tags_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {status}: {body}");
        }

        let data: serde_json::Value = response.json().await?;

        let models = data
            .get("models")
            .and_then(|m| m.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let name = m.get("name")?.as_str()?.to_string();
                        let size = m.get("size").and_then(serde_json::Value::as_u64);
                        let parameters = m
                            .get("details")
                            .and_then(|d| d.get("parameter_size"))
                            .and_then(|p| p.as_str())
                            .map(String::from);

                        Some(ModelInfo {
                            name,
                            size,
                            parameters,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}
