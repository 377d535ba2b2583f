//! Client: Blocking HTTP client for OpenAI-compatible chat completions.
//!
//! The client is intentionally thin: it builds the request, authenticates
//! with a bearer token and hands the response body to the
//! [`FragmentSource`](crate::FragmentSource). Streaming with live markdown
//! rendering lives in [`crate::pipeline`].

mod transport;
mod types;

pub use transport::{ByteStream, Closer, OpenStream, Transport};
pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Choice, ChunkChoice,
    Delta, Message, Usage,
};

use crate::error::{Result, StreamError};
use crate::source::FragmentSource;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Configuration for the [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token.
    pub api_key: String,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Timeout for establishing the connection.
    pub connect_timeout: Duration,
    /// Total timeout for non-streaming requests. Streams are bounded only
    /// by the caller's cancellation scope.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Read `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    ///
    /// Returns `None` when no key is configured.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty())?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.is_empty() {
                config.base_url = base_url;
            }
        }
        Some(config)
    }

    /// Override the API root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Chat completions client.
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
    http: HttpClient,
}

impl Client {
    /// Create a client with its own HTTP connection pool.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(None)
            .build()?;
        Ok(Self { config, http })
    }

    /// Create a client reusing an existing HTTP client.
    pub const fn with_http_client(config: ClientConfig, http: HttpClient) -> Self {
        Self { config, http }
    }

    /// The client's configuration.
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a non-streaming completion request.
    ///
    /// Returns the first choice's content with surrounding whitespace
    /// trimmed.
    pub fn create_chat_completion(&self, request: &ChatCompletionRequest) -> Result<String> {
        let mut request = request.clone();
        request.stream = false;

        let response = self.post(&request, Some(self.config.request_timeout))?;
        let body = response.bytes()?;
        let payload: ChatCompletionResponse =
            serde_json::from_slice(&body).map_err(StreamError::DecodeResponse)?;

        payload
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(StreamError::NoChoices)
    }

    /// Send a streaming completion request and return a chunk reader.
    pub fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<StreamReader> {
        let mut request = request.clone();
        request.stream = true;
        let OpenStream { reader, closer } = self.open(&request)?;
        Ok(StreamReader {
            source: FragmentSource::new(reader),
            closer: Some(closer),
        })
    }

    fn post(&self, request: &ChatCompletionRequest, timeout: Option<Duration>) -> Result<Response> {
        let url = self.config.url(CHAT_COMPLETIONS_PATH);
        tracing::debug!(%url, model = %request.model, stream = request.stream, "sending request");

        let mut builder = self
            .http
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        if request.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status = response.status();
        if status.as_u16() >= 300 {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "request rejected");
            return Err(StreamError::Api {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }
}

impl Transport for Client {
    fn open(&self, request: &ChatCompletionRequest) -> Result<OpenStream> {
        let response = self.post(request, None)?;
        Ok(OpenStream::interruptible(response))
    }
}

/// Reader over a raw completion stream.
///
/// Yields complete chunk records; use [`crate::pipeline`] for rendered
/// output.
pub struct StreamReader {
    source: FragmentSource<ByteStream>,
    closer: Option<Closer>,
}

impl StreamReader {
    /// Read the next chunk, or `None` at the end of the stream.
    pub fn recv(&mut self) -> Result<Option<ChatCompletionChunk>> {
        self.source.recv()
    }

    /// Close the stream. Subsequent reads fail.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.close();
    }
}

impl Iterator for StreamReader {
    type Item = Result<ChatCompletionChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv().transpose()
    }
}
