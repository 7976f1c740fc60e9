//! HTTP client and request builders.

use crate::error::Error;
use crate::stream::{ByteStream, SseStream};
use crate::types::*;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

const CHAT_COMPLETIONS: &str = "/chat/completions";

/// Client for the DeepSeek API.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Arc<str>,
    config: ClientConfig,
}

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Whole-request timeout. For streaming requests this includes reading
    /// the body, so it also bounds how long a stream may run.
    pub timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for Client.
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: String,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            config: ClientConfig::default(),
        }
    }

    /// Set the API key sent as a bearer token.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set a custom base URL (useful for testing with mock servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Load `DEEPSEEK_API_KEY` and, if set, `DEEPSEEK_BASE_URL`.
    pub fn from_env(mut self) -> Self {
        if let Ok(key) = env::var("DEEPSEEK_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(url) = env::var("DEEPSEEK_BASE_URL") {
            self.base_url = url;
        }
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client, Error> {
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingApiKey)?;

        let base_url = self.base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(Error::Config("invalid base URL".into()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::Config("invalid API key format".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        tracing::debug!(base_url, "client configured");

        Ok(Client {
            http,
            base_url: Arc::from(base_url),
            config: self.config,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        ClientBuilder::new().from_env().build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start building a chat completion request.
    pub fn chat(&self, model: impl Into<ModelId>, messages: Vec<Message>) -> ChatRequestBuilder<'_> {
        ChatRequestBuilder {
            client: self,
            request: CompletionRequest::new(model, messages),
            timeout: None,
        }
    }

    /// Create a chat completion and wait for the whole response.
    pub async fn create_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Error> {
        self.execute_complete(request, None).await
    }

    /// Create a chat completion streamed as Server-Sent Events.
    ///
    /// A non-success status is returned as an error here, before any event
    /// is read.
    pub async fn create_stream_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<SseStream<StreamCompletionChunk>, Error> {
        self.execute_stream(request, None).await
    }

    /// List the models available to the account.
    pub async fn list_models(&self) -> Result<ModelsList, Error> {
        self.get_json("/models").await
    }

    /// Retrieve one model.
    pub async fn get_model(&self, id: &str) -> Result<Model, Error> {
        self.get_json(&format!("/models/{id}")).await
    }

    /// Get the account balance.
    pub async fn user_balance(&self) -> Result<UserBalance, Error> {
        self.get_json("/user/balance").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute_stream(
        &self,
        request: &CompletionRequest,
        timeout: Option<Duration>,
    ) -> Result<SseStream<StreamCompletionChunk>, Error> {
        let body = completion_body(request, true)?;
        let mut req = self
            .http
            .post(self.url(CHAT_COMPLETIONS))
            .header(ACCEPT, "text/event-stream")
            .json(&body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let resp = self.send(req).await?;
        let stream: ByteStream = Box::pin(resp.bytes_stream());
        Ok(SseStream::new(stream))
    }

    async fn execute_complete(
        &self,
        request: &CompletionRequest,
        timeout: Option<Duration>,
    ) -> Result<CompletionResponse, Error> {
        let body = completion_body(request, false)?;
        let mut req = self.http.post(self.url(CHAT_COMPLETIONS)).json(&body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let resp = self.send(req).await?;
        read_json(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let resp = self.send(self.http.get(self.url(path))).await?;
        read_json(resp).await
    }

    /// Send a request, turning any non-success status into an error.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let req = req.build()?;
        tracing::debug!(method = %req.method(), url = %req.url(), "sending request");

        let resp = self.http.execute(req).await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::Http(e)
            }
        })?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp).await)
    }
}

/// Serialize a completion request and set its `stream` flag.
fn completion_body(request: &CompletionRequest, stream: bool) -> Result<Value, Error> {
    let mut body = serde_json::to_value(request)?;
    body["stream"] = Value::Bool(stream);
    if !stream {
        if let Some(fields) = body.as_object_mut() {
            fields.remove("stream_options");
        }
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let text = resp.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Convert error response to Error type.
async fn error_from_response(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let retry_after = parse_retry_after(resp.headers());
    let body = resp.text().await.unwrap_or_default();
    tracing::debug!(status, "request rejected");

    Error::from_status(status, error_message(&body), retry_after)
}

/// Extract `error.message` from a JSON error body, or keep the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Parse Retry-After header.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Builder for a single chat completion request.
pub struct ChatRequestBuilder<'a> {
    client: &'a Client,
    request: CompletionRequest,
    timeout: Option<Duration>,
}

impl ChatRequestBuilder<'_> {
    /// Set maximum tokens to generate.
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.request.max_tokens = Some(tokens);
        self
    }

    /// Set temperature for sampling.
    pub fn temperature(mut self, temp: f32) -> Self {
        self.request.temperature = Some(temp);
        self
    }

    /// Set top-p for nucleus sampling.
    pub fn top_p(mut self, p: f32) -> Self {
        self.request.top_p = Some(p);
        self
    }

    pub fn frequency_penalty(mut self, penalty: f32) -> Self {
        self.request.frequency_penalty = Some(penalty);
        self
    }

    pub fn presence_penalty(mut self, penalty: f32) -> Self {
        self.request.presence_penalty = Some(penalty);
        self
    }

    /// Set stop sequences.
    pub fn stop(mut self, sequences: Vec<String>) -> Self {
        self.request.stop = Some(sequences);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.request.response_format = Some(format);
        self
    }

    /// Set tools for function calling.
    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.request.tools = Some(tools);
        self
    }

    /// Set tool choice.
    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.request.tool_choice = Some(choice);
        self
    }

    /// Return log probabilities, with `top` alternatives per token.
    pub fn logprobs(mut self, top: u32) -> Self {
        self.request.logprobs = Some(true);
        self.request.top_logprobs = Some(top);
        self
    }

    /// Ask for a final usage chunk when streaming.
    pub fn include_usage(mut self) -> Self {
        self.request.stream_options = Some(StreamOptions {
            include_usage: true,
        });
        self
    }

    /// Deadline for this request only. When streaming, it covers reading
    /// the events too; on expiry the stream ends with a read error.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The request body built so far.
    pub fn into_request(self) -> CompletionRequest {
        self.request
    }

    /// Send the request and wait for the whole response.
    pub async fn send(self) -> Result<CompletionResponse, Error> {
        self.client
            .execute_complete(&self.request, self.timeout)
            .await
    }

    /// Send the request as a stream.
    pub async fn stream(self) -> Result<SseStream<StreamCompletionChunk>, Error> {
        self.client
            .execute_stream(&self.request, self.timeout)
            .await
    }
}
