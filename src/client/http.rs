//! HTTP side of the client.

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::auth::API_KEY_HEADER;
use crate::mcp::progress::TaskProgress;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::VERSION;

fn user_agent() -> String {
    format!("gimp-mcp-client/{} (rust)", VERSION)
}

/// Client for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    rpc_url: String,
    base_url: String,
    api_key: Option<String>,
}

impl HttpClient {
    /// `rpc_url` is the JSON-RPC endpoint; the other endpoints are resolved
    /// against its parent.
    pub fn new(rpc_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let rpc_url = rpc_url.into();
        let base_url = rpc_url
            .trim_end_matches('/')
            .trim_end_matches("/jsonrpc")
            .to_string();

        Ok(Self {
            client,
            rpc_url,
            base_url,
            api_key,
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// POST a request and decode the response envelope.
    ///
    /// Error envelopes come back with HTTP 400 for malformed requests, so the
    /// body is decoded whatever the status.
    pub async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .authorize(self.client.post(&self.rpc_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != reqwest::StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse response: {}", e)))
    }

    /// Resolve `segments` against the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let invalid = || Error::Config(format!("Invalid server URL: {}", self.rpc_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<R: DeserializeOwned>(&self, url: Url) -> Result<R> {
        let response = self.authorize(self.client.get(url)).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<R: DeserializeOwned>(response: Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse response: {}", e)))
    }

    /// Health payload from `GET /`.
    pub async fn server_status(&self) -> Result<Value> {
        self.get_json(self.endpoint(&[""])?).await
    }

    /// Current progress record for `task_id`.
    pub async fn task_progress(&self, task_id: &str) -> Result<TaskProgress> {
        self.get_json(self.endpoint(&["tasks", task_id])?).await
    }
}
