//! HTTP transport for the remote rate limiter.
//!
//! One attempt per call. Non-2xx statuses are not errors here: the reply is
//! handed back so reconciliation can adopt the reported level and classify
//! the outcome.

use bucketscope_core::{
    AlgorithmKind, ConfigureRequest, RemoteLimiter, RemoteReply, TransportError,
};
use reqwest::{Client, Response};

/// Talks to `<base_url>/token-bucket` and `<base_url>/leaky-bucket`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, kind: AlgorithmKind) -> String {
        format!("{}{}", self.base_url, kind.profile().endpoint_path)
    }

    async fn read_reply(response: Response) -> Result<RemoteReply, TransportError> {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let reply = RemoteReply::from_body(status, &body)?;
        tracing::debug!(status, message = reply.message(), "remote reply");
        Ok(reply)
    }
}

impl RemoteLimiter for HttpRemote {
    async fn configure(&self, request: &ConfigureRequest) -> Result<RemoteReply, TransportError> {
        let url = self.endpoint(request.kind);
        tracing::debug!(%url, form = %request.encode(), "POST configuration");
        let response = self
            .client
            .post(&url)
            .form(&request.form_pairs())
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Self::read_reply(response).await
    }

    async fn act(&self, kind: AlgorithmKind) -> Result<RemoteReply, TransportError> {
        let url = self.endpoint(kind);
        tracing::debug!(%url, "GET action");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        Self::read_reply(response).await
    }
}
