use crate::config::ProcessorConfig;
use crate::domain::device::{
    AsyncAuthenticationRequest, AuthenticationAck, PollResultResponse, SyncAuthenticationRequest,
    SyncAuthenticationResponse,
};
use crate::domain::ports::DeviceClient;
use crate::error::{ProcessorError, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Talks to the authentication device over HTTP.
///
/// Connect and read timeouts come from [`ProcessorConfig`]; a timed out call
/// surfaces as [`ProcessorError::Transport`].
#[derive(Clone)]
pub struct HttpDeviceClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(config: &ProcessorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()?;
        Ok(Self {
            base_url: config.device_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "sending device request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ProcessorError::DeviceProtocol(format!("malformed device response: {e}")))
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn sync_authenticate(
        &self,
        request: &SyncAuthenticationRequest,
    ) -> Result<SyncAuthenticationResponse> {
        self.post_json("sync-authenticate", request).await
    }

    async fn async_authenticate(
        &self,
        request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck> {
        self.post_json("async-authenticate", request).await
    }

    async fn poll_authenticate(
        &self,
        request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck> {
        self.post_json("poll", request).await
    }

    async fn poll_result(&self, request_id: &str) -> Result<PollResultResponse> {
        let url = self.url("poll-result");
        tracing::debug!(%url, request_id, "polling device");
        let response = self
            .client
            .get(&url)
            .query(&[("request_id", request_id)])
            .send()
            .await?
            .error_for_status()?;
        decode(response).await
    }
}
