#![allow(dead_code)]

use async_trait::async_trait;
use ciba_device::domain::device::{
    AsyncAuthenticationRequest, AuthenticationAck, PollResultResponse, SyncAuthenticationRequest,
    SyncAuthenticationResponse,
};
use ciba_device::domain::ports::DeviceClient;
use ciba_device::domain::transaction::TransactionContext;
use ciba_device::error::{ProcessorError, Result};
use std::future::Future;
use std::time::Duration;

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn serve(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Waits until `check` holds, giving up after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub fn context(ticket: &str) -> TransactionContext {
    TransactionContext::new(ticket, "alice")
        .with_acrs(["urn:acr:mfa"])
        .with_scopes(["openid", "profile"])
        .with_claims(["given_name"])
        .with_binding_message("Sign in to Example Bank")
}

/// Device that acknowledges every async request with a fixed id.
pub struct AckingDevice {
    pub request_id: String,
}

#[async_trait]
impl DeviceClient for AckingDevice {
    async fn sync_authenticate(
        &self,
        _request: &SyncAuthenticationRequest,
    ) -> Result<SyncAuthenticationResponse> {
        Err(ProcessorError::DeviceProtocol("sync not supported".into()))
    }

    async fn async_authenticate(
        &self,
        _request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck> {
        Ok(AuthenticationAck {
            request_id: Some(self.request_id.clone()),
        })
    }

    async fn poll_authenticate(
        &self,
        _request: &AsyncAuthenticationRequest,
    ) -> Result<AuthenticationAck> {
        Err(ProcessorError::DeviceProtocol("poll not supported".into()))
    }

    async fn poll_result(&self, _request_id: &str) -> Result<PollResultResponse> {
        Err(ProcessorError::DeviceProtocol("poll not supported".into()))
    }
}
