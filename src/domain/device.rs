//! Wire types exchanged with the authentication device.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAuthenticationRequest {
    pub user: String,
    pub message: String,
    /// Seconds the device may spend interacting with the user.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SyncAuthenticationResponse {
    #[serde(default)]
    pub result: Option<String>,
}

/// Body of both the async-authenticate and poll requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncAuthenticationRequest {
    pub user: String,
    pub message: String,
}

/// Acknowledgement of an async or poll request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthenticationAck {
    #[serde(default)]
    pub request_id: Option<String>,
}

impl AuthenticationAck {
    /// The device-issued request id, if present and non-empty.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref().filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Pending,
    Complete,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResultResponse {
    pub status: PollStatus,
    #[serde(default)]
    pub result: Option<String>,
}
