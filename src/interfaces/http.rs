//! HTTP surface for the authentication device's callbacks.

use crate::application::callback::{CallbackError, CallbackReceiver, CallbackRequest};
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tower_http::trace::TraceLayer;

pub const CALLBACK_PATH: &str = "/api/backchannel/authentication/callback";

impl CallbackError {
    /// - Missing/invalid/unknown input: 400 Bad Request
    /// - Internal: 500 Internal Server Error
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingResult
            | Self::InvalidResult(_)
            | Self::MissingRequestId
            | Self::UnknownRequestId(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        // Internal details stay in the logs.
        let body = match &self {
            Self::MissingResult => "Missing result",
            Self::InvalidResult(_) => "Invalid result",
            Self::MissingRequestId => "Missing request id",
            Self::UnknownRequestId(_) => "Unknown request id",
            Self::Internal(_) => "Internal server error",
        };
        (self.status_code(), body).into_response()
    }
}

pub fn router(receiver: CallbackReceiver) -> Router {
    Router::new()
        .route(CALLBACK_PATH, post(handle_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(receiver)
}

async fn handle_callback(
    State(receiver): State<CallbackReceiver>,
    body: Result<Json<CallbackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "malformed device callback");
            return (StatusCode::BAD_REQUEST, "Invalid payload").into_response();
        }
    };

    match receiver.handle(request).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            if e.is_client_error() {
                tracing::warn!(error = %e, "rejected device callback");
            } else {
                tracing::error!(error = %e, "device callback failed");
            }
            e.into_response()
        }
    }
}
