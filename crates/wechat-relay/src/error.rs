use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::envelope::EnvelopeError;

/// Errors that end a callback request without a reply envelope.
///
/// Everything else (backend failures, empty model output) is absorbed into a
/// `200` reply, because WeChat re-delivers on anything but a timely `200`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid callback signature")]
    SignatureInvalid,

    /// Without sender and recipient there is nobody to address a reply to.
    #[error(transparent)]
    MalformedInput(#[from] EnvelopeError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            Self::SignatureInvalid => {
                tracing::warn!("Rejected callback: invalid signature");
                (StatusCode::FORBIDDEN, "forbidden").into_response()
            }
            Self::MalformedInput(e) => {
                tracing::warn!(error = %e, "Rejected callback: malformed envelope");
                (StatusCode::BAD_REQUEST, "bad request").into_response()
            }
        }
    }
}
