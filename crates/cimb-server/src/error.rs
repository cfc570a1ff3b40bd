use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use cimb_auth::AuthError;
use cimb_stream::StreamError;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Credentials missing or refused. Carries the `WWW-Authenticate` value
    /// when the caller should retry.
    #[error("unauthorized")]
    Unauthorized { challenge: Option<String> },

    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("address error: {0}")]
    Addr(#[from] cimb_addr::AddrError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Stream(e) if e.is_decode_failure() => StatusCode::BAD_REQUEST,
            Self::Stream(StreamError::OutOfMemory { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Addr(_) | Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) | Self::Stream(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // Bodies stay generic; details only go to the log.
        let status = self.status_code();
        let body = match &self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Stream(e) if e.is_decode_failure() => "Malformed object stream",
            Self::Stream(StreamError::OutOfMemory { .. }) => "Insufficient memory",
            Self::Addr(_) | Self::Config(_) => "Bad request",
            _ => "Internal server error",
        };

        match self {
            Self::Unauthorized {
                challenge: Some(challenge),
            } => (status, [(header::WWW_AUTHENTICATE, challenge)], body).into_response(),
            _ => (status, body).into_response(),
        }
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ServerError::Unauthorized { challenge: None }.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Stream(StreamError::TrailingBytes(3)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerError::Stream(StreamError::OutOfMemory { requested: 1 }).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServerError::Stream(StreamError::ReferenceTooDeep(1024)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServerError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn challenge_becomes_header() {
        let response = ServerError::Unauthorized {
            challenge: Some("Basic realm=\"cimom\"".into()),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"cimom\""
        );
    }

    #[test]
    fn denial_has_no_challenge() {
        let response = ServerError::Unauthorized { challenge: None }.into_response();
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
