use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// A `WWW-Authenticate` or credential header could not be parsed, or names
    /// a scheme this crate does not know.
    #[error("invalid auth header: {0}")]
    InvalidAuthHeader(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;
