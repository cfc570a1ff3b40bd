//! Error types for address parsing.

use thiserror::Error;

/// Errors surfaced to the connecting layer when address text is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrError {
    /// The text is neither an IPv4 literal, an IPv6 literal, nor a hostname.
    #[error("invalid host address: {text:?}")]
    Invalid { text: String },

    /// The port part of a locator is not a decimal number in `0..=65535`.
    #[error("invalid port in {text:?}")]
    InvalidPort { text: String },

    /// A bracketed IPv6 locator is missing its closing `]`.
    #[error("unterminated '[' in {text:?}")]
    UnterminatedBracket { text: String },
}

/// Convenience type alias for address operations.
pub type AddrResult<T> = std::result::Result<T, AddrError>;
