//! Challenge/response authentication for the CIM broker.
//!
//! The client half, [`ChallengeAuthenticator`], is a two-state machine:
//! it follows the first `WWW-Authenticate` challenge of a round and builds the
//! matching credential header. The server half, [`ServerAuthenticator`],
//! issues those challenges and validates what comes back.
//!
//! # Schemes
//!
//! - **Basic**: `Authorization: Basic base64(user:password)`.
//! - **Local**: the server writes a random secret into a file inside a trusted
//!   directory and names the file as the challenge realm; the client proves it
//!   runs on the same host by echoing the file content in
//!   `PegasusAuthorization: Local "user:file:secret"`.
//! - **Digest**: recognised in challenges, but no digest response is
//!   computed. Servers in this workspace reject it.

pub mod client;
pub mod error;
pub mod scheme;
pub mod server;

pub use client::{ChallengeAuthenticator, DEFAULT_LOCAL_AUTH_DIR};
pub use error::{AuthError, AuthResult};
pub use scheme::{
    AuthHeader, AuthType, Challenge, AUTHORIZATION_HEADER, CHALLENGE_HEADER,
    LOCAL_AUTHORIZATION_HEADER,
};
pub use server::{AuthOutcome, Identity, ServerAuthConfig, ServerAuthenticator};
