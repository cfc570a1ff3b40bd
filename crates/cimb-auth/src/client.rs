//! Client side of the challenge/response negotiation.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use crate::scheme::{AuthHeader, AuthType, Challenge, AUTHORIZATION_HEADER, LOCAL_AUTHORIZATION_HEADER};

/// Directory a server may place local-auth secret files in.
pub const DEFAULT_LOCAL_AUTH_DIR: &str = "/tmp";

/// Tracks one authentication round for a client connection.
///
/// The authenticator honours at most one server challenge between calls to
/// [`clear`](Self::clear). A second challenge is reported as "not handled" so
/// a misbehaving server cannot drive an endless challenge loop.
#[derive(Debug)]
pub struct ChallengeAuthenticator {
    auth_type: AuthType,
    challenge_received: bool,
    user_name: Option<String>,
    password: Option<String>,
    realm: Option<String>,
    trusted_dir: PathBuf,
    local_auth_file: Option<PathBuf>,
    local_auth_secret: Option<String>,
}

impl ChallengeAuthenticator {
    /// Create an authenticator that only follows local-auth challenges whose
    /// file lives directly in `trusted_dir`.
    pub fn new(trusted_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_type: AuthType::None,
            challenge_received: false,
            user_name: None,
            password: None,
            realm: None,
            trusted_dir: trusted_dir.into(),
            local_auth_file: None,
            local_auth_secret: None,
        }
    }

    pub fn set_credentials(&mut self, user: impl Into<String>, password: impl Into<String>) {
        self.user_name = Some(user.into());
        self.password = Some(password.into());
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user_name = Some(user.into());
    }

    /// Pre-select a scheme before any challenge (e.g. to send Basic
    /// credentials preemptively or to open a local-auth round).
    pub fn set_auth_type(&mut self, auth_type: AuthType) {
        self.auth_type = auth_type;
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    pub fn is_challenge_received(&self) -> bool {
        self.challenge_received
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn local_auth_file(&self) -> Option<&Path> {
        self.local_auth_file.as_deref()
    }

    /// Start a new authentication round.
    pub fn clear(&mut self) {
        self.auth_type = AuthType::None;
        self.challenge_received = false;
        self.realm = None;
        self.local_auth_file = None;
        self.local_auth_secret = None;
    }

    /// Inspect a `WWW-Authenticate` value from a server response.
    ///
    /// Returns `Ok(true)` if the challenge was accepted and the next request
    /// should carry credentials, `Ok(false)` if it was deliberately not
    /// followed (a repeat challenge, or a local-auth file outside the trusted
    /// directory), and `Err(InvalidAuthHeader)` if the header is malformed or
    /// names an unknown scheme.
    pub fn check_response_header_for_challenge(&mut self, header: &str) -> AuthResult<bool> {
        if self.challenge_received {
            debug!("ignoring repeated authentication challenge");
            return Ok(false);
        }

        let challenge = Challenge::parse(header)?;
        let auth_type = AuthType::from_scheme(&challenge.scheme).ok_or_else(|| {
            AuthError::InvalidAuthHeader(format!("unknown scheme {:?}", challenge.scheme))
        })?;

        if auth_type == AuthType::Local {
            let file = PathBuf::from(&challenge.realm);
            if file.parent() != Some(self.trusted_dir.as_path()) {
                warn!(
                    file = %file.display(),
                    trusted = %self.trusted_dir.display(),
                    "refusing local authentication challenge outside trusted directory"
                );
                return Ok(false);
            }
            self.local_auth_file = Some(file);
            self.local_auth_secret = None;
        }

        self.auth_type = auth_type;
        self.realm = Some(challenge.realm);
        self.challenge_received = true;
        Ok(true)
    }

    /// Credential header for the next request, if the scheme sends one.
    pub fn request_header(&mut self) -> Option<AuthHeader> {
        match self.auth_type {
            AuthType::None => None,
            AuthType::Basic => {
                let user = self.user_name.as_deref().unwrap_or_default();
                let password = self.password.as_deref().unwrap_or_default();
                let token = STANDARD.encode(format!("{user}:{password}"));
                Some(AuthHeader {
                    name: AUTHORIZATION_HEADER,
                    value: format!("Basic {token}"),
                })
            }
            // Digest credentials are not computed; only the scheme is sent.
            AuthType::Digest => Some(AuthHeader {
                name: AUTHORIZATION_HEADER,
                value: "Digest".to_string(),
            }),
            AuthType::Local => {
                let user = self.user_name.clone().unwrap_or_else(current_user);
                let value = match (self.challenge_received, self.local_auth_file.clone()) {
                    (true, Some(file)) => {
                        let secret = self.local_secret(&file);
                        format!("Local \"{user}:{}:{secret}\"", file.display())
                    }
                    _ => format!("Local \"{user}\""),
                };
                Some(AuthHeader {
                    name: LOCAL_AUTHORIZATION_HEADER,
                    value,
                })
            }
        }
    }

    /// The full `Name: value` line for the next request, or an empty string
    /// when no scheme is active.
    pub fn build_request_auth_header(&mut self) -> String {
        self.request_header()
            .map(|h| h.to_string())
            .unwrap_or_default()
    }

    fn local_secret(&mut self, file: &Path) -> String {
        if let Some(secret) = &self.local_auth_secret {
            return secret.clone();
        }
        // An empty secret is rejected by the server, so a read failure only
        // needs to be logged.
        let secret = match read_secret_file(file) {
            Ok(content) => content,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "cannot read local authentication file");
                String::new()
            }
        };
        self.local_auth_secret = Some(secret.clone());
        secret
    }
}

impl Default for ChallengeAuthenticator {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_AUTH_DIR)
    }
}

/// Read a local-auth secret, refusing anything but a regular file. The
/// trusted directory may be world-writable, so a symlink planted there must
/// not be followed.
fn read_secret_file(file: &Path) -> std::io::Result<String> {
    let metadata = std::fs::symlink_metadata(file)?;
    if !metadata.file_type().is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "local authentication file is not a regular file",
        ));
    }
    let content = std::fs::read_to_string(file)?;
    Ok(content.trim_end_matches(['\r', '\n']).to_string())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
