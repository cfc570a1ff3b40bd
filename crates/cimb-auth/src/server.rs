//! Server side of the negotiation: issuing challenges and validating
//! credentials.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::DEFAULT_LOCAL_AUTH_DIR;
use crate::error::AuthResult;
use crate::scheme::{quoted_content, AuthType, Challenge};

const LOCAL_SECRET_LEN: usize = 32;
const DEFAULT_LOCAL_SECRET_TTL_SECS: u64 = 60;
const DEFAULT_MAX_PENDING_LOCAL_SECRETS: usize = 1024;

/// Which schemes a broker accepts and against what.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerAuthConfig {
    /// Require credentials at all. When false every request is anonymous.
    pub enabled: bool,
    pub basic: bool,
    pub local: bool,
    pub realm: String,
    /// User name to password. For local auth only the name is checked.
    pub users: HashMap<String, String>,
    /// Directory local-auth secret files are created in.
    pub trusted_dir: PathBuf,
    /// Seconds an issued local-auth secret stays redeemable.
    pub local_secret_ttl_secs: u64,
    /// Upper bound on secrets issued but not yet redeemed, across all users.
    pub max_pending_local_secrets: usize,
}

impl Default for ServerAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            basic: true,
            local: true,
            realm: "cimom".into(),
            users: HashMap::new(),
            trusted_dir: PathBuf::from(DEFAULT_LOCAL_AUTH_DIR),
            local_secret_ttl_secs: DEFAULT_LOCAL_SECRET_TTL_SECS,
            max_pending_local_secrets: DEFAULT_MAX_PENDING_LOCAL_SECRETS,
        }
    }
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub scheme: AuthType,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            user: "anonymous".into(),
            scheme: AuthType::None,
        }
    }
}

/// Result of inspecting a request's credential headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    /// Reply 401 with this `WWW-Authenticate` value.
    Challenge(String),
    /// Reply 401 without a challenge. The reason is only logged.
    Denied,
}

#[derive(Debug)]
struct IssuedSecret {
    user: String,
    secret: String,
    issued_at: Instant,
}

/// Validates credentials for incoming requests.
pub struct ServerAuthenticator {
    config: ServerAuthConfig,
    issued: Mutex<HashMap<PathBuf, IssuedSecret>>,
}

impl ServerAuthenticator {
    pub fn new(config: ServerAuthConfig) -> Self {
        Self {
            config,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ServerAuthConfig {
        &self.config
    }

    /// Number of local-auth secrets issued but not yet redeemed or expired.
    pub fn pending_local_secrets(&self) -> usize {
        self.issued.lock().expect("lock poisoned").len()
    }

    /// Decide what to do with a request given its `Authorization` and
    /// `PegasusAuthorization` header values.
    ///
    /// Only I/O failures while creating a local secret file are errors.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        local_authorization: Option<&str>,
    ) -> AuthResult<AuthOutcome> {
        if !self.config.enabled {
            return Ok(AuthOutcome::Authenticated(Identity::anonymous()));
        }

        if let Some(value) = local_authorization {
            if !self.config.local {
                warn!("local authentication attempted but disabled");
                return Ok(AuthOutcome::Denied);
            }
            return self.authenticate_local(value);
        }

        if let Some(value) = authorization {
            return Ok(self.authenticate_authorization(value));
        }

        if self.config.basic {
            Ok(AuthOutcome::Challenge(self.basic_challenge()))
        } else {
            Ok(AuthOutcome::Denied)
        }
    }

    fn basic_challenge(&self) -> String {
        Challenge {
            scheme: AuthType::Basic.scheme_name().into(),
            realm: self.config.realm.clone(),
        }
        .to_header_value()
    }

    fn authenticate_authorization(&self, value: &str) -> AuthOutcome {
        let value = value.trim_start();
        let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
        match AuthType::from_scheme(scheme) {
            Some(AuthType::Basic) if self.config.basic => self.authenticate_basic(token.trim()),
            Some(AuthType::Digest) => {
                warn!("digest authentication is not supported");
                AuthOutcome::Denied
            }
            _ => {
                warn!(scheme, "unsupported authorization scheme");
                AuthOutcome::Denied
            }
        }
    }

    fn authenticate_basic(&self, token: &str) -> AuthOutcome {
        let decoded = match STANDARD.decode(token) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "malformed basic credentials");
                return AuthOutcome::Denied;
            }
        };
        let Ok(text) = String::from_utf8(decoded) else {
            warn!("basic credentials are not UTF-8");
            return AuthOutcome::Denied;
        };
        let Some((user, password)) = text.split_once(':') else {
            warn!("basic credentials missing ':' separator");
            return AuthOutcome::Denied;
        };

        match self.config.users.get(user) {
            Some(expected) if expected == password => {
                debug!(user, "basic authentication succeeded");
                AuthOutcome::Authenticated(Identity {
                    user: user.to_string(),
                    scheme: AuthType::Basic,
                })
            }
            _ => {
                warn!(user, "basic authentication failed");
                AuthOutcome::Denied
            }
        }
    }

    fn authenticate_local(&self, value: &str) -> AuthResult<AuthOutcome> {
        let value = value.trim_start();
        let Some(rest) = value.strip_prefix("Local") else {
            warn!("local authorization header without Local scheme");
            return Ok(AuthOutcome::Denied);
        };
        let Some(content) = quoted_content(rest) else {
            warn!("local authorization header missing quoted credentials");
            return Ok(AuthOutcome::Denied);
        };

        match content.split_once(':') {
            None => self.issue_local_secret(content),
            Some((user, rest)) => {
                let Some((file, secret)) = rest.rsplit_once(':') else {
                    warn!(user, "local credentials missing secret");
                    return Ok(AuthOutcome::Denied);
                };
                Ok(self.redeem_local_secret(user, PathBuf::from(file), secret))
            }
        }
    }

    fn issue_local_secret(&self, user: &str) -> AuthResult<AuthOutcome> {
        if !is_plain_user_name(user) || !self.is_known_user(user) {
            warn!(user, "local authentication requested for unknown user");
            return Ok(AuthOutcome::Denied);
        }

        let mut rng = rand::thread_rng();
        let secret: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(LOCAL_SECRET_LEN)
            .map(char::from)
            .collect();
        let nonce: u64 = rng.gen();
        let file = self
            .config
            .trusted_dir
            .join(format!("cimb-local-{user}-{nonce:016x}"));

        write_secret_file(&file, &secret)?;
        let mut stale = self.take_expired();
        {
            let mut issued = self.issued.lock().expect("lock poisoned");
            // At most one outstanding secret per user: a new round replaces the old.
            let previous: Vec<PathBuf> = issued
                .iter()
                .filter(|(_, entry)| entry.user == user)
                .map(|(path, _)| path.clone())
                .collect();
            for path in previous {
                issued.remove(&path);
                stale.push(path);
            }
            if issued.len() >= self.config.max_pending_local_secrets {
                drop(issued);
                stale.push(file);
                remove_secret_files(&stale);
                warn!(user, "too many pending local authentication secrets");
                return Ok(AuthOutcome::Denied);
            }
            issued.insert(
                file.clone(),
                IssuedSecret {
                    user: user.to_string(),
                    secret,
                    issued_at: Instant::now(),
                },
            );
        }
        remove_secret_files(&stale);
        debug!(user, file = %file.display(), "issued local authentication secret");

        Ok(AuthOutcome::Challenge(
            Challenge {
                scheme: AuthType::Local.scheme_name().into(),
                realm: file.display().to_string(),
            }
            .to_header_value(),
        ))
    }

    fn redeem_local_secret(&self, user: &str, file: PathBuf, secret: &str) -> AuthOutcome {
        remove_secret_files(&self.take_expired());

        // Only paths this authenticator issued are ever removed.
        let issued = self.issued.lock().expect("lock poisoned").remove(&file);
        if issued.is_some() {
            remove_secret_files(std::slice::from_ref(&file));
        }

        match issued {
            Some(entry) if entry.user == user && !secret.is_empty() && entry.secret == secret => {
                debug!(user, "local authentication succeeded");
                AuthOutcome::Authenticated(Identity {
                    user: user.to_string(),
                    scheme: AuthType::Local,
                })
            }
            _ => {
                warn!(user, "local authentication failed");
                AuthOutcome::Denied
            }
        }
    }

    /// Drop expired secrets from the table and return their files.
    fn take_expired(&self) -> Vec<PathBuf> {
        let ttl = Duration::from_secs(self.config.local_secret_ttl_secs);
        let mut issued = self.issued.lock().expect("lock poisoned");
        let expired: Vec<PathBuf> = issued
            .iter()
            .filter(|(_, entry)| entry.issued_at.elapsed() >= ttl)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &expired {
            issued.remove(path);
        }
        expired
    }

    fn is_known_user(&self, user: &str) -> bool {
        self.config.users.is_empty() || self.config.users.contains_key(user)
    }
}

impl std::fmt::Debug for ServerAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerAuthenticator")
            .field("enabled", &self.config.enabled)
            .field("basic", &self.config.basic)
            .field("local", &self.config.local)
            .field("pending_local_secrets", &self.pending_local_secrets())
            .finish()
    }
}

/// User names end up in file names, so only a conservative set is allowed.
fn is_plain_user_name(user: &str) -> bool {
    !user.is_empty()
        && !user.starts_with('.')
        && user
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn remove_secret_files(files: &[PathBuf]) {
    for file in files {
        if let Err(e) = std::fs::remove_file(file) {
            debug!(file = %file.display(), error = %e, "could not remove local secret file");
        }
    }
}

fn write_secret_file(path: &std::path::Path, secret: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(secret.as_bytes())
}
