use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Request header carrying Basic and Digest credentials.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Request header carrying local-scheme credentials.
pub const LOCAL_AUTHORIZATION_HEADER: &str = "PegasusAuthorization";
/// Response header carrying a server challenge.
pub const CHALLENGE_HEADER: &str = "WWW-Authenticate";

/// Authentication scheme negotiated for a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    None,
    Basic,
    Digest,
    Local,
}

impl AuthType {
    /// Map a challenge scheme token to a type. Matching is exact and
    /// case-sensitive.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "Basic" => Some(Self::Basic),
            "Digest" => Some(Self::Digest),
            "Local" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn scheme_name(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Basic => "Basic",
            Self::Digest => "Digest",
            Self::Local => "Local",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            other => f.write_str(other.scheme_name()),
        }
    }
}

/// A parsed `WWW-Authenticate` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub realm: String,
}

impl Challenge {
    /// Parse `<Scheme> realm="<realm>"`.
    ///
    /// Leading whitespace is skipped, the scheme runs up to the first space,
    /// and the realm is the text between the first and second `"` after it.
    /// The scheme is not checked against the known set here.
    pub fn parse(header: &str) -> AuthResult<Self> {
        let trimmed = header.trim_start();
        let (scheme, rest) = trimmed
            .split_once(' ')
            .ok_or_else(|| AuthError::InvalidAuthHeader(format!("missing realm in {header:?}")))?;
        if scheme.is_empty() {
            return Err(AuthError::InvalidAuthHeader(format!(
                "missing scheme in {header:?}"
            )));
        }

        let realm = quoted_content(rest)
            .ok_or_else(|| AuthError::InvalidAuthHeader(format!("missing realm in {header:?}")))?;
        if realm.is_empty() {
            return Err(AuthError::InvalidAuthHeader(format!(
                "empty realm in {header:?}"
            )));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            realm: realm.to_string(),
        })
    }

    /// Render as a `WWW-Authenticate` value.
    pub fn to_header_value(&self) -> String {
        format!("{} realm=\"{}\"", self.scheme, self.realm)
    }
}

/// A request header produced by the client side of the negotiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: &'static str,
    pub value: String,
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// Text between the first and second `"` in `s`.
pub(crate) fn quoted_content(s: &str) -> Option<&str> {
    let start = s.find('"')? + 1;
    let len = s[start..].find('"')?;
    Some(&s[start..start + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_challenge() {
        let c = Challenge::parse("Basic realm=\"cimom.example.com\"").unwrap();
        assert_eq!(c.scheme, "Basic");
        assert_eq!(c.realm, "cimom.example.com");
        assert_eq!(c.to_header_value(), "Basic realm=\"cimom.example.com\"");
    }

    #[test]
    fn parse_skips_leading_whitespace() {
        let c = Challenge::parse("   Local realm=\"/tmp/cimb-local-1\"").unwrap();
        assert_eq!(c.scheme, "Local");
        assert_eq!(c.realm, "/tmp/cimb-local-1");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(Challenge::parse("Basic"), Err(AuthError::InvalidAuthHeader(_))));
        assert!(matches!(Challenge::parse(""), Err(AuthError::InvalidAuthHeader(_))));
        assert!(matches!(
            Challenge::parse("Basic realm=\"\""),
            Err(AuthError::InvalidAuthHeader(_))
        ));
        assert!(matches!(
            Challenge::parse("Basic realm=\"unterminated"),
            Err(AuthError::InvalidAuthHeader(_))
        ));
        assert!(matches!(
            Challenge::parse(" realm=\"x\""),
            Err(AuthError::InvalidAuthHeader(_))
        ));
    }

    #[test]
    fn scheme_lookup_is_case_sensitive() {
        assert_eq!(AuthType::from_scheme("Basic"), Some(AuthType::Basic));
        assert_eq!(AuthType::from_scheme("Local"), Some(AuthType::Local));
        assert_eq!(AuthType::from_scheme("basic"), None);
        assert_eq!(AuthType::from_scheme("Negotiate"), None);
    }

    #[test]
    fn auth_header_display() {
        let h = AuthHeader {
            name: AUTHORIZATION_HEADER,
            value: "Basic dTpw".into(),
        };
        assert_eq!(h.to_string(), "Authorization: Basic dTpw");
    }
}
