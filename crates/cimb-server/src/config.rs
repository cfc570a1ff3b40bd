use std::path::Path;

use serde::{Deserialize, Serialize};

use cimb_addr::{classify, AddressType, HostLocator};
use cimb_auth::ServerAuthConfig;

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 5988;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
    /// Largest accepted `/cimom` request body, in bytes.
    pub max_payload_size: usize,
    pub auth: ServerAuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            max_payload_size: 16 * 1024 * 1024,
            auth: ServerAuthConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if classify(&self.bind_host) == AddressType::Invalid {
            return Err(ServerError::Config(format!(
                "invalid bind host {:?}",
                self.bind_host
            )));
        }
        if self.max_payload_size == 0 {
            return Err(ServerError::Config("max_payload_size must be non-zero".into()));
        }
        if self.auth.enabled && !self.auth.basic && !self.auth.local {
            return Err(ServerError::Config(
                "authentication enabled with no scheme allowed".into(),
            ));
        }
        Ok(())
    }

    /// Override the bind address from `host[:port]` text (`[v6]:port` for
    /// IPv6 with a port).
    pub fn apply_bind(&mut self, text: &str) -> ServerResult<()> {
        let locator = HostLocator::parse(text)?;
        self.bind_host = locator.host.to_string();
        self.port = locator.port_or(self.port);
        Ok(())
    }

    /// `host:port` for display, bracketing IPv6 literals.
    pub fn bind_display(&self) -> String {
        if classify(&self.bind_host) == AddressType::Ipv6 {
            format!("[{}]:{}", self.bind_host, self.port)
        } else {
            format!("{}:{}", self.bind_host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_host, "127.0.0.1");
        assert_eq!(c.port, DEFAULT_PORT);
        assert!(!c.auth.enabled);
        c.validate().unwrap();
    }

    #[test]
    fn parses_toml_with_defaults() {
        let c = ServerConfig::from_toml(
            r#"
            port = 15988

            [auth]
            enabled = true
            realm = "lab"
            users = { admin = "secret" }
            "#,
        )
        .unwrap();
        assert_eq!(c.port, 15988);
        assert_eq!(c.bind_host, "127.0.0.1");
        assert!(c.auth.enabled);
        assert!(c.auth.basic);
        assert_eq!(c.auth.realm, "lab");
        assert_eq!(c.auth.users.get("admin").map(String::as_str), Some("secret"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cimserver.toml");
        std::fs::write(&path, "bind_host = \"::1\"\n").unwrap();
        let c = ServerConfig::load(&path).unwrap();
        assert_eq!(c.bind_host, "::1");
        assert_eq!(c.bind_display(), format!("[::1]:{DEFAULT_PORT}"));
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            ServerConfig::from_toml("port = \"eighty\""),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut c = ServerConfig {
            bind_host: "not a host!".into(),
            ..ServerConfig::default()
        };
        assert!(c.validate().is_err());

        c.bind_host = "0.0.0.0".into();
        c.max_payload_size = 0;
        assert!(c.validate().is_err());

        c.max_payload_size = 1024;
        c.auth.enabled = true;
        c.auth.basic = false;
        c.auth.local = false;
        assert!(c.validate().is_err());
    }

    #[test]
    fn apply_bind_overrides() {
        let mut c = ServerConfig::default();
        c.apply_bind("[::1]:6000").unwrap();
        assert_eq!(c.bind_host, "::1");
        assert_eq!(c.port, 6000);

        c.apply_bind("cimom.example.com").unwrap();
        assert_eq!(c.bind_host, "cimom.example.com");
        assert_eq!(c.port, 6000);

        c.apply_bind("10.0.0.1:7000").unwrap();
        assert_eq!(c.bind_display(), "10.0.0.1:7000");

        assert!(matches!(c.apply_bind("host:port"), Err(ServerError::Addr(_))));
    }
}
