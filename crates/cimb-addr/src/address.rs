//! Address classification and `host[:port]` locators.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{AddrError, AddrResult};
use crate::hostname::is_valid_hostname;
use crate::ipv4::{parse_ipv4, scan_ipv4};
use crate::ipv6::{format_ipv6, parse_ipv6};

/// Which family a piece of address text belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressType {
    Ipv4,
    Ipv6,
    Hostname,
    Invalid,
}

/// Classify `text` as exactly one of IPv4, IPv6, hostname or invalid.
///
/// IPv4 is tried first, so `"1.2.3.4:5988"` classifies as IPv4 (the colon
/// terminates the literal). Never fails; callers decide how to react to
/// [`AddressType::Invalid`].
pub fn classify(text: &str) -> AddressType {
    if parse_ipv4(text).is_some() {
        AddressType::Ipv4
    } else if parse_ipv6(text).is_some() {
        AddressType::Ipv6
    } else if is_valid_hostname(text) {
        AddressType::Hostname
    } else {
        AddressType::Invalid
    }
}

/// A validated host: an IP literal in binary form, or a hostname.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostAddress {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Hostname(String),
}

impl HostAddress {
    pub fn address_type(&self) -> AddressType {
        match self {
            Self::Ipv4(_) => AddressType::Ipv4,
            Self::Ipv6(_) => AddressType::Ipv6,
            Self::Hostname(_) => AddressType::Hostname,
        }
    }

    /// The binary form, if this is an IP literal.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Self::Ipv4(a) => Some(IpAddr::V4(*a)),
            Self::Ipv6(a) => Some(IpAddr::V6(*a)),
            Self::Hostname(_) => None,
        }
    }
}

impl FromStr for HostAddress {
    type Err = AddrError;

    /// Parse a complete host. Unlike [`classify`], a trailing `:` suffix is
    /// not accepted here.
    fn from_str(s: &str) -> AddrResult<Self> {
        if let Some((octets, used)) = scan_ipv4(s) {
            if used == s.len() {
                return Ok(Self::Ipv4(Ipv4Addr::from(octets)));
            }
        }
        if let Some(octets) = parse_ipv6(s) {
            return Ok(Self::Ipv6(Ipv6Addr::from(octets)));
        }
        if is_valid_hostname(s) {
            return Ok(Self::Hostname(s.to_string()));
        }
        Err(AddrError::Invalid { text: s.to_string() })
    }
}

impl fmt::Display for HostAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4(a) => write!(f, "{a}"),
            Self::Ipv6(a) => f.write_str(&format_ipv6(&a.octets())),
            Self::Hostname(h) => f.write_str(h),
        }
    }
}

/// A host with an optional port, as written in connection strings.
///
/// Accepted forms: `host`, `host:port`, `[ipv6]`, `[ipv6]:port`, and a bare
/// IPv6 literal (which never carries a port).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostLocator {
    pub host: HostAddress,
    pub port: Option<u16>,
}

impl HostLocator {
    pub fn parse(text: &str) -> AddrResult<Self> {
        if let Some(rest) = text.strip_prefix('[') {
            let close = rest.find(']').ok_or_else(|| AddrError::UnterminatedBracket {
                text: text.to_string(),
            })?;
            let inner = &rest[..close];
            let octets = parse_ipv6(inner).ok_or_else(|| AddrError::Invalid {
                text: inner.to_string(),
            })?;
            let port = match &rest[close + 1..] {
                "" => None,
                tail => match tail.strip_prefix(':') {
                    Some(p) => Some(parse_port(p, text)?),
                    None => return Err(AddrError::Invalid { text: text.to_string() }),
                },
            };
            return Ok(Self {
                host: HostAddress::Ipv6(Ipv6Addr::from(octets)),
                port,
            });
        }

        if text.matches(':').count() > 1 {
            let host = match parse_ipv6(text) {
                Some(octets) => HostAddress::Ipv6(Ipv6Addr::from(octets)),
                None => return Err(AddrError::Invalid { text: text.to_string() }),
            };
            return Ok(Self { host, port: None });
        }

        let (host_text, port) = match text.split_once(':') {
            Some((h, p)) => (h, Some(parse_port(p, text)?)),
            None => (text, None),
        };
        Ok(Self {
            host: host_text.parse()?,
            port,
        })
    }

    /// The port, falling back to `default` when none was written.
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

impl fmt::Display for HostLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.host, self.port) {
            (HostAddress::Ipv6(_), Some(port)) => write!(f, "[{}]:{port}", self.host),
            (host, Some(port)) => write!(f, "{host}:{port}"),
            (host, None) => write!(f, "{host}"),
        }
    }
}

fn parse_port(digits: &str, text: &str) -> AddrResult<u16> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddrError::InvalidPort { text: text.to_string() });
    }
    digits
        .parse()
        .map_err(|_| AddrError::InvalidPort { text: text.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_families() {
        assert_eq!(classify("255.255.255.255"), AddressType::Ipv4);
        assert_eq!(classify("1.2.3.4:5988"), AddressType::Ipv4);
        assert_eq!(classify("::1"), AddressType::Ipv6);
        assert_eq!(classify("::ffff:127.0.0.1"), AddressType::Ipv6);
        assert_eq!(classify("host1.example.com"), AddressType::Hostname);
        assert_eq!(classify("_svc.local"), AddressType::Hostname);
        assert_eq!(classify("123.456.789"), AddressType::Invalid);
        assert_eq!(classify("256.0.0.1"), AddressType::Invalid);
        assert_eq!(classify(""), AddressType::Invalid);
    }

    #[test]
    fn from_str_requires_full_input() {
        assert!(matches!("1.2.3.4".parse::<HostAddress>(), Ok(HostAddress::Ipv4(_))));
        assert!(matches!(
            "1.2.3.4:80".parse::<HostAddress>(),
            Err(AddrError::Invalid { .. })
        ));
        assert!("fe80::1".parse::<HostAddress>().unwrap().ip().is_some());
        assert!("example.org".parse::<HostAddress>().unwrap().ip().is_none());
    }

    #[test]
    fn display_uses_canonical_ipv6() {
        let host: HostAddress = "0:0:0:0:0:0:0:1".parse().unwrap();
        assert_eq!(host.to_string(), "::1");
        assert_eq!(host.address_type(), AddressType::Ipv6);
    }

    #[test]
    fn locator_host_and_port() {
        let loc = HostLocator::parse("cimom.example.com:5989").unwrap();
        assert_eq!(loc.host, HostAddress::Hostname("cimom.example.com".into()));
        assert_eq!(loc.port, Some(5989));

        let loc = HostLocator::parse("10.0.0.1:5988").unwrap();
        assert_eq!(loc.host, HostAddress::Ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(loc.to_string(), "10.0.0.1:5988");

        let loc = HostLocator::parse("localhost").unwrap();
        assert_eq!(loc.port_or(5988), 5988);
    }

    #[test]
    fn locator_ipv6_forms() {
        let loc = HostLocator::parse("[::1]:5989").unwrap();
        assert_eq!(loc.host, HostAddress::Ipv6(Ipv6Addr::LOCALHOST));
        assert_eq!(loc.port, Some(5989));
        assert_eq!(loc.to_string(), "[::1]:5989");

        let bare = HostLocator::parse("fe80::2").unwrap();
        assert_eq!(bare.port, None);

        let bracketed = HostLocator::parse("[fe80::2]").unwrap();
        assert_eq!(bracketed.port, None);
    }

    #[test]
    fn locator_errors() {
        assert!(matches!(
            HostLocator::parse("[::1"),
            Err(AddrError::UnterminatedBracket { .. })
        ));
        assert!(matches!(
            HostLocator::parse("host:99999"),
            Err(AddrError::InvalidPort { .. })
        ));
        assert!(matches!(
            HostLocator::parse("host:"),
            Err(AddrError::InvalidPort { .. })
        ));
        assert!(matches!(
            HostLocator::parse("host:+80"),
            Err(AddrError::InvalidPort { .. })
        ));
        assert!(matches!(
            HostLocator::parse("[::1]x"),
            Err(AddrError::Invalid { .. })
        ));
        assert!(matches!(
            HostLocator::parse("bad host:80"),
            Err(AddrError::Invalid { .. })
        ));
    }
}
