//! Host address parsing for the CIM broker.
//!
//! Connection setup needs to know, before opening a socket, whether a piece
//! of text names an IPv4 literal, an IPv6 literal, or a hostname. The parsers
//! here are hand-written so that the accepted set does not drift with the
//! platform resolver, and they are cross-checked against `std::net` in tests.
//!
//! All validation functions are pure: they return `bool` / `Option` and never
//! panic. [`HostAddress`] and [`HostLocator`] wrap them with typed errors for
//! callers that want `?`.

pub mod address;
pub mod error;
pub mod hostname;
pub mod ipv4;
pub mod ipv6;

pub use address::{classify, AddressType, HostAddress, HostLocator};
pub use error::{AddrError, AddrResult};
pub use hostname::is_valid_hostname;
pub use ipv4::{format_ipv4, is_valid_ipv4, parse_ipv4, scan_ipv4};
pub use ipv6::{format_ipv6, is_valid_ipv6, parse_ipv6};
