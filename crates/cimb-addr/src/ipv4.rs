//! IPv4 dotted-decimal parsing and formatting.
//!
//! Accepted form: exactly four decimal octets separated by `.`, each one to
//! three digits with a value in `0..=255`. A multi-digit octet must not start
//! with `0` (the native `inet_pton` rejects those as ambiguous octal). The
//! fourth octet must be followed by end-of-input or a `:`, which lets callers
//! parse the host part of a `host:port` string without first splitting it.

/// Scan an IPv4 literal at the start of `text`.
///
/// Returns the four octets and the number of bytes consumed. A trailing `:` is
/// accepted as a terminator but is not consumed.
pub fn scan_ipv4(text: &str) -> Option<([u8; 4], usize)> {
    let bytes = text.as_bytes();
    let mut octets = [0u8; 4];
    let mut pos = 0;

    for (i, octet) in octets.iter_mut().enumerate() {
        let start = pos;
        let mut value: u32 = 0;
        while pos - start < 3 {
            match bytes.get(pos) {
                Some(c) if c.is_ascii_digit() => {
                    value = value * 10 + u32::from(c - b'0');
                    pos += 1;
                }
                _ => break,
            }
        }

        let digits = pos - start;
        if digits == 0 || value > 255 {
            return None;
        }
        if digits > 1 && bytes[start] == b'0' {
            return None;
        }
        *octet = value as u8;

        if i < 3 {
            if bytes.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        } else {
            match bytes.get(pos) {
                None | Some(b':') => {}
                Some(_) => return None,
            }
        }
    }

    Some((octets, pos))
}

/// Parse an IPv4 literal, allowing a trailing `:` suffix (see module docs).
pub fn parse_ipv4(text: &str) -> Option<[u8; 4]> {
    scan_ipv4(text).map(|(octets, _)| octets)
}

/// Returns `true` if `text` starts with a valid IPv4 literal terminated by
/// end-of-input or `:`.
pub fn is_valid_ipv4(text: &str) -> bool {
    scan_ipv4(text).is_some()
}

/// Render four octets as dotted decimal.
pub fn format_ipv4(octets: &[u8; 4]) -> String {
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}
