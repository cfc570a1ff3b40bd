//! Hostname validation.
//!
//! A hostname is one or more `.`-separated segments. Each segment starts with
//! an ASCII alphanumeric or `_` and continues with alphanumerics, `-` or `_`.
//! The final segment must not be purely numeric (RFC 1123 top-level label
//! rule), and the whole input must be consumed.

/// Returns `true` if `text` is a syntactically valid hostname.
///
/// # Examples
///
/// ```
/// use cimb_addr::is_valid_hostname;
///
/// assert!(is_valid_hostname("host1.example.com"));
/// assert!(is_valid_hostname("_svc.local"));
/// assert!(!is_valid_hostname("123.456.789"));
/// ```
pub fn is_valid_hostname(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut pos = 0;
    let mut segment_is_numeric = true;
    let mut expect_segment = true;

    while expect_segment {
        expect_segment = false;
        segment_is_numeric = true;

        match bytes.get(pos) {
            Some(c) if c.is_ascii_alphanumeric() || *c == b'_' => {}
            _ => return false,
        }

        while let Some(&c) = bytes.get(pos) {
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'_' {
                if !c.is_ascii_digit() {
                    segment_is_numeric = false;
                }
                pos += 1;
            } else {
                break;
            }
        }

        if bytes.get(pos) == Some(&b'.') {
            pos += 1;
            expect_segment = true;
        }
    }

    pos == bytes.len() && !segment_is_numeric
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(is_valid_hostname("localhost"));
        assert!(is_valid_hostname("host1.example.com"));
        assert!(is_valid_hostname("_svc.local"));
        assert!(is_valid_hostname("my-host_2.lab"));
        assert!(is_valid_hostname("10.example"));
    }

    #[test]
    fn numeric_final_label() {
        assert!(!is_valid_hostname("123.456.789"));
        assert!(!is_valid_hostname("host.42"));
        assert!(!is_valid_hostname("1.2.3.4"));
    }

    #[test]
    fn malformed_segments() {
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("."));
        assert!(!is_valid_hostname("trailing."));
        assert!(!is_valid_hostname("a..b"));
        assert!(!is_valid_hostname("-leading.com"));
        assert!(!is_valid_hostname("host.-x"));
    }

    #[test]
    fn trailing_characters() {
        assert!(!is_valid_hostname("host name"));
        assert!(!is_valid_hostname("host:5988"));
        assert!(!is_valid_hostname("höst"));
    }
}
