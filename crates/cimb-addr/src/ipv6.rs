//! IPv6 text parsing and canonical formatting.

use crate::ipv4::{format_ipv4, scan_ipv4};

const IN6ADDRSZ: usize = 16;

/// Parse a textual IPv6 address into its 16-byte network form.
///
/// Groups are one to four hex digits (either case), at most eight of them.
/// A single `::` stands for one or more zero groups. The last 32 bits may be
/// written as an embedded IPv4 literal (`::ffff:1.2.3.4`), which must itself
/// pass IPv4 validation and end the input.
pub fn parse_ipv6(text: &str) -> Option<[u8; 16]> {
    let src = text.as_bytes();
    let mut out = [0u8; IN6ADDRSZ];
    let mut tp = 0usize;
    let mut colonp: Option<usize> = None;
    let mut i = 0usize;

    // A leading ':' is only legal as the first half of '::'.
    if src.first() == Some(&b':') {
        if src.get(1) != Some(&b':') {
            return None;
        }
        i = 1;
    }

    let mut curtok = i;
    let mut saw_xdigit = false;
    let mut digits = 0usize;
    let mut val: u32 = 0;

    while i < src.len() {
        let ch = src[i];
        i += 1;

        if let Some(d) = char::from(ch).to_digit(16) {
            digits += 1;
            if digits > 4 {
                return None;
            }
            val = (val << 4) | d;
            saw_xdigit = true;
            continue;
        }

        if ch == b':' {
            curtok = i;
            if !saw_xdigit {
                if colonp.is_some() {
                    return None;
                }
                colonp = Some(tp);
                continue;
            }
            if i == src.len() {
                return None;
            }
            if tp + 2 > IN6ADDRSZ {
                return None;
            }
            out[tp] = (val >> 8) as u8;
            out[tp + 1] = val as u8;
            tp += 2;
            saw_xdigit = false;
            digits = 0;
            val = 0;
            continue;
        }

        if ch == b'.' && tp + 4 <= IN6ADDRSZ {
            let tail = &text[curtok..];
            let (v4, used) = scan_ipv4(tail)?;
            if used != tail.len() {
                return None;
            }
            out[tp..tp + 4].copy_from_slice(&v4);
            tp += 4;
            saw_xdigit = false;
            break;
        }

        return None;
    }

    if saw_xdigit {
        if tp + 2 > IN6ADDRSZ {
            return None;
        }
        out[tp] = (val >> 8) as u8;
        out[tp + 1] = val as u8;
        tp += 2;
    }

    if let Some(cp) = colonp {
        // '::' must stand for at least one group.
        if tp == IN6ADDRSZ {
            return None;
        }
        let n = tp - cp;
        for k in 1..=n {
            out[IN6ADDRSZ - k] = out[cp + n - k];
            out[cp + n - k] = 0;
        }
        tp = IN6ADDRSZ;
    }

    if tp != IN6ADDRSZ {
        return None;
    }
    Some(out)
}

/// Returns `true` if `text` is a complete IPv6 literal.
pub fn is_valid_ipv6(text: &str) -> bool {
    parse_ipv6(text).is_some()
}

/// Render a 16-byte IPv6 address as text.
///
/// The longest run of two or more zero groups is replaced by `::`; on a tie
/// the first run wins. IPv4-mapped (`::ffff:a.b.c.d`) and IPv4-compatible
/// (`::a.b.c.d`) addresses keep a dotted-decimal tail.
pub fn format_ipv6(octets: &[u8; 16]) -> String {
    let mut words = [0u16; 8];
    for (i, word) in words.iter_mut().enumerate() {
        *word = u16::from_be_bytes([octets[2 * i], octets[2 * i + 1]]);
    }

    let best = longest_zero_run(&words);
    let mut out = String::with_capacity(39);
    let mut i = 0;

    while i < 8 {
        if let Some((base, len)) = best {
            if i == base {
                out.push(':');
                i += len;
                continue;
            }
        }
        if i != 0 {
            out.push(':');
        }
        if i == 6 {
            if let Some((0, len)) = best {
                if len == 6 || (len == 5 && words[5] == 0xffff) {
                    let tail = [octets[12], octets[13], octets[14], octets[15]];
                    out.push_str(&format_ipv4(&tail));
                    break;
                }
            }
        }
        out.push_str(&format!("{:x}", words[i]));
        i += 1;
    }

    if let Some((base, len)) = best {
        if base + len == 8 {
            out.push(':');
        }
    }
    out
}

/// Locate the first longest run of zero words, ignoring runs shorter than two.
fn longest_zero_run(words: &[u16; 8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut cur: Option<(usize, usize)> = None;

    for (i, &w) in words.iter().enumerate() {
        if w == 0 {
            cur = match cur {
                Some((base, len)) => Some((base, len + 1)),
                None => Some((i, 1)),
            };
        } else if let Some(run) = cur.take() {
            if best.map_or(true, |b| run.1 > b.1) {
                best = Some(run);
            }
        }
    }
    if let Some(run) = cur {
        if best.map_or(true, |b| run.1 > b.1) {
            best = Some(run);
        }
    }

    best.filter(|&(_, len)| len >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::net::Ipv6Addr;

    #[test]
    fn loopback_forms_are_equal() {
        let long = parse_ipv6("0:0:0:0:0:0:0:1").unwrap();
        let short = parse_ipv6("::1").unwrap();
        assert_eq!(long, short);
        assert_eq!(format_ipv6(&long), "::1");
    }

    #[test]
    fn unspecified_address() {
        let zero = parse_ipv6("::").unwrap();
        assert_eq!(zero, [0u8; 16]);
        assert_eq!(format_ipv6(&zero), "::");
    }

    #[test]
    fn mapped_ipv4_round_trips() {
        let bin = parse_ipv6("::ffff:127.0.0.1").unwrap();
        assert_eq!(&bin[10..], &[0xff, 0xff, 127, 0, 0, 1]);
        assert_eq!(format_ipv6(&bin), "::ffff:127.0.0.1");
    }

    #[test]
    fn compatible_ipv4_round_trips() {
        let bin = parse_ipv6("::10.1.2.3").unwrap();
        assert_eq!(format_ipv6(&bin), "::10.1.2.3");
    }

    #[test]
    fn case_insensitive_hex() {
        assert_eq!(parse_ipv6("FE80::ABCD"), parse_ipv6("fe80::abcd"));
    }

    #[test]
    fn rejects_double_compression() {
        assert!(parse_ipv6("1::2::3").is_none());
        assert!(parse_ipv6(":::").is_none());
    }

    #[test]
    fn rejects_too_many_groups() {
        assert!(parse_ipv6("1:2:3:4:5:6:7:8:9").is_none());
        assert!(parse_ipv6("1::2:3:4:5:6:7:8").is_none());
        assert!(parse_ipv6("1:2:3:4:5:6:7:1.2.3.4").is_none());
    }

    #[test]
    fn rejects_lone_colons_and_long_groups() {
        assert!(parse_ipv6(":1::").is_none());
        assert!(parse_ipv6("1::2:").is_none());
        assert!(parse_ipv6("12345::").is_none());
        assert!(parse_ipv6("").is_none());
        assert!(parse_ipv6("1:2:3:4:5:6:7").is_none());
    }

    #[test]
    fn rejects_bad_embedded_ipv4() {
        assert!(parse_ipv6("::ffff:256.0.0.1").is_none());
        assert!(parse_ipv6("::ffff:1.2.3").is_none());
        assert!(parse_ipv6("::ffff:1.2.3.4:5").is_none());
        assert!(parse_ipv6("::1.2.3.4::").is_none());
    }

    #[test]
    fn elides_first_of_equal_runs() {
        let bin = parse_ipv6("1:0:0:2:0:0:3:4").unwrap();
        assert_eq!(format_ipv6(&bin), "1::2:0:0:3:4");
    }

    #[test]
    fn elides_longest_run() {
        let bin = parse_ipv6("1:0:0:2:0:0:0:3").unwrap();
        assert_eq!(format_ipv6(&bin), "1:0:0:2::3");
    }

    #[test]
    fn single_zero_group_is_not_elided() {
        let bin = parse_ipv6("1:0:2:3:4:5:6:7").unwrap();
        assert_eq!(format_ipv6(&bin), "1:0:2:3:4:5:6:7");
    }

    #[test]
    fn trailing_run() {
        let bin = parse_ipv6("fe80::").unwrap();
        assert_eq!(format_ipv6(&bin), "fe80::");
    }

    proptest! {
        #[test]
        fn parses_std_rendering(octets in any::<[u8; 16]>()) {
            let text = Ipv6Addr::from(octets).to_string();
            prop_assert_eq!(parse_ipv6(&text), Some(octets));
        }

        #[test]
        fn rendering_parses_back(octets in any::<[u8; 16]>()) {
            let text = format_ipv6(&octets);
            prop_assert_eq!(text.parse::<Ipv6Addr>().map(|a| a.octets()).ok(), Some(octets));
            prop_assert_eq!(parse_ipv6(&text), Some(octets));
        }
    }
}
