//! Mangling of arbitrary strings into C identifiers.
//!
//! `_X` is the escape marker:
//! - ASCII alphanumerics and `_` are copied as is,
//! - any other byte `b` becomes `_X` followed by two uppercase hex digits,
//! - a literal `_X` in the input becomes `_X_`.
//!
//! Hex digits are never `_`, so an encoded name decodes without ambiguity
//! (see [`decode_identifier`]).
use super::{Error, ErrorKind};

const MARKER: &[u8; 2] = b"_X";

fn hexdigit(v: u8) -> char {
    char::from_digit((v & 0xF) as u32, 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

/// Length in bytes of the identifier [`to_identifier`] produces.
pub fn identifier_len(name: &[u8]) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < name.len() {
        if name[i..].starts_with(MARKER) {
            len += 3;
            i += 2;
        } else if name[i].is_ascii_alphanumeric() || name[i] == b'_' {
            len += 1;
            i += 1;
        } else {
            len += 4;
            i += 1;
        }
    }
    len
}

/// Encodes `name` as a C identifier.
pub fn to_identifier(name: &[u8]) -> Result<String, Error> {
    let len = identifier_len(name);
    let mut id = String::new();
    id.try_reserve_exact(len)
        .map_err(|_| ErrorKind::BufferExhausted(len))?;
    let mut i = 0;
    while i < name.len() {
        let c = name[i];
        if name[i..].starts_with(MARKER) {
            id.push_str("_X_");
            i += 2;
        } else if c.is_ascii_alphanumeric() || c == b'_' {
            id.push(c as char);
            i += 1;
        } else {
            id.push_str("_X");
            id.push(hexdigit(c >> 4));
            id.push(hexdigit(c));
            i += 1;
        }
    }
    debug_assert_eq!(id.len(), len);
    Ok(id)
}

/// Inverse of [`to_identifier`], for tools that want the original name back.
/// Returns `None` on input that no encoding can produce.
pub fn decode_identifier(id: &str) -> Option<Vec<u8>> {
    let b = id.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i..].starts_with(MARKER) {
            match b.get(i + 2) {
                Some(b'_') => {
                    out.extend_from_slice(MARKER);
                    i += 3;
                }
                Some(_) => {
                    let hex = std::str::from_utf8(b.get(i + 2..i + 4)?).ok()?;
                    if !hex.bytes().all(|h| h.is_ascii_digit() || (b'A'..=b'F').contains(&h)) {
                        return None;
                    }
                    out.push(u8::from_str_radix(hex, 16).ok()?);
                    i += 4;
                }
                None => return None,
            }
        } else if b[i].is_ascii_alphanumeric() || b[i] == b'_' {
            out.push(b[i]);
            i += 1;
        } else {
            return None;
        }
    }
    Some(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn enc(s: &str) -> String {
        to_identifier(s.as_bytes()).unwrap()
    }

    #[test]
    fn plain_names_are_kept() {
        assert_eq!(enc("foo"), "foo");
        assert_eq!(enc("init_2"), "init_2");
        assert_eq!(enc(""), "");
    }

    #[test]
    fn escapes() {
        assert_eq!(enc("foo bar"), "foo_X20bar");
        assert_eq!(enc("=="), "_X3D_X3D");
        assert_eq!(enc("a.b"), "a_X2Eb");
        assert_eq!(enc("\u{e9}"), "_XC3_XA9");
    }

    #[test]
    fn marker_is_disambiguated() {
        assert_eq!(enc("_X"), "_X_");
        assert_eq!(enc("_X20"), "_X_20");
        assert_eq!(enc("a_Xb"), "a_X_b");
        // a lone `_` followed by something else is untouched
        assert_eq!(enc("_x"), "_x");
    }

    #[test]
    fn length_pass_matches() {
        for s in ["foo", "foo bar", "_X", "_X_X", "tab\there", "", "\u{1F600}"] {
            assert_eq!(identifier_len(s.as_bytes()), enc(s).len(), "{s:?}");
        }
    }

    #[test]
    fn decode_inverts_encode() {
        for s in ["foo", "foo bar", "_X", "_X_", "_X20", "x==y", "\u{e9}t\u{e9}", "__X__"] {
            assert_eq!(decode_identifier(&enc(s)).as_deref(), Some(s.as_bytes()), "{s:?}");
        }
        assert_eq!(decode_identifier("_X2"), None);
        assert_eq!(decode_identifier("_Xzz"), None);
        assert_eq!(decode_identifier("a b"), None);
    }
}
