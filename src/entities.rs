//! Shared HTML/XML entity table and Unicode escape helpers
//!
//! One resolver serves every markup parser. Entities fall into four
//! categories: ASCII escapes (always decoded), Unicode-space entities
//! (decoded inline as UTF-8), multi-codepoint composed entities (decoded to
//! a precomputed string), and named entities (returned as `(name,
//! codepoint)` so the caller can decide between decoding and preserving the
//! symbolic form for round-trip).

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Resolution result for one entity name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    /// lt, gt, amp, quot, apos — decode inline.
    AsciiEscape(&'static str),
    /// nbsp, ensp, emsp, … — decode inline as multi-byte UTF-8.
    UnicodeSpace(&'static str),
    /// Multi-codepoint composed sequence, decoded as a precomputed string.
    Multi(&'static str),
    /// Every other named entity; callers decide decode vs preserve.
    Named {
        name: &'static str,
        codepoint: u32,
    },
}

const ASCII_ESCAPES: [(&str, &str); 5] = [
    ("lt", "<"),
    ("gt", ">"),
    ("amp", "&"),
    ("quot", "\""),
    ("apos", "'"),
];

const UNICODE_SPACES: [(&str, &str); 5] = [
    ("nbsp", "\u{00a0}"),
    ("ensp", "\u{2002}"),
    ("emsp", "\u{2003}"),
    ("thinsp", "\u{2009}"),
    ("hairsp", "\u{200a}"),
];

const MULTI_ENTITIES: [(&str, &str); 3] = [
    ("ThickSpace", "\u{205f}\u{200a}"),
    ("fjlig", "fj"),
    ("nang", "\u{2220}\u{20d2}"),
];

const NAMED_ENTITIES: [(&str, u32); 78] = [
    ("copy", 0x00a9),
    ("reg", 0x00ae),
    ("trade", 0x2122),
    ("mdash", 0x2014),
    ("ndash", 0x2013),
    ("hellip", 0x2026),
    ("laquo", 0x00ab),
    ("raquo", 0x00bb),
    ("ldquo", 0x201c),
    ("rdquo", 0x201d),
    ("lsquo", 0x2018),
    ("rsquo", 0x2019),
    ("times", 0x00d7),
    ("divide", 0x00f7),
    ("plusmn", 0x00b1),
    ("deg", 0x00b0),
    ("sup1", 0x00b9),
    ("sup2", 0x00b2),
    ("sup3", 0x00b3),
    ("frac12", 0x00bd),
    ("frac14", 0x00bc),
    ("frac34", 0x00be),
    ("micro", 0x00b5),
    ("para", 0x00b6),
    ("sect", 0x00a7),
    ("middot", 0x00b7),
    ("bull", 0x2022),
    ("dagger", 0x2020),
    ("Dagger", 0x2021),
    ("permil", 0x2030),
    ("prime", 0x2032),
    ("Prime", 0x2033),
    ("larr", 0x2190),
    ("uarr", 0x2191),
    ("rarr", 0x2192),
    ("darr", 0x2193),
    ("harr", 0x2194),
    ("infin", 0x221e),
    ("ne", 0x2260),
    ("le", 0x2264),
    ("ge", 0x2265),
    ("minus", 0x2212),
    ("lowast", 0x2217),
    ("radic", 0x221a),
    ("prop", 0x221d),
    ("sum", 0x2211),
    ("prod", 0x220f),
    ("int", 0x222b),
    ("asymp", 0x2248),
    ("equiv", 0x2261),
    ("euro", 0x20ac),
    ("cent", 0x00a2),
    ("pound", 0x00a3),
    ("yen", 0x00a5),
    ("curren", 0x00a4),
    ("iexcl", 0x00a1),
    ("iquest", 0x00bf),
    ("szlig", 0x00df),
    ("not", 0x00ac),
    ("shy", 0x00ad),
    ("macr", 0x00af),
    ("acute", 0x00b4),
    ("cedil", 0x00b8),
    ("alpha", 0x03b1),
    ("beta", 0x03b2),
    ("gamma", 0x03b3),
    ("delta", 0x03b4),
    ("epsilon", 0x03b5),
    ("theta", 0x03b8),
    ("lambda", 0x03bb),
    ("mu", 0x03bc),
    ("pi", 0x03c0),
    ("sigma", 0x03c3),
    ("phi", 0x03c6),
    ("omega", 0x03c9),
    ("Omega", 0x03a9),
    ("Delta", 0x0394),
    ("Sigma", 0x03a3),
];

static ENTITY_TABLE: Lazy<HashMap<&'static str, Entity>> = Lazy::new(|| {
    let mut table = HashMap::new();
    for (name, decoded) in ASCII_ESCAPES {
        table.insert(name, Entity::AsciiEscape(decoded));
    }
    for (name, decoded) in UNICODE_SPACES {
        table.insert(name, Entity::UnicodeSpace(decoded));
    }
    for (name, decoded) in MULTI_ENTITIES {
        table.insert(name, Entity::Multi(decoded));
    }
    for (name, codepoint) in NAMED_ENTITIES {
        table.insert(name, Entity::Named { name, codepoint });
    }
    table
});

/// Resolve an entity by name (without `&` and `;`). Unknown names return
/// `None`; callers preserve those verbatim.
pub fn resolve_entity(name: &str) -> Option<Entity> {
    ENTITY_TABLE.get(name).copied()
}

pub fn is_ascii_escape(name: &str) -> bool {
    matches!(resolve_entity(name), Some(Entity::AsciiEscape(_)))
}

/// Unicode codepoint of a named entity, if any single codepoint applies.
pub fn entity_codepoint(name: &str) -> Option<u32> {
    match resolve_entity(name)? {
        Entity::AsciiEscape(s) | Entity::UnicodeSpace(s) => s.chars().next().map(|c| c as u32),
        Entity::Named { codepoint, .. } => Some(codepoint),
        Entity::Multi(_) => None,
    }
}

/// Reverse lookup: entity name for a codepoint.
pub fn entity_for_codepoint(codepoint: u32) -> Option<&'static str> {
    for (name, decoded) in ASCII_ESCAPES.iter().chain(UNICODE_SPACES.iter()) {
        if decoded.chars().next().map(|c| c as u32) == Some(codepoint) {
            return Some(name);
        }
    }
    NAMED_ENTITIES
        .iter()
        .find(|(_, cp)| *cp == codepoint)
        .map(|(name, _)| *name)
}

/// Append a codepoint as UTF-8 (1-4 bytes). Rejects surrogates and values
/// past U+10FFFF.
pub fn push_codepoint(out: &mut String, codepoint: u32) -> bool {
    if (0xd800..=0xdfff).contains(&codepoint) || codepoint > 0x10ffff {
        return false;
    }
    match char::from_u32(codepoint) {
        Some(c) => {
            out.push(c);
            true
        }
        None => false,
    }
}

/// Combine a UTF-16 surrogate pair into a codepoint.
pub fn decode_surrogate_pair(high: u16, low: u16) -> Option<u32> {
    if !(0xd800..=0xdbff).contains(&high) || !(0xdc00..=0xdfff).contains(&low) {
        return None;
    }
    Some(0x10000 + ((high as u32 - 0xd800) << 10) + (low as u32 - 0xdc00))
}

/// Parse up to `max_digits` hex digits; returns the value and how many
/// digits were consumed.
pub fn parse_hex_codepoint(text: &str, max_digits: usize) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    let mut consumed = 0;
    for b in text.bytes().take(max_digits) {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => break,
        };
        value = value.checked_mul(16)?.checked_add(digit as u32)?;
        consumed += 1;
    }
    if consumed == 0 {
        None
    } else {
        Some((value, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_escapes_decode() {
        assert_eq!(resolve_entity("lt"), Some(Entity::AsciiEscape("<")));
        assert_eq!(resolve_entity("amp"), Some(Entity::AsciiEscape("&")));
        assert!(is_ascii_escape("quot"));
        assert!(!is_ascii_escape("copy"));
    }

    #[test]
    fn named_entities_carry_codepoints() {
        match resolve_entity("copy") {
            Some(Entity::Named { name, codepoint }) => {
                assert_eq!(name, "copy");
                assert_eq!(codepoint, 0x00a9);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(entity_codepoint("mdash"), Some(0x2014));
        assert_eq!(resolve_entity("bogus"), None);
    }

    #[test]
    fn reverse_lookup() {
        assert_eq!(entity_for_codepoint(0x00a9), Some("copy"));
        assert_eq!(entity_for_codepoint(0x3c), Some("lt"));
        assert_eq!(entity_for_codepoint(0x1f600), None);
    }

    #[test]
    fn codepoint_encoding_rejects_surrogates() {
        let mut out = String::new();
        assert!(push_codepoint(&mut out, 0x41));
        assert!(push_codepoint(&mut out, 0x2014));
        assert!(!push_codepoint(&mut out, 0xd800));
        assert!(!push_codepoint(&mut out, 0x110000));
        assert_eq!(out, "A\u{2014}");
    }

    #[test]
    fn surrogate_pairs() {
        assert_eq!(decode_surrogate_pair(0xd83d, 0xde00), Some(0x1f600));
        assert_eq!(decode_surrogate_pair(0xd83d, 0x0041), None);
        assert_eq!(decode_surrogate_pair(0x0041, 0xde00), None);
    }

    #[test]
    fn hex_parsing_is_bounded() {
        assert_eq!(parse_hex_codepoint("1F600;", 6), Some((0x1f600, 5)));
        assert_eq!(parse_hex_codepoint("zz", 4), None);
        assert_eq!(parse_hex_codepoint("ABCDEF12", 4), Some((0xabcd, 4)));
    }
}
