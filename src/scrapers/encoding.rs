//! Text decoding for portal pages and exported files.
//!
//! Municipal sites mix UTF-8, Latin-1 and Windows-1252 freely, often with a
//! wrong or missing charset declaration. Decoding walks a fixed ladder:
//! declared charset, UTF-8, strict Latin-1, CP1252, then permissive ISO-8859-1.

use std::sync::LazyLock;

use regex::Regex;

/// A single-byte or UTF-8 encoding we know how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Latin-1 without the C1 control range, so CP1252 text is not misread.
    Latin1,
    Cp1252,
    /// Every byte maps to a code point. Never fails.
    Iso8859_1,
}

/// Decode order when nothing better is known.
pub const ENCODING_LADDER: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Cp1252,
    TextEncoding::Iso8859_1,
];

/// CP1252 mappings for 0x80..=0x9F. `None` marks undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset=["']?([^"'\s;>]+)"#).expect("valid charset regex")
});

impl TextEncoding {
    /// Map a charset label to an encoding we support.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "latin-1" | "latin1" | "l1" => Some(Self::Latin1),
            "iso-8859-1" | "iso8859-1" | "iso_8859-1" => Some(Self::Iso8859_1),
            "windows-1252" | "cp1252" | "x-cp1252" => Some(Self::Cp1252),
            _ => None,
        }
    }

    /// Strict decode. `None` when the bytes are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Self::Latin1 => {
                if bytes.iter().any(|b| (0x80..=0x9F).contains(b)) {
                    return None;
                }
                Some(bytes.iter().map(|b| *b as char).collect())
            }
            Self::Cp1252 => bytes
                .iter()
                .map(|b| match b {
                    0x80..=0x9F => CP1252_HIGH[(*b - 0x80) as usize],
                    _ => Some(*b as char),
                })
                .collect(),
            Self::Iso8859_1 => Some(bytes.iter().map(|b| *b as char).collect()),
        }
    }
}

/// Charset from a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    let (_, rest) = content_type.split_once("charset=")?;
    let charset = rest.split(';').next()?.trim().trim_matches(['"', '\'']);
    (!charset.is_empty()).then(|| charset.to_string())
}

/// Charset from a `<meta>` declaration in the first 2 KB of the body.
pub fn charset_from_meta(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(2048)];
    let ascii: String = head
        .iter()
        .filter(|b| b.is_ascii())
        .map(|b| *b as char)
        .collect();
    META_CHARSET
        .captures(&ascii)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode with an optional charset hint, then the fallback ladder.
pub fn decode_text(bytes: &[u8], hint: Option<&str>) -> (String, TextEncoding) {
    let hinted = hint.and_then(TextEncoding::from_label);
    for encoding in hinted.into_iter().chain(ENCODING_LADDER) {
        if let Some(text) = encoding.decode(bytes) {
            return (text, encoding);
        }
    }
    // Unreachable in practice: ISO-8859-1 accepts every byte.
    (
        String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Iso8859_1,
    )
}

/// Decode an HTML body using the header charset, then the meta charset.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let hint = content_type
        .and_then(charset_from_content_type)
        .or_else(|| charset_from_meta(bytes));
    decode_text(bytes, hint.as_deref()).0
}
