//! PDF text strings (ISO 32000-1:2008, Section 7.9.2.2).
//!
//! A text string is either UTF-16BE introduced by the byte order mark
//! `FE FF`, or a single-byte string in PDFDocEncoding. Writing prefers
//! PDFDocEncoding and falls back to UTF-16BE when a character has no code.

/// UTF-16BE byte order mark.
const UTF16_BOM: [u8; 2] = [0xFE, 0xFF];

/// PDFDocEncoding codes that differ from ISO Latin-1 (Appendix D.2, Table D.2).
const PDFDOC_SPECIAL: [(u8, char); 39] = [
    (0x18, '\u{02D8}'), // breve
    (0x19, '\u{02C7}'), // caron
    (0x1A, '\u{02C6}'), // circumflex
    (0x1B, '\u{02D9}'), // dotaccent
    (0x1C, '\u{02DD}'), // hungarumlaut
    (0x1D, '\u{02DB}'), // ogonek
    (0x1E, '\u{02DA}'), // ring
    (0x1F, '\u{02DC}'), // tilde
    (0x80, '\u{2022}'), // bullet
    (0x81, '\u{2020}'), // dagger
    (0x82, '\u{2021}'), // daggerdbl
    (0x83, '\u{2026}'), // ellipsis
    (0x84, '\u{2014}'), // emdash
    (0x85, '\u{2013}'), // endash
    (0x86, '\u{0192}'), // florin
    (0x87, '\u{2044}'), // fraction
    (0x88, '\u{2039}'), // guilsinglleft
    (0x89, '\u{203A}'), // guilsinglright
    (0x8A, '\u{2212}'), // minus
    (0x8B, '\u{2030}'), // perthousand
    (0x8C, '\u{201E}'), // quotedblbase
    (0x8D, '\u{201C}'), // quotedblleft
    (0x8E, '\u{201D}'), // quotedblright
    (0x8F, '\u{2018}'), // quoteleft
    (0x90, '\u{2019}'), // quoteright
    (0x91, '\u{201A}'), // quotesinglbase
    (0x92, '\u{2122}'), // trademark
    (0x93, '\u{FB01}'), // fi
    (0x94, '\u{FB02}'), // fl
    (0x95, '\u{0141}'), // Lslash
    (0x96, '\u{0152}'), // OE
    (0x97, '\u{0160}'), // Scaron
    (0x98, '\u{0178}'), // Ydieresis
    (0x99, '\u{017D}'), // Zcaron
    (0x9A, '\u{0131}'), // dotlessi
    (0x9B, '\u{0142}'), // lslash
    (0x9C, '\u{0153}'), // oe
    (0x9D, '\u{0161}'), // scaron
    (0x9E, '\u{017E}'), // zcaron
];

/// Map one PDFDocEncoding byte to its character.
pub fn pdfdoc_decode_byte(code: u8) -> Option<char> {
    if let Some((_, c)) = PDFDOC_SPECIAL.iter().find(|(b, _)| *b == code) {
        return Some(*c);
    }
    match code {
        0x7F | 0x9F | 0xAD => None,
        0x00..=0x17 | 0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => None,
    }
}

/// Map one character to its PDFDocEncoding byte, if it has one.
pub fn pdfdoc_encode_char(c: char) -> Option<u8> {
    if let Some((b, _)) = PDFDOC_SPECIAL.iter().find(|(_, ch)| *ch == c) {
        return Some(*b);
    }
    let code = u32::from(c);
    match code {
        0x09 | 0x0A | 0x0D | 0x20..=0x7E | 0xA0..=0xAC | 0xAE..=0xFF => Some(code as u8),
        _ => None,
    }
}

/// Decode a text string.
///
/// Returns `None` for malformed UTF-16 (odd length or unpaired surrogates).
/// Undefined PDFDocEncoding codes are skipped.
pub fn decode_text_string(bytes: &[u8]) -> Option<String> {
    match bytes.strip_prefix(&UTF16_BOM) {
        Some(utf16) => {
            if utf16.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = utf16.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            String::from_utf16(&units).ok()
        },
        None => Some(bytes.iter().filter_map(|&b| pdfdoc_decode_byte(b)).collect()),
    }
}

/// Encode `text` as PDFDocEncoding when possible, UTF-16BE otherwise.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    let single_byte: Option<Vec<u8>> = text.chars().map(pdfdoc_encode_char).collect();
    match single_byte {
        Some(bytes) => bytes,
        None => encode_utf16_be(text),
    }
}

/// UTF-16BE with byte order mark.
fn encode_utf16_be(text: &str) -> Vec<u8> {
    let mut result = UTF16_BOM.to_vec();
    for unit in text.encode_utf16() {
        result.extend_from_slice(&unit.to_be_bytes());
    }
    result
}
