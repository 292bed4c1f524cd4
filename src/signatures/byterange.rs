//! Byte ranges of a signature placeholder.
//!
//! A signature covers the whole file except the hex string in `/Contents`.
//! `/ByteRange [0 a b c]` names the two covered ranges: `[0, a)` ends right
//! before the `<` of the placeholder and `[b, b + c)` starts right after its
//! `>`. The array is first written with wide dummy values and patched in
//! place once the layout is known, padding with spaces so no offset moves.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::writer::hex_upper;

/// Dummy value written into each `/ByteRange` slot before patching.
const BYTE_RANGE_DUMMY: i64 = 9_999_999_999;

/// Layout of a signature placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRangeCalculator {
    /// Hex digits between `<` and `>`
    hex_digits: usize,
}

impl ByteRangeCalculator {
    /// Placeholder able to hold at least `capacity` hex digits.
    ///
    /// The digit count is rounded up to an even number, since the
    /// placeholder is written as a string of zero bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            hex_digits: capacity.div_ceil(2) * 2,
        }
    }

    /// Hex digits available for the signature.
    pub fn hex_digits(&self) -> usize {
        self.hex_digits
    }

    /// Size of the `/Contents` value including the angle brackets.
    pub fn placeholder_size(&self) -> usize {
        self.hex_digits + 2
    }

    /// `/Contents` value serializing to `<00…00>` of the reserved size.
    pub fn contents_placeholder(&self) -> Object {
        Object::String(vec![0u8; self.hex_digits / 2])
    }

    /// `/ByteRange` value wide enough for any real range of a file below 10 GB.
    pub fn byte_range_placeholder() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(BYTE_RANGE_DUMMY),
            Object::Integer(BYTE_RANGE_DUMMY),
            Object::Integer(BYTE_RANGE_DUMMY),
        ])
    }

    /// Ranges for a file of `file_size` bytes whose placeholder starts at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: u64, contents_offset: u64) -> [u64; 4] {
        let after = contents_offset + self.placeholder_size() as u64;
        [0, contents_offset, after, file_size.saturating_sub(after)]
    }

    /// Format a range as `[0 a b c]`, space-padded to exactly `width` bytes.
    pub fn format_byte_range(byte_range: &[u64; 4], width: usize) -> Result<Vec<u8>> {
        let text = format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3]);
        if text.len() > width {
            return Err(Error::InvalidPdf(format!(
                "ByteRange {} does not fit its {}-byte placeholder",
                text, width
            )));
        }
        let mut bytes = text.into_bytes();
        bytes.resize(width, b' ');
        Ok(bytes)
    }

    /// The two covered slices of a complete file.
    pub fn signed_slices<'a>(data: &'a [u8], byte_range: &[u64; 4]) -> Result<[&'a [u8]; 2]> {
        let slice = |start: u64, len: u64| -> Result<&'a [u8]> {
            let start = usize::try_from(start).map_err(|_| Error::InvalidPdf("ByteRange offset overflow".to_string()))?;
            let len = usize::try_from(len).map_err(|_| Error::InvalidPdf("ByteRange length overflow".to_string()))?;
            data.get(start..start.saturating_add(len)).ok_or_else(|| {
                Error::InvalidPdf(format!("ByteRange {}+{} exceeds file size {}", start, len, data.len()))
            })
        };
        Ok([slice(byte_range[0], byte_range[1])?, slice(byte_range[2], byte_range[3])?])
    }

    /// Concatenation of the covered slices.
    pub fn extract_signed_bytes(data: &[u8], byte_range: &[u64; 4]) -> Result<Vec<u8>> {
        Ok(Self::signed_slices(data, byte_range)?.concat())
    }

    /// A range must start at 0, end at the file end, and leave a gap for the placeholder.
    pub fn validate_byte_range(byte_range: &[u64; 4], file_size: u64) -> Result<()> {
        if byte_range[0] != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", byte_range[0])));
        }
        if byte_range[2] + byte_range[3] != file_size {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                file_size,
                byte_range[2] + byte_range[3]
            )));
        }
        if byte_range[1] >= byte_range[2] {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps second range start ({})",
                byte_range[1], byte_range[2]
            )));
        }
        Ok(())
    }

    /// Offset of the `<` of an untouched placeholder following `/Contents`,
    /// searching from `from`.
    pub fn find_contents_offset(&self, data: &[u8], from: usize) -> Option<usize> {
        let key = b"/Contents";
        let mut pos = from;
        while let Some(found) = find(data, key, pos) {
            let value = skip_spaces(data, found + key.len());
            if self.is_placeholder_at(data, value) {
                return Some(value);
            }
            pos = found + key.len();
        }
        None
    }

    fn is_placeholder_at(&self, data: &[u8], offset: usize) -> bool {
        let Some(region) = data.get(offset..offset + self.placeholder_size()) else {
            return false;
        };
        region[0] == b'<'
            && region[region.len() - 1] == b'>'
            && region[1..region.len() - 1].iter().all(|&c| c == b'0')
    }

    /// Offset and width of the dummy `/ByteRange` array, searching from `from`.
    pub fn find_byte_range_span(data: &[u8], from: usize) -> Option<(usize, usize)> {
        let key = b"/ByteRange";
        let found = find(data, key, from)?;
        let start = skip_spaces(data, found + key.len());
        if data.get(start) != Some(&b'[') {
            return None;
        }
        let end = start + data[start..].iter().position(|&c| c == b']')?;
        Some((start, end + 1 - start))
    }

    /// The complete `/Contents` value for `signature`: uppercase hex,
    /// right-padded with `0` digits, enclosed in angle brackets.
    pub fn signature_value(&self, signature: &[u8]) -> Result<Vec<u8>> {
        let required = signature.len() * 2;
        if required > self.hex_digits {
            return Err(Error::SignatureTooLarge(required));
        }

        let mut value = Vec::with_capacity(self.placeholder_size());
        value.push(b'<');
        value.extend_from_slice(hex_upper(signature).as_bytes());
        value.resize(self.hex_digits + 1, b'0');
        value.push(b'>');
        Ok(value)
    }
}

fn find(data: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn skip_spaces(data: &[u8], mut pos: usize) -> usize {
    while data.get(pos).is_some_and(|c| c.is_ascii_whitespace()) {
        pos += 1;
    }
    pos
}
