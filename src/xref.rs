//! Cross-reference reader.
//!
//! Locates `startxref`, then reads the newest section and every older one
//! reachable through `/Prev` (and `/XRefStm` in hybrid files). Both classic
//! tables and cross-reference streams are supported. Newer sections win when
//! the same object number appears more than once.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use std::collections::{BTreeMap, HashSet};

/// Bound on the number of chained sections, guards against `/Prev` loops.
const MAX_SECTIONS: usize = 100;

/// Trailer keys inherited from older sections when a newer one omits them.
const INHERITED_TRAILER_KEYS: &[&str] = &["Root", "Info", "ID", "Encrypt"];

/// Location of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free list entry.
    Free {
        /// Next free object number
        next: u32,
        /// Generation to use if the number is reused
        generation: u16,
    },
    /// Object stored directly in the file.
    InUse {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream (PDF 1.5+).
    Compressed {
        /// Object number of the containing `/Type /ObjStm` stream
        stream_id: u32,
        /// Index of the object within that stream
        index: u32,
    },
}

/// Format of a cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// `xref` keyword, fixed-width text entries, `trailer` dictionary
    Table,
    /// `/Type /XRef` stream whose dictionary doubles as the trailer
    Stream,
}

/// Merged view over all cross-reference sections of a file.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
    kind: XRefKind,
    startxref: u64,
}

impl CrossRefTable {
    fn section(kind: XRefKind, startxref: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            trailer: Dictionary::new(),
            kind,
            startxref,
        }
    }

    /// Entry for an object number, if any section lists it.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Iterate over all known entries in object-number order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    /// Trailer of the newest section, completed from older sections.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Format of the newest section.
    pub fn kind(&self) -> XRefKind {
        self.kind
    }

    /// Offset of the newest section, i.e. the value after `startxref`.
    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// Number of listed objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no section listed any object.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `/Size` of the merged file: one past the highest object number in use.
    pub fn size(&self) -> u32 {
        let declared = self
            .trailer
            .get("Size")
            .and_then(|o| o.as_integer())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        let highest = self.entries.keys().next_back().map(|id| id + 1).unwrap_or(0);
        declared.max(highest)
    }

    /// Fold an older section into this one; existing entries win.
    fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        for key in INHERITED_TRAILER_KEYS {
            if !self.trailer.contains_key(*key) {
                if let Some(value) = older.trailer.get(*key) {
                    self.trailer.insert(key.to_string(), value.clone());
                }
            }
        }
        let older_size = older.trailer.get("Size").and_then(|o| o.as_integer()).unwrap_or(0);
        let own_size = self.trailer.get("Size").and_then(|o| o.as_integer()).unwrap_or(0);
        if older_size > own_size {
            self.trailer.insert("Size".to_string(), Object::Integer(older_size));
        }
    }
}

/// Find the offset after the last `startxref` keyword in the final 2 KiB.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(2048);
    let tail = &data[tail_start..];

    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = tail[pos + keyword.len()..]
        .iter()
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();

    digits.parse::<u64>().map_err(|_| Error::InvalidXref)
}

/// Read the whole cross-reference chain of an in-memory PDF.
pub fn read_xref(data: &[u8]) -> Result<CrossRefTable> {
    let startxref = find_xref_offset(data)?;
    let mut merged = parse_section(data, startxref)?;
    log::debug!("Newest xref section at {} is a {:?}", startxref, merged.kind);

    let mut visited: HashSet<u64> = HashSet::from([startxref]);
    let mut pending = chained_offsets(&merged);

    while let Some(offset) = pending.pop() {
        if !visited.insert(offset) {
            log::warn!("xref section at {} already read, skipping loop", offset);
            continue;
        }
        if visited.len() > MAX_SECTIONS {
            return Err(Error::InvalidPdf(format!("more than {} xref sections", MAX_SECTIONS)));
        }

        let older = parse_section(data, offset)?;
        // /Prev must be followed after /XRefStm, so push it first
        let mut next = chained_offsets(&older);
        merged.merge_older(older);
        pending.append(&mut next);
    }

    Ok(merged)
}

/// Offsets of sections referenced by a section's trailer, lowest priority first.
fn chained_offsets(section: &CrossRefTable) -> Vec<u64> {
    ["Prev", "XRefStm"]
        .iter()
        .filter_map(|key| section.trailer.get(*key))
        .filter_map(|o| o.as_integer())
        .filter_map(|n| u64::try_from(n).ok())
        .collect()
}

fn parse_section(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    let slice = data.get(start..).ok_or(Error::InvalidXref)?;
    let trimmed = slice.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(slice.len());

    if slice[trimmed..].starts_with(b"xref") {
        parse_table_section(data, offset, start + trimmed + 4)
    } else {
        parse_stream_section(data, offset)
    }
}

/// Whitespace-separated words of a classic table, tracked by position.
struct Words<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Words<'a> {
    fn next_word(&mut self) -> Option<&'a [u8]> {
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        let start = self.pos;
        while self.pos < self.data.len() && !self.data[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        (self.pos > start).then(|| &self.data[start..self.pos])
    }

    fn next_number(&mut self) -> Result<u64> {
        self.next_word()
            .and_then(|w| std::str::from_utf8(w).ok())
            .and_then(|w| w.parse().ok())
            .ok_or(Error::InvalidXref)
    }
}

fn parse_table_section(data: &[u8], offset: u64, body: usize) -> Result<CrossRefTable> {
    let mut section = CrossRefTable::section(XRefKind::Table, offset);
    let mut words = Words { data, pos: body };

    loop {
        let before = words.pos;
        let word = words.next_word().ok_or(Error::InvalidXref)?;
        if word.starts_with(b"trailer") {
            // the dictionary may follow the keyword without whitespace
            words.pos = words.pos - word.len() + b"trailer".len();
            break;
        }
        words.pos = before;

        let first = words.next_number()?;
        let count = words.next_number()?;
        for i in 0..count {
            let field1 = words.next_number()?;
            let field2 = words.next_number()?;
            let marker = words.next_word().ok_or(Error::InvalidXref)?;
            let id = u32::try_from(first + i).map_err(|_| Error::InvalidXref)?;
            let generation = u16::try_from(field2).unwrap_or(u16::MAX);

            let entry = match marker {
                b"n" => XRefEntry::InUse {
                    offset: field1,
                    generation,
                },
                b"f" => XRefEntry::Free {
                    next: u32::try_from(field1).unwrap_or(0),
                    generation,
                },
                _ => return Err(Error::InvalidXref),
            };
            section.entries.insert(id, entry);
        }
    }

    let (_, trailer) = parse_object(&data[words.pos..]).map_err(|_| Error::ParseError {
        offset: words.pos,
        reason: "unreadable trailer dictionary".to_string(),
    })?;
    section.trailer = trailer.into_dict()?;

    Ok(section)
}

fn parse_stream_section(data: &[u8], offset: u64) -> Result<CrossRefTable> {
    let start = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
    let (_, object) = parse_indirect_object_at(data, start)?;
    let decoded = object.decode_stream_data()?;
    let dict = match object {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if dict.get("Type").and_then(|o| o.as_name()) != Some("XRef") {
        return Err(Error::InvalidPdf(format!("object at {} is not an xref stream", offset)));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| o.as_integer())
                .filter_map(|n| usize::try_from(n).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|w| *w > 8) {
        return Err(Error::InvalidPdf("invalid /W in xref stream".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("missing /Size in xref stream".to_string()))?;
    let ranges: Vec<(i64, i64)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()?, pair[1].as_integer()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let mut section = CrossRefTable::section(XRefKind::Stream, offset);
    let row_len: usize = widths.iter().sum();
    let mut rows = decoded.chunks_exact(row_len.max(1));

    for (first, count) in ranges {
        for id in first..first + count {
            let row = rows
                .next()
                .ok_or_else(|| Error::InvalidPdf("truncated xref stream data".to_string()))?;
            let (type_field, rest) = row.split_at(widths[0]);
            let (field2, field3) = rest.split_at(widths[1]);

            // a zero-width type field defaults to 1
            let entry_type = if widths[0] == 0 { 1 } else { read_int(type_field) };
            let (field2, field3) = (read_int(field2), read_int(field3));

            let entry = match entry_type {
                0 => XRefEntry::Free {
                    next: field2 as u32,
                    generation: field3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: field2 as u32,
                    index: field3 as u32,
                },
                // unknown types are references to the null object
                _ => continue,
            };
            let id = u32::try_from(id).map_err(|_| Error::InvalidXref)?;
            section.entries.insert(id, entry);
        }
    }

    section.trailer = dict;
    Ok(section)
}

/// Big-endian unsigned integer of up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
