//! Incremental updates.
//!
//! An update is appended after the unchanged original bytes: the changed and
//! new objects, a cross-reference section listing only those objects, and a
//! trailer chained to the previous section through `/Prev`. The section is a
//! classic table or an uncompressed cross-reference stream, whichever format
//! the document's newest section already uses.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::ObjectSerializer;
use crate::xref::XRefKind;
use std::collections::BTreeMap;

/// Objects to append to a document, plus the trailer data they chain to.
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    base_len: u64,
    needs_leading_eol: bool,
    prev_startxref: u64,
    kind: XRefKind,
    root: ObjectRef,
    info: Option<Object>,
    first_id: Option<Vec<u8>>,
    next_id: u32,
    objects: BTreeMap<u32, (u16, Object)>,
}

/// Serialized update section.
#[derive(Debug, Clone)]
pub struct RenderedUpdate {
    /// Bytes to append directly after the original document
    pub bytes: Vec<u8>,
    /// Absolute file offset of every written object, keyed by object number
    pub offsets: BTreeMap<u32, u64>,
    /// Absolute offset of the new cross-reference section
    pub startxref: u64,
}

impl RenderedUpdate {
    /// Position of an object's bytes inside [`RenderedUpdate::bytes`].
    pub fn local_offset(&self, base_len: u64, id: u32) -> Option<usize> {
        self.offsets
            .get(&id)
            .and_then(|abs| abs.checked_sub(base_len))
            .and_then(|rel| usize::try_from(rel).ok())
    }
}

impl IncrementalUpdate {
    /// Start an empty update on top of `doc`.
    pub fn new(doc: &PdfDocument) -> Result<Self> {
        let bytes = doc.bytes();
        let first_id = doc
            .trailer()
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|ids| ids.first())
            .and_then(|id| id.as_string())
            .map(<[u8]>::to_vec);

        Ok(Self {
            base_len: bytes.len() as u64,
            needs_leading_eol: !matches!(bytes.last(), Some(b'\n') | Some(b'\r')),
            prev_startxref: doc.xref().startxref(),
            kind: doc.xref().kind(),
            root: doc.catalog_ref()?,
            info: doc.trailer().get("Info").cloned(),
            first_id,
            next_id: doc.size().max(1),
            objects: BTreeMap::new(),
        })
    }

    /// Length of the original document the update is appended to.
    pub fn base_len(&self) -> u64 {
        self.base_len
    }

    /// Cross-reference format the update will be written in.
    pub fn kind(&self) -> XRefKind {
        self.kind
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    /// Add or replace an object in the update.
    pub fn put(&mut self, r: ObjectRef, object: Object) {
        self.objects.insert(r.id, (r.gen, object));
    }

    /// Number of objects queued so far.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when no object has been queued.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize the update section.
    ///
    /// `second_id` becomes the second element of the trailer `/ID`; the first
    /// element is carried over from the original, or set to the same value
    /// when the original has none.
    pub fn render(&self, second_id: &[u8]) -> Result<RenderedUpdate> {
        if self.objects.is_empty() {
            return Err(Error::IllegalState("incremental update without objects"));
        }

        let serializer = ObjectSerializer::new();
        let mut bytes = Vec::new();
        if self.needs_leading_eol {
            bytes.push(b'\n');
        }

        let mut offsets = BTreeMap::new();
        for (&id, (gen, object)) in &self.objects {
            offsets.insert(id, self.base_len + bytes.len() as u64);
            bytes.extend_from_slice(&serializer.serialize_indirect(id, *gen, object));
        }

        let startxref = self.base_len + bytes.len() as u64;
        let mut trailer = self.trailer_entries(second_id);

        match self.kind {
            XRefKind::Table => {
                bytes.extend_from_slice(b"xref\n");
                for run in contiguous_runs(&offsets) {
                    bytes.extend_from_slice(format!("{} {}\n", run[0].0, run.len()).as_bytes());
                    for (id, offset) in run {
                        let gen = self.objects.get(id).map(|(g, _)| *g).unwrap_or(0);
                        bytes.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
                    }
                }
                trailer.insert("Size".to_string(), Object::Integer(self.next_id as i64));
                bytes.extend_from_slice(b"trailer\n");
                bytes.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
                bytes.push(b'\n');
            },
            XRefKind::Stream => {
                let xref_id = self.next_id;
                let mut entries = offsets.clone();
                entries.insert(xref_id, startxref);

                let offset_width = byte_width(startxref).max(4);
                let mut data = Vec::with_capacity(entries.len() * (offset_width + 3));
                for (id, offset) in &entries {
                    let gen = self.objects.get(id).map(|(g, _)| *g).unwrap_or(0);
                    data.push(1);
                    data.extend_from_slice(&offset.to_be_bytes()[8 - offset_width..]);
                    data.extend_from_slice(&gen.to_be_bytes());
                }

                let index = contiguous_runs(&entries)
                    .into_iter()
                    .flat_map(|run| [Object::Integer(*run[0].0 as i64), Object::Integer(run.len() as i64)])
                    .collect();

                trailer.insert("Type".to_string(), Object::name("XRef"));
                trailer.insert("Size".to_string(), Object::Integer(xref_id as i64 + 1));
                trailer.insert(
                    "W".to_string(),
                    Object::Array(vec![Object::Integer(1), Object::Integer(offset_width as i64), Object::Integer(2)]),
                );
                trailer.insert("Index".to_string(), Object::Array(index));

                let stream = Object::Stream {
                    dict: trailer,
                    data: bytes::Bytes::from(data),
                };
                bytes.extend_from_slice(&serializer.serialize_indirect(xref_id, 0, &stream));
            },
        }

        bytes.extend_from_slice(format!("startxref\n{}\n%%EOF\n", startxref).as_bytes());

        log::debug!(
            "Rendered incremental update: {} objects, {:?} at {}, {} bytes",
            self.objects.len(),
            self.kind,
            startxref,
            bytes.len()
        );

        Ok(RenderedUpdate {
            bytes,
            offsets,
            startxref,
        })
    }

    fn trailer_entries(&self, second_id: &[u8]) -> Dictionary {
        let mut trailer = Dictionary::new();
        trailer.insert("Prev".to_string(), Object::Integer(self.prev_startxref as i64));
        trailer.insert("Root".to_string(), Object::Reference(self.root));
        if let Some(info) = &self.info {
            trailer.insert("Info".to_string(), info.clone());
        }
        let first = self.first_id.clone().unwrap_or_else(|| second_id.to_vec());
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(first), Object::String(second_id.to_vec())]),
        );
        trailer
    }
}

/// Group sorted (id, offset) pairs into runs of consecutive object numbers.
fn contiguous_runs(offsets: &BTreeMap<u32, u64>) -> Vec<Vec<(&u32, &u64)>> {
    let mut runs: Vec<Vec<(&u32, &u64)>> = Vec::new();
    for entry in offsets {
        match runs.last_mut() {
            Some(run) if run.last().is_some_and(|(id, _)| **id + 1 == *entry.0) => run.push(entry),
            _ => runs.push(vec![entry]),
        }
    }
    runs
}

/// Number of bytes needed to store `value` big-endian.
fn byte_width(value: u64) -> usize {
    (8 - value.leading_zeros() as usize / 8).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::{read_xref, XRefEntry};

    fn base_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let obj1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /ID [<AABB> <AABB>] >>\nstartxref\n{}\n%%EOF",
                obj1, obj2, xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_classic_update_chains_to_original() {
        let original = base_pdf();
        let mut doc = PdfDocument::from_bytes(original.clone()).unwrap();
        let mut update = IncrementalUpdate::new(&doc).unwrap();

        let new_ref = update.allocate();
        assert_eq!(new_ref, ObjectRef::new(3, 0));
        update.put(new_ref, Object::Dictionary(Dictionary::new()));
        update.put(ObjectRef::new(1, 0), Object::Dictionary(doc.catalog().unwrap()));

        let rendered = update.render(&[0x11; 16]).unwrap();
        // original lacks a trailing EOL
        assert_eq!(rendered.bytes[0], b'\n');

        let mut full = original.clone();
        full.extend_from_slice(&rendered.bytes);
        let table = read_xref(&full).unwrap();

        assert_eq!(table.startxref(), rendered.startxref);
        assert_eq!(table.size(), 4);
        assert!(matches!(table.get(3), Some(XRefEntry::InUse { offset, .. }) if *offset == rendered.offsets[&3]));
        assert!(matches!(table.get(2), Some(XRefEntry::InUse { .. })));

        let ids = table.trailer().get("ID").unwrap().as_array().unwrap();
        assert_eq!(ids[0].as_string(), Some(&[0xAA, 0xBB][..]));
        assert_eq!(ids[1].as_string(), Some(&[0x11; 16][..]));
        assert!(full.starts_with(&original));
    }

    #[test]
    fn test_stream_update_is_readable() {
        let original = base_pdf();
        let doc = PdfDocument::from_bytes(original.clone()).unwrap();
        let mut update = IncrementalUpdate::new(&doc).unwrap();
        update.kind = XRefKind::Stream;

        let new_ref = update.allocate();
        update.put(new_ref, Object::Integer(7));
        let rendered = update.render(&[0x22; 16]).unwrap();

        let mut full = original;
        full.extend_from_slice(&rendered.bytes);
        let table = read_xref(&full).unwrap();

        assert_eq!(table.kind(), XRefKind::Stream);
        assert!(matches!(table.get(3), Some(XRefEntry::InUse { offset, .. }) if *offset == rendered.offsets[&3]));
        assert!(matches!(table.get(4), Some(XRefEntry::InUse { offset, .. }) if *offset == rendered.startxref));
        assert!(matches!(table.get(1), Some(XRefEntry::InUse { .. })));
    }

    #[test]
    fn test_empty_update_is_rejected() {
        let doc = PdfDocument::from_bytes(base_pdf()).unwrap();
        let update = IncrementalUpdate::new(&doc).unwrap();
        assert!(matches!(update.render(&[0; 16]), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_contiguous_runs() {
        let offsets: BTreeMap<u32, u64> = [(3, 10), (4, 20), (9, 30)].into_iter().collect();
        let runs = contiguous_runs(&offsets);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].len(), 2);
        assert_eq!(*runs[1][0].0, 9);
    }

    #[test]
    fn test_byte_width() {
        assert_eq!(byte_width(0), 1);
        assert_eq!(byte_width(255), 1);
        assert_eq!(byte_width(256), 2);
        assert_eq!(byte_width(1 << 32), 5);
    }
}
