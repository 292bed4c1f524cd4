//! In-memory PDF reader.
//!
//! Holds the original bytes of a document together with its merged
//! cross-reference table and gives access to the handful of structures an
//! incremental signature touches: the trailer, the catalog, the first page
//! and the interactive form.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object_at;
use crate::xref::{read_xref, CrossRefTable, XRefEntry};
use std::collections::{HashMap, HashSet};

/// Bound on page-tree and field-tree depth.
const MAX_TREE_DEPTH: usize = 64;

/// A form field located by its fully qualified name.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Indirect reference of the terminal field dictionary
    pub reference: ObjectRef,
    /// The field dictionary as stored in the file
    pub dict: Dictionary,
    /// `/FT`, possibly inherited from an ancestor
    pub field_type: Option<String>,
}

/// Where the document's `/AcroForm` dictionary lives.
#[derive(Debug, Clone, PartialEq)]
pub enum AcroFormLocation {
    /// Stored as its own object
    Indirect(ObjectRef, Dictionary),
    /// Stored inline in the catalog
    Inline(Dictionary),
}

impl AcroFormLocation {
    /// The form dictionary regardless of where it is stored.
    pub fn dict(&self) -> &Dictionary {
        match self {
            AcroFormLocation::Indirect(_, dict) | AcroFormLocation::Inline(dict) => dict,
        }
    }
}

/// A parsed PDF held entirely in memory.
pub struct PdfDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    object_cache: HashMap<ObjectRef, Object>,
    object_streams: HashMap<u32, HashMap<u32, Object>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("bytes", &self.data.len())
            .field("xref_entries", &self.xref.len())
            .field("xref_kind", &self.xref.kind())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Parse a complete PDF file.
    ///
    /// Encrypted documents are rejected with [`Error::Unsupported`].
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let xref = read_xref(&data)?;

        if xref.trailer().contains_key("Encrypt") {
            return Err(Error::Unsupported("signing encrypted documents".to_string()));
        }
        if !xref.trailer().contains_key("Root") {
            return Err(Error::InvalidPdf("trailer has no /Root".to_string()));
        }

        log::debug!(
            "Loaded PDF {}.{}: {} bytes, {} xref entries",
            version.0,
            version.1,
            data.len(),
            xref.len()
        );

        Ok(Self {
            data,
            version,
            xref,
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
        })
    }

    /// Header version (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The original file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Merged cross-reference information.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// First free object number for an incremental update.
    pub fn size(&self) -> u32 {
        self.xref.size()
    }

    /// Load an indirect object.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }

        let object = match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::InUse { offset, generation }) => {
                if generation != obj_ref.gen {
                    log::warn!("Reference {} points at generation {}", obj_ref, generation);
                }
                let offset = usize::try_from(offset).map_err(|_| Error::InvalidXref)?;
                let (found, object) = parse_indirect_object_at(&self.data, offset)?;
                if found.id != obj_ref.id {
                    return Err(Error::ParseError {
                        offset,
                        reason: format!("expected object {}, found {}", obj_ref, found),
                    });
                }
                object
            },
            Some(XRefEntry::Compressed { stream_id, .. }) => self.load_compressed(obj_ref, stream_id)?,
            Some(XRefEntry::Free { .. }) | None => return Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        };

        self.object_cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    fn load_compressed(&mut self, obj_ref: ObjectRef, stream_id: u32) -> Result<Object> {
        if !self.object_streams.contains_key(&stream_id) {
            let stream = self.load_object(ObjectRef::new(stream_id, 0))?;
            let objects = parse_object_stream(&stream)?;
            log::debug!("Object stream {} holds {} objects", stream_id, objects.len());
            self.object_streams.insert(stream_id, objects);
        }

        self.object_streams
            .get(&stream_id)
            .and_then(|objects| objects.get(&obj_ref.id))
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&mut self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        let mut seen = HashSet::new();
        while let Object::Reference(r) = current {
            if !seen.insert(r) {
                return Err(Error::CircularReference(r));
            }
            current = self.load_object(r)?;
        }
        Ok(current)
    }

    /// Resolve `object` and require it to be a dictionary.
    pub fn resolve_dict(&mut self, object: &Object) -> Result<Dictionary> {
        self.resolve(object)?.into_dict()
    }

    /// Reference of the document catalog (`/Root`).
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("/Root is not an indirect reference".to_string()))
    }

    /// The document catalog.
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self.catalog_ref()?;
        self.load_object(root)?.into_dict()
    }

    /// The first leaf of the page tree.
    pub fn first_page(&mut self) -> Result<(ObjectRef, Dictionary)> {
        let catalog = self.catalog()?;
        let mut node_ref = catalog
            .get("Pages")
            .and_then(|o| o.as_reference())
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        for _ in 0..MAX_TREE_DEPTH {
            let node = self.load_object(node_ref)?.into_dict()?;
            let kids = match node.get("Kids") {
                Some(kids) => self.resolve(kids)?,
                None => return Ok((node_ref, node)),
            };
            if node.get("Type").and_then(|o| o.as_name()) == Some("Page") {
                return Ok((node_ref, node));
            }
            node_ref = kids
                .as_array()
                .and_then(|kids| kids.first())
                .and_then(|kid| kid.as_reference())
                .ok_or_else(|| Error::InvalidPdf("document has no pages".to_string()))?;
        }

        Err(Error::InvalidPdf("page tree too deep".to_string()))
    }

    /// The interactive form dictionary, if the document has one.
    pub fn acroform(&mut self) -> Result<Option<AcroFormLocation>> {
        let catalog = self.catalog()?;
        match catalog.get("AcroForm") {
            None => Ok(None),
            Some(Object::Reference(r)) => {
                let dict = self.load_object(*r)?.into_dict()?;
                Ok(Some(AcroFormLocation::Indirect(*r, dict)))
            },
            Some(Object::Dictionary(dict)) => Ok(Some(AcroFormLocation::Inline(dict.clone()))),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Find a terminal form field by fully qualified name (`parent.child`).
    pub fn find_field(&mut self, qualified_name: &str) -> Result<Option<FieldMatch>> {
        let fields = match self.acroform()? {
            Some(form) => match form.dict().get("Fields") {
                Some(fields) => self.resolve(fields)?,
                None => return Ok(None),
            },
            None => return Ok(None),
        };

        // (reference, parent's qualified name, inherited /FT, depth)
        let mut pending: Vec<(ObjectRef, String, Option<String>, usize)> = fields
            .as_array()
            .map(|arr| arr.iter().rev().filter_map(|o| o.as_reference()).map(|r| (r, String::new(), None, 0)).collect())
            .unwrap_or_default();
        let mut visited = HashSet::new();

        while let Some((field_ref, parent_name, inherited_ft, depth)) = pending.pop() {
            if depth > MAX_TREE_DEPTH || !visited.insert(field_ref) {
                continue;
            }
            let dict = self.load_object(field_ref)?.into_dict()?;
            let field_type = dict.get("FT").and_then(|o| o.as_name()).map(str::to_string).or(inherited_ft);

            let partial = dict.get("T").and_then(Object::as_text_string);
            let name = match (&partial, parent_name.is_empty()) {
                (Some(t), true) => t.clone(),
                (Some(t), false) => format!("{}.{}", parent_name, t),
                (None, _) => parent_name.clone(),
            };

            if partial.is_some() && name == qualified_name {
                return Ok(Some(FieldMatch {
                    reference: field_ref,
                    dict,
                    field_type,
                }));
            }

            if let Some(kids) = dict.get("Kids") {
                let kids = self.resolve(kids)?;
                if let Some(kids) = kids.as_array() {
                    for kid in kids.iter().rev().filter_map(|o| o.as_reference()) {
                        pending.push((kid, name.clone(), field_type.clone(), depth + 1));
                    }
                }
            }
        }

        Ok(None)
    }
}

/// Locate `%PDF-x.y` within the first KiB and return the version.
fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window.windows(5).position(|w| w == b"%PDF-").ok_or_else(|| {
        Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
    })?;
    if pos > 0 {
        log::warn!("{} bytes of junk before the PDF header", pos);
    }

    let digit = |i: usize| data.get(pos + i).filter(|c| c.is_ascii_digit()).map(|c| c - b'0');
    match (digit(5), data.get(pos + 6), digit(7)) {
        (Some(major), Some(b'.'), Some(minor)) => Ok((major, minor)),
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        )),
    }
}
