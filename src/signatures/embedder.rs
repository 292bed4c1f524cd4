//! CMS signature placeholder embedding.
//!
//! [`CmsEmbedder::start`] opens a session for one signature field. The
//! session then runs two steps, each at most once and in order:
//!
//! 1. [`EmbedderSession::reserve_and_digest`] writes the incremental update
//!    with a zero-filled `/Contents` placeholder and returns the digest of
//!    everything outside it;
//! 2. [`EmbedderSession::finalize`] overwrites the placeholder with the
//!    signature container without moving any other byte.

use super::byterange::ByteRangeCalculator;
use super::field::{apply_field, plan_field, FieldPlan, SigFieldSpec};
use super::types::{DocumentDigest, SigMdpSetup, SignatureObject};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::writer::IncrementalUpdate;
use std::io::{Seek, SeekFrom, Write};

/// Where the signed document is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The output already holds the original document from offset 0; the
    /// update is appended after it.
    Append,
    /// The output receives a complete copy starting at its current position.
    Copy,
}

/// Entry point of the placeholder engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmsEmbedder;

impl CmsEmbedder {
    /// Open a signing session for `field` on `doc`.
    ///
    /// Fails when the named field exists but cannot take a signature.
    pub fn start(field: SigFieldSpec, mut doc: PdfDocument) -> Result<EmbedderSession> {
        let plan = plan_field(&mut doc, &field)?;
        Ok(EmbedderSession {
            doc,
            field,
            state: SessionState::Started(plan),
        })
    }
}

#[derive(Debug)]
enum SessionState {
    Started(FieldPlan),
    Reserved(PlaceholderLayout),
    Finalized(PlaceholderLayout),
}

/// Position of the reserved region in the output stream.
#[derive(Debug, Clone, Copy)]
struct PlaceholderLayout {
    calculator: ByteRangeCalculator,
    /// Stream position of the first document byte
    base: u64,
    byte_range: [u64; 4],
}

impl PlaceholderLayout {
    fn contents_position(&self) -> u64 {
        self.base + self.byte_range[1]
    }
}

/// One signature being embedded into one document.
#[derive(Debug)]
pub struct EmbedderSession {
    doc: PdfDocument,
    field: SigFieldSpec,
    state: SessionState,
}

impl EmbedderSession {
    /// Name of the signature field.
    pub fn field_name(&self) -> &str {
        &self.field.name
    }

    /// The original document.
    pub fn document(&self) -> &PdfDocument {
        &self.doc
    }

    /// `/ByteRange` of the written placeholder, once reserved.
    pub fn byte_range(&self) -> Option<[u64; 4]> {
        match &self.state {
            SessionState::Started(_) => None,
            SessionState::Reserved(layout) | SessionState::Finalized(layout) => Some(layout.byte_range),
        }
    }

    /// Write the signed-document skeleton to `output` and digest it.
    pub fn reserve_and_digest<W: Write + Seek + ?Sized>(
        &mut self,
        setup: &SigMdpSetup,
        signature: &SignatureObject,
        output: &mut W,
        placement: Placement,
    ) -> Result<DocumentDigest> {
        let plan = match &self.state {
            SessionState::Started(plan) => plan.clone(),
            _ => return Err(Error::IllegalState("signature placeholder already reserved")),
        };

        let calculator = ByteRangeCalculator::new(signature.bytes_reserved);
        let mut update = IncrementalUpdate::new(&self.doc)?;
        let sig_ref = update.allocate();

        let mut sig_dict = signature.dictionary_entries();
        sig_dict.insert("ByteRange".to_string(), ByteRangeCalculator::byte_range_placeholder());
        sig_dict.insert("Contents".to_string(), calculator.contents_placeholder());
        if let Some(reference) = setup.signature_reference() {
            sig_dict.insert("Reference".to_string(), reference);
        }
        update.put(sig_ref, Object::Dictionary(sig_dict));

        let root = self.doc.catalog_ref()?;
        let mut catalog = self.doc.catalog()?;
        let original_catalog = catalog.clone();
        apply_field(&mut self.doc, plan, &self.field, sig_ref, &mut update, &mut catalog)?;

        if setup.certify {
            let mut perms = match catalog.get("Perms") {
                Some(perms) => self.doc.resolve_dict(perms)?,
                None => Dictionary::new(),
            };
            if perms.contains_key("DocMDP") {
                return Err(Error::InvalidInput("document already carries a certification signature".to_string()));
            }
            perms.insert("DocMDP".to_string(), Object::Reference(sig_ref));
            catalog.insert("Perms".to_string(), Object::Dictionary(perms));
        }
        if catalog != original_catalog {
            update.put(root, Object::Dictionary(catalog));
        }

        let base_len = update.base_len();
        let rendered = update.render(uuid::Uuid::new_v4().as_bytes())?;
        let sig_start = rendered
            .local_offset(base_len, sig_ref.id)
            .ok_or(Error::IllegalState("signature dictionary missing from update"))?;
        let mut bytes = rendered.bytes;

        let (range_start, range_width) = ByteRangeCalculator::find_byte_range_span(&bytes, sig_start)
            .ok_or(Error::IllegalState("ByteRange placeholder not found"))?;
        let contents_start = calculator
            .find_contents_offset(&bytes, sig_start)
            .ok_or(Error::IllegalState("Contents placeholder not found"))?;
        let contents_end = contents_start + calculator.placeholder_size();

        let total_len = base_len + bytes.len() as u64;
        let byte_range = calculator.calculate_byte_range(total_len, base_len + contents_start as u64);
        ByteRangeCalculator::validate_byte_range(&byte_range, total_len)?;
        let patched = ByteRangeCalculator::format_byte_range(&byte_range, range_width)?;
        bytes[range_start..range_start + range_width].copy_from_slice(&patched);

        let digest = setup
            .md_algorithm
            .digest_parts(&[self.doc.bytes(), &bytes[..contents_start], &bytes[contents_end..]]);

        let base = match placement {
            Placement::Append => {
                output.seek(SeekFrom::Start(base_len))?;
                0
            },
            Placement::Copy => {
                let base = output.stream_position()?;
                output.write_all(self.doc.bytes())?;
                base
            },
        };
        output.write_all(&bytes)?;
        output.flush()?;

        log::info!(
            "Reserved {} hex digits for field {:?}; ByteRange {:?}, {} bytes total",
            calculator.hex_digits(),
            self.field.name,
            byte_range,
            total_len
        );

        self.state = SessionState::Reserved(PlaceholderLayout {
            calculator,
            base,
            byte_range,
        });

        Ok(DocumentDigest {
            algorithm: setup.md_algorithm,
            digest,
            byte_range,
        })
    }

    /// Splice the signature container into the reserved region.
    ///
    /// Nothing is written when the signature does not fit.
    pub fn finalize<W: Write + Seek + ?Sized>(&mut self, signature: &[u8], output: &mut W) -> Result<()> {
        let layout = match &self.state {
            SessionState::Reserved(layout) => *layout,
            SessionState::Started(_) => return Err(Error::IllegalState("no signature placeholder reserved")),
            SessionState::Finalized(_) => return Err(Error::IllegalState("signature already embedded")),
        };

        let value = layout.calculator.signature_value(signature)?;
        let end = output.seek(SeekFrom::End(0))?;
        output.seek(SeekFrom::Start(layout.contents_position()))?;
        output.write_all(&value)?;
        output.seek(SeekFrom::Start(end))?;
        output.flush()?;

        log::debug!("Embedded {}-byte signature into field {:?}", signature.len(), self.field.name);
        self.state = SessionState::Finalized(layout);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.7\n".to_vec();
        let bodies = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >>",
        ];
        let mut offsets = Vec::new();
        for (i, body) in bodies.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for offset in offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        pdf.extend_from_slice(format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
        pdf
    }

    fn session() -> EmbedderSession {
        let doc = PdfDocument::from_bytes(sample_pdf()).unwrap();
        CmsEmbedder::start(SigFieldSpec::new("Signature"), doc).unwrap()
    }

    #[test]
    fn test_reserve_digest_finalize_in_copy() {
        let mut session = session();
        let mut out = Cursor::new(Vec::new());
        let digest = session
            .reserve_and_digest(&SigMdpSetup::default(), &SignatureObject::new(64), &mut out, Placement::Copy)
            .unwrap();

        let written = out.get_ref().clone();
        assert!(written.starts_with(&sample_pdf()));
        let recomputed = ByteRangeCalculator::signed_slices(&written, &digest.byte_range).unwrap();
        assert_eq!(digest.digest, digest.algorithm.digest_parts(&recomputed));

        session.finalize(&[0xCA, 0xFE], &mut out).unwrap();
        let signed = out.into_inner();
        assert_eq!(signed.len(), written.len());
        let start = digest.byte_range[1] as usize;
        assert!(signed[start..].starts_with(b"<CAFE0000"));
        assert_eq!(signed[..start], written[..start]);
    }

    #[test]
    fn test_append_placement_and_certification() {
        let mut session = session();
        let mut out = Cursor::new(sample_pdf());
        session
            .reserve_and_digest(&SigMdpSetup::default(), &SignatureObject::new(16), &mut out, Placement::Append)
            .unwrap();

        let written = String::from_utf8_lossy(out.get_ref()).into_owned();
        assert!(written.contains("/Perms << /DocMDP 4 0 R >>"));
        assert!(written.contains("/TransformMethod /DocMDP"));
        assert!(written.contains("/SubFilter /adbe.pkcs7.detached"));
        assert!(written.contains("/SigFlags 3"));
        assert_eq!(written.matches("%%EOF").count(), 2);
    }

    #[test]
    fn test_phases_are_enforced() {
        let mut session = session();
        let mut out = Cursor::new(Vec::new());

        assert!(matches!(session.finalize(&[1], &mut out), Err(Error::IllegalState(_))));

        session
            .reserve_and_digest(&SigMdpSetup::default(), &SignatureObject::new(8), &mut out, Placement::Copy)
            .unwrap();
        let second = session.reserve_and_digest(&SigMdpSetup::default(), &SignatureObject::new(8), &mut out, Placement::Copy);
        assert!(matches!(second, Err(Error::IllegalState(_))));

        assert!(matches!(session.finalize(&[0u8; 5], &mut out), Err(Error::SignatureTooLarge(10))));
        session.finalize(&[0u8; 4], &mut out).unwrap();
        assert!(matches!(session.finalize(&[0u8; 4], &mut out), Err(Error::IllegalState(_))));
    }

    #[test]
    fn test_signed_output_reloads() {
        let mut session = session();
        let mut out = Cursor::new(Vec::new());
        session
            .reserve_and_digest(&SigMdpSetup::default(), &SignatureObject::new(32), &mut out, Placement::Copy)
            .unwrap();
        session.finalize(&[0x30, 0x82], &mut out).unwrap();

        let mut reloaded = PdfDocument::from_bytes(out.into_inner()).unwrap();
        let field = reloaded.find_field("Signature").unwrap().unwrap();
        let sig = reloaded.resolve_dict(field.dict.get("V").unwrap()).unwrap();
        assert_eq!(sig.get("Type").unwrap().as_name(), Some("Sig"));
        assert!(sig.get("Contents").unwrap().as_string().unwrap().starts_with(&[0x30, 0x82]));
        assert_eq!(sig.get("ByteRange").unwrap().as_array().unwrap().len(), 4);
    }
}
