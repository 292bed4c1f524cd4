//! Signature value types.
//!
//! Describes what goes into the signature dictionary, how the document is
//! locked by a certifying signature, and the digest handed to the signing
//! service.

use crate::error::Result;
use crate::object::{Dictionary, Object};
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, Local};
use sha2::{Digest, Sha256};

/// Default number of hex digits reserved for the signature container.
pub const DEFAULT_SIGNATURE_CAPACITY: usize = 65536;

/// Digest algorithm used over the signed byte ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// SHA-256
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    /// PDF name used in `/DigestMethod`.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA256",
        }
    }

    /// XML encryption algorithm URI, as used in `dsig.DigestMethod`.
    pub fn xmlenc_uri(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
        }
    }

    /// Hash the concatenation of `parts` without copying them together.
    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            },
        }
    }
}

/// DocMDP permission level of a certifying signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MdpPerm {
    /// No changes to the document are permitted
    #[default]
    NoChanges = 1,
    /// Form filling and signing are permitted
    FillForms = 2,
    /// Form filling, signing and annotations are permitted
    Annotate = 3,
}

impl MdpPerm {
    /// Value of `/P` in the transform parameters.
    pub fn value(&self) -> i64 {
        *self as i64
    }
}

/// Modification-detection setup of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigMdpSetup {
    /// Digest over the byte ranges
    pub md_algorithm: DigestAlgorithm,
    /// Whether the signature certifies the document (DocMDP)
    pub certify: bool,
    /// Permissions granted after certification
    pub docmdp_perms: MdpPerm,
}

impl Default for SigMdpSetup {
    fn default() -> Self {
        Self::certify_no_changes()
    }
}

impl SigMdpSetup {
    /// SHA-256 certifying signature that forbids any further change.
    pub fn certify_no_changes() -> Self {
        Self {
            md_algorithm: DigestAlgorithm::Sha256,
            certify: true,
            docmdp_perms: MdpPerm::NoChanges,
        }
    }

    /// `/Reference` entry of the signature dictionary, or `None` when the
    /// signature does not certify.
    pub fn signature_reference(&self) -> Option<Object> {
        if !self.certify {
            return None;
        }

        let mut params = Dictionary::new();
        params.insert("Type".to_string(), Object::name("TransformParams"));
        params.insert("P".to_string(), Object::Integer(self.docmdp_perms.value()));
        params.insert("V".to_string(), Object::name("1.2"));

        let mut sig_ref = Dictionary::new();
        sig_ref.insert("Type".to_string(), Object::name("SigRef"));
        sig_ref.insert("TransformMethod".to_string(), Object::name("DocMDP"));
        sig_ref.insert("TransformParams".to_string(), Object::Dictionary(params));
        sig_ref.insert("DigestMethod".to_string(), Object::name(self.md_algorithm.pdf_name()));

        Some(Object::Array(vec![Object::Dictionary(sig_ref)]))
    }
}

/// Content of the signature dictionary apart from `/ByteRange` and `/Contents`.
#[derive(Debug, Clone)]
pub struct SignatureObject {
    /// Signing time written to `/M`
    pub timestamp: DateTime<FixedOffset>,
    /// Hex digits reserved for the signature container
    pub bytes_reserved: usize,
    /// `/Name`
    pub name: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
}

impl SignatureObject {
    /// Placeholder signed now, reserving `bytes_reserved` hex digits.
    pub fn new(bytes_reserved: usize) -> Self {
        Self {
            timestamp: Local::now().fixed_offset(),
            bytes_reserved,
            name: None,
            reason: None,
            location: None,
            contact_info: None,
        }
    }

    /// Override the signing time.
    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the signer name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the reason for signing.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the contact information.
    pub fn with_contact_info(mut self, contact_info: impl Into<String>) -> Self {
        self.contact_info = Some(contact_info.into());
        self
    }

    /// Dictionary entries written alongside the placeholder.
    pub(crate) fn dictionary_entries(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("Filter".to_string(), Object::name("Adobe.PPKLite"));
        dict.insert("SubFilter".to_string(), Object::name("adbe.pkcs7.detached"));
        dict.insert("M".to_string(), Object::String(format_pdf_date(&self.timestamp).into_bytes()));

        let optional = [
            ("Name", &self.name),
            ("Reason", &self.reason),
            ("Location", &self.location),
            ("ContactInfo", &self.contact_info),
        ];
        for (key, value) in optional {
            if let Some(text) = value {
                dict.insert(key.to_string(), Object::text_string(text));
            }
        }
        dict
    }
}

/// Format a timestamp as a PDF date string: `D:YYYYMMDDHHmmSS+HH'mm'`.
pub fn format_pdf_date(timestamp: &DateTime<FixedOffset>) -> String {
    let offset_minutes = timestamp.offset().local_minus_utc() / 60;
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let offset_minutes = offset_minutes.abs();
    format!(
        "D:{}{}{:02}'{:02}'",
        timestamp.format("%Y%m%d%H%M%S"),
        sign,
        offset_minutes / 60,
        offset_minutes % 60
    )
}

/// Digest of the to-be-signed byte ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDigest {
    /// Algorithm the digest was computed with
    pub algorithm: DigestAlgorithm,
    /// Raw digest bytes
    pub digest: Vec<u8>,
    /// `[0, a, b, c]` as written into the document
    pub byte_range: [u64; 4],
}

impl DocumentDigest {
    /// Standard base64 encoding of the digest.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.digest)
    }

    /// Decode a base64 digest string as produced by [`DocumentDigest::to_base64`].
    pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }
}
