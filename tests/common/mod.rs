//! Shared fixtures for integration tests.

#![allow(dead_code)]

use base64::Engine as _;
use pdf_ais::ais::Transport;
use serde_json::{json, Value};
use std::cell::RefCell;

const CATALOG: &str = "<< /Type /Catalog /Pages 2 0 R >>";
const PAGES: &str = "<< /Type /Pages /Kids [3 0 R] /Count 1 >>";
const PAGE: &str = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 4 0 R >>";
const CONTENT: &str = "<< /Length 43 >>\nstream\nBT /F1 12 Tf 72 770 Td (Hello, world) Tj ET\nendstream";

/// Builds a classic-xref PDF from object bodies numbered from 1.
pub fn build_pdf(objects: &[&str]) -> Vec<u8> {
    let mut pdf = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// One page, no form.
pub fn simple_pdf() -> Vec<u8> {
    build_pdf(&[CATALOG, PAGES, PAGE, CONTENT])
}

/// One page with an unsigned signature field `Approval` in an indirect AcroForm.
pub fn pdf_with_empty_field() -> Vec<u8> {
    build_pdf(&[
        "<< /Type /Catalog /Pages 2 0 R /AcroForm 5 0 R >>",
        PAGES,
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] /Contents 4 0 R /Annots [6 0 R] >>",
        CONTENT,
        "<< /Fields [6 0 R] >>",
        "<< /Type /Annot /Subtype /Widget /FT /Sig /T (Approval) /Rect [50 50 250 100] /P 3 0 R >>",
    ])
}

/// Same page tree as [`simple_pdf`], indexed by an uncompressed xref stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let mut pdf = b"%PDF-1.5\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in [CATALOG, PAGES, PAGE, CONTENT].iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref = pdf.len();
    offsets.push(xref);

    let mut rows = vec![0u8, 0, 0, 0, 0, 0xFF, 0xFF];
    for offset in offsets {
        rows.push(1);
        rows.extend_from_slice(&(offset as u32).to_be_bytes());
        rows.extend_from_slice(&[0, 0]);
    }

    pdf.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Root 1 0 R /Length {} >>\nstream\n",
            rows.len()
        )
        .as_bytes(),
    );
    pdf.extend_from_slice(&rows);
    pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref).as_bytes());
    pdf
}

/// A stand-in CMS container of `len` bytes.
pub fn fake_signature(len: usize) -> Vec<u8> {
    let mut sig = vec![0x30, 0x82];
    sig.extend((0..len.saturating_sub(2)).map(|i| (i % 251) as u8 + 1));
    sig.truncate(len);
    sig
}

pub fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

pub fn success_single(signature: &[u8]) -> Value {
    json!({
        "SignResponse": {
            "@RequestID": "ignored",
            "@Profile": "http://ais.swisscom.ch/1.0",
            "Result": { "ResultMajor": "urn:oasis:names:tc:dss:1.0:resultmajor:Success" },
            "SignatureObject": {
                "Base64Signature": { "@Type": "urn:ietf:rfc:3369", "$": b64(signature) }
            }
        }
    })
}

/// Batch response listing `(document index, signature)` in the given order.
pub fn success_batch(entries: &[(usize, Vec<u8>)]) -> Value {
    let objects: Vec<Value> = entries
        .iter()
        .map(|(index, sig)| {
            json!({
                "@WhichDocument": index.to_string(),
                "Base64Signature": { "@Type": "urn:ietf:rfc:3369", "$": b64(sig) }
            })
        })
        .collect();
    json!({
        "SignResponse": {
            "Result": { "ResultMajor": "urn:oasis:names:tc:dss:1.0:resultmajor:Success" },
            "SignatureObject": {
                "Other": { "sc.SignatureObjects": { "sc.ExtendedSignatureObject": objects } }
            }
        }
    })
}

pub fn error_response(major: &str, minor: &str) -> Value {
    json!({
        "SignResponse": {
            "Result": {
                "ResultMajor": major,
                "ResultMinor": minor,
                "ResultMessage": { "@xml.lang": "en", "$": "rejected" }
            }
        }
    })
}

/// Records every request and answers with a canned response.
pub struct MockTransport {
    pub requests: RefCell<Vec<Value>>,
    response: Value,
}

impl MockTransport {
    pub fn new(response: Value) -> Self {
        Self {
            requests: RefCell::new(Vec::new()),
            response,
        }
    }

    pub fn last_request(&self) -> Value {
        self.requests.borrow().last().cloned().unwrap_or(Value::Null)
    }
}

impl Transport for MockTransport {
    fn post(&self, payload: &str) -> pdf_ais::Result<Value> {
        self.requests.borrow_mut().push(serde_json::from_str(payload)?);
        Ok(self.response.clone())
    }
}
