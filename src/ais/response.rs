//! Sign response parsing and result classification.

use crate::error::{Error, Result};
use base64::Engine as _;
use phf::phf_map;
use serde::Deserialize;
use serde_json::Value;

/// `ResultMajor` substring that marks a failed request.
const ERROR_MARKER: &str = "Error";

/// Errors with a dedicated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownError {
    AuthenticationFailed,
}

/// `ResultMinor` codes with a dedicated [`Error`] variant. Codes missing here
/// become [`Error::UnknownAisError`].
static RESULT_MINOR_ERRORS: phf::Map<&'static str, KnownError> = phf_map! {
    "http://ais.swisscom.ch/1.0/resultminor/AuthenticationFailed" => KnownError::AuthenticationFailed,
};

impl KnownError {
    fn into_error(self, result: Value) -> Error {
        match self {
            KnownError::AuthenticationFailed => Error::AuthenticationFailed(result),
        }
    }
}

/// Top-level response object.
#[derive(Debug, Clone, Deserialize)]
pub struct SignResponseEnvelope {
    /// The response
    #[serde(rename = "SignResponse")]
    pub sign_response: SignResponse,
}

/// `SignResponse` element.
#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    /// Request id echoed by the service
    #[serde(rename = "@RequestID", default)]
    pub request_id: Option<String>,
    /// Outcome
    #[serde(rename = "Result")]
    pub result: AisResult,
    /// Signatures; absent on error
    #[serde(rename = "SignatureObject", default)]
    pub signature_object: Option<SignatureObject>,
}

/// `Result` element.
#[derive(Debug, Clone, Deserialize)]
pub struct AisResult {
    /// Status class
    #[serde(rename = "ResultMajor")]
    pub result_major: String,
    /// Specific reason
    #[serde(rename = "ResultMinor", default)]
    pub result_minor: Option<String>,
    /// Human readable message
    #[serde(rename = "ResultMessage", default)]
    pub result_message: Option<Value>,
}

impl AisResult {
    /// Whether the service reported success.
    pub fn is_success(&self) -> bool {
        !self.result_major.contains(ERROR_MARKER)
    }
}

/// `SignatureObject` element.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureObject {
    /// Single-document signature
    #[serde(rename = "Base64Signature", default)]
    pub base64_signature: Option<Base64Signature>,
    /// Batch signatures
    #[serde(rename = "Other", default)]
    pub other: Option<OtherSignatures>,
}

/// `Base64Signature` element.
#[derive(Debug, Clone, Deserialize)]
pub struct Base64Signature {
    /// Base64 CMS container
    #[serde(rename = "$")]
    pub value: String,
}

impl Base64Signature {
    /// Decode to DER bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let compact: String = self.value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
    }
}

/// `Other` element of a batch response.
#[derive(Debug, Clone, Deserialize)]
pub struct OtherSignatures {
    /// Container
    #[serde(rename = "sc.SignatureObjects")]
    pub signature_objects: SignatureObjects,
}

/// `sc:SignatureObjects` element.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureObjects {
    /// One entry per signed document
    #[serde(rename = "sc.ExtendedSignatureObject")]
    pub extended: OneOrMany<ExtendedSignatureObject>,
}

/// A JSON value that may be a single object or an array of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// Single object
    One(T),
    /// Array
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// View as a slice.
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// `sc:ExtendedSignatureObject` element.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedSignatureObject {
    /// `@ID` of the request entry this signature belongs to
    #[serde(rename = "@WhichDocument")]
    pub which_document: DocumentIndex,
    /// Signature
    #[serde(rename = "Base64Signature")]
    pub base64_signature: Base64Signature,
}

/// Document index, sent back as a number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DocumentIndex {
    /// JSON number
    Number(u64),
    /// JSON string
    Text(String),
}

impl DocumentIndex {
    /// Numeric value.
    pub fn value(&self) -> Result<usize> {
        let parsed = match self {
            DocumentIndex::Number(n) => usize::try_from(*n).ok(),
            DocumentIndex::Text(s) => s.trim().parse::<usize>().ok(),
        };
        parsed.ok_or_else(|| Error::InvalidResponse(format!("invalid @WhichDocument {:?}", self)))
    }
}

/// Map an error `Result` element to an [`Error`].
///
/// Looks `ResultMinor` up in a static table and falls back to
/// [`Error::UnknownAisError`]. Either way the raw `Result` is carried along.
pub fn classify_error(result: Value) -> Error {
    let known = result
        .get("ResultMinor")
        .and_then(Value::as_str)
        .and_then(|minor| RESULT_MINOR_ERRORS.get(minor))
        .copied();
    match known {
        Some(kind) => kind.into_error(result),
        None => Error::UnknownAisError(result),
    }
}

/// Check the result of a raw response and parse it.
///
/// An error `ResultMajor` is classified with [`classify_error`]; a response
/// without a `SignResponse.Result` is an [`Error::InvalidResponse`].
pub fn parse_response(raw: Value) -> Result<SignResponse> {
    let result = raw
        .get("SignResponse")
        .and_then(|response| response.get("Result"))
        .ok_or_else(|| Error::InvalidResponse("missing SignResponse.Result".to_string()))?;
    let major = result
        .get("ResultMajor")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidResponse("missing ResultMajor".to_string()))?;
    if major.contains(ERROR_MARKER) {
        return Err(classify_error(result.clone()));
    }

    let envelope: SignResponseEnvelope = serde_json::from_value(raw)?;
    Ok(envelope.sign_response)
}

impl SignResponse {
    fn signature_object(&self) -> Result<&SignatureObject> {
        self.signature_object
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("missing SignatureObject".to_string()))
    }

    /// The signature of a single-document response.
    pub fn single_signature(&self) -> Result<Vec<u8>> {
        self.signature_object()?
            .base64_signature
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("missing SignatureObject.Base64Signature".to_string()))?
            .decode()
    }

    /// `(document index, signature)` pairs of a batch response, in response order.
    pub fn batch_signatures(&self) -> Result<Vec<(usize, Vec<u8>)>> {
        let other = self
            .signature_object()?
            .other
            .as_ref()
            .ok_or_else(|| Error::InvalidResponse("missing SignatureObject.Other".to_string()))?;
        other
            .signature_objects
            .extended
            .as_slice()
            .iter()
            .map(|entry| Ok((entry.which_document.value()?, entry.base64_signature.decode()?)))
            .collect()
    }
}
