//! Error types for the signing library.
//!
//! One enum covers the PDF layer (parsing, incremental writing), the
//! signature placeholder protocol and the AIS client.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while preparing, requesting or embedding a signature.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// No usable document source was given, or the sources conflict.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The hex-encoded signature does not fit into the reserved placeholder.
    ///
    /// Carries the number of bytes that would have been required, so the
    /// caller can rebuild the document handle with a larger reservation.
    #[error("{0} bytes")]
    SignatureTooLarge(usize),

    /// AIS rejected the claimed identity.
    ///
    /// Returned for `http://ais.swisscom.ch/1.0/resultminor/AuthenticationFailed`.
    #[error("AIS authentication failed: {0}")]
    AuthenticationFailed(serde_json::Value),

    /// AIS reported an error not covered by a more specific variant.
    #[error("Unknown AIS error: {0}")]
    UnknownAisError(serde_json::Value),

    /// An operation was called out of order (e.g. signature before digest).
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    /// The AIS response was well-formed JSON but not a usable sign response.
    #[error("Invalid AIS response: {0}")]
    InvalidResponse(String),

    /// Transport failure (connection, TLS, timeout, HTTP client setup).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),
}
