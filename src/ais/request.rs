//! Sign request payload.
//!
//! AIS speaks the JSON rendering of the OASIS DSS `SignRequest`: XML
//! attributes become `@`-prefixed keys and namespaced elements keep their
//! prefix (`dsig.`, `sc.`).

use crate::signatures::DigestAlgorithm;
use serde::Serialize;

/// `@Profile` of every request.
pub const DSS_PROFILE: &str = "http://ais.swisscom.ch/1.0";
/// CMS signature type.
pub const SIGNATURE_TYPE_CMS: &str = "urn:ietf:rfc:3369";
/// RFC 3161 timestamp.
pub const TIMESTAMP_TYPE: &str = "urn:ietf:rfc:3161";
/// Marks a request carrying several document hashes.
pub const BATCH_PROFILE: &str = "http://ais.swisscom.ch/1.0/profiles/batchprocessing";
/// Embed both OCSP responses and CRLs.
pub const REVOCATION_BOTH: &str = "BOTH";

/// Top-level request object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignRequestEnvelope {
    /// The request
    #[serde(rename = "SignRequest")]
    pub sign_request: SignRequest,
}

/// `SignRequest` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignRequest {
    /// Random id, echoed by the service
    #[serde(rename = "@RequestID")]
    pub request_id: String,
    /// DSS profile
    #[serde(rename = "@Profile")]
    pub profile: String,
    /// Signing options
    #[serde(rename = "OptionalInputs")]
    pub optional_inputs: OptionalInputs,
    /// Hashes to sign
    #[serde(rename = "InputDocuments")]
    pub input_documents: InputDocuments,
}

/// `OptionalInputs` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionalInputs {
    /// Key selection
    #[serde(rename = "ClaimedIdentity")]
    pub claimed_identity: ClaimedIdentity,
    /// Requested signature format
    #[serde(rename = "SignatureType")]
    pub signature_type: String,
    /// Present for batch requests only
    #[serde(rename = "AdditionalProfile", skip_serializing_if = "Option::is_none")]
    pub additional_profile: Option<String>,
    /// Timestamp request
    #[serde(rename = "AddTimestamp")]
    pub add_timestamp: TypedOption,
    /// Revocation information request
    #[serde(rename = "sc.AddRevocationInformation")]
    pub add_revocation_information: TypedOption,
}

/// `ClaimedIdentity` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimedIdentity {
    /// `customer:key_static`
    #[serde(rename = "Name")]
    pub name: String,
}

/// An option element whose only content is a `Type` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedOption {
    /// Option type
    #[serde(rename = "@Type")]
    pub kind: String,
}

/// `InputDocuments` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputDocuments {
    /// One hash, or one per batch document
    #[serde(rename = "DocumentHash")]
    pub document_hash: DocumentHashes,
}

/// A single document hash or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DocumentHashes {
    /// Single-document request
    Single(DocumentHash),
    /// Batch request; each entry carries its `@ID`
    Batch(Vec<DocumentHash>),
}

/// `DocumentHash` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentHash {
    /// Position of the document in the batch
    #[serde(rename = "@ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<usize>,
    /// Hash algorithm
    #[serde(rename = "dsig.DigestMethod")]
    pub digest_method: DigestMethod,
    /// Base64 digest
    #[serde(rename = "dsig.DigestValue")]
    pub digest_value: String,
}

/// `dsig:DigestMethod` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestMethod {
    /// XML-Enc algorithm URI
    #[serde(rename = "@Algorithm")]
    pub algorithm: String,
}

impl DocumentHash {
    fn new(id: Option<usize>, digest: String) -> Self {
        Self {
            id,
            digest_method: DigestMethod {
                algorithm: DigestAlgorithm::Sha256.xmlenc_uri().to_string(),
            },
            digest_value: digest,
        }
    }
}

/// Fresh request id: 32 lowercase hex digits.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl SignRequestEnvelope {
    fn build(request_id: String, identity: &str, batch: bool, documents: DocumentHashes) -> Self {
        Self {
            sign_request: SignRequest {
                request_id,
                profile: DSS_PROFILE.to_string(),
                optional_inputs: OptionalInputs {
                    claimed_identity: ClaimedIdentity {
                        name: identity.to_string(),
                    },
                    signature_type: SIGNATURE_TYPE_CMS.to_string(),
                    additional_profile: batch.then(|| BATCH_PROFILE.to_string()),
                    add_timestamp: TypedOption {
                        kind: TIMESTAMP_TYPE.to_string(),
                    },
                    add_revocation_information: TypedOption {
                        kind: REVOCATION_BOTH.to_string(),
                    },
                },
                input_documents: InputDocuments {
                    document_hash: documents,
                },
            },
        }
    }

    /// Request for one document.
    pub fn single(request_id: String, identity: &str, digest: String) -> Self {
        Self::build(request_id, identity, false, DocumentHashes::Single(DocumentHash::new(None, digest)))
    }

    /// Request for several documents; `@ID` is the position in `digests`.
    pub fn batch(request_id: String, identity: &str, digests: Vec<String>) -> Self {
        let hashes = digests
            .into_iter()
            .enumerate()
            .map(|(index, digest)| DocumentHash::new(Some(index), digest))
            .collect();
        Self::build(request_id, identity, true, DocumentHashes::Batch(hashes))
    }

    /// Request id of this request.
    pub fn request_id(&self) -> &str {
        &self.sign_request.request_id
    }
}
