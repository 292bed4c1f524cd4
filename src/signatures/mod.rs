//! PDF signature placeholders.
//!
//! Everything needed to prepare a document for an externally produced CMS
//! signature (adbe.pkcs7.detached): signature field resolution, the
//! signature dictionary with its reserved `/Contents`, byte-range
//! bookkeeping, and the two-step reserve/finalize session.

mod byterange;
mod embedder;
mod field;
mod types;

pub use byterange::ByteRangeCalculator;
pub use embedder::{CmsEmbedder, EmbedderSession, Placement};
pub use field::{FieldPlan, SigFieldSpec, INVISIBLE_WIDGET_FLAGS, SIG_FLAGS};
pub use types::{
    format_pdf_date, DigestAlgorithm, DocumentDigest, MdpPerm, SigMdpSetup, SignatureObject,
    DEFAULT_SIGNATURE_CAPACITY,
};
