// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::enum_variant_names)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # pdf_ais
//!
//! Sign PDF documents with the Swisscom All-in Signing Service (AIS).
//!
//! Signing a PDF with a remote key is a two-phase protocol: the document is
//! first written with a fixed-size, zero-filled signature placeholder and the
//! SHA-256 digest of every byte outside that placeholder is computed; the
//! digest goes to AIS, and the CMS container it returns is spliced into the
//! placeholder without moving any other byte.
//!
//! ## Core Features
//!
//! - **Incremental update**: the original bytes are kept verbatim; the
//!   signature dictionary, field, and a new cross-reference section
//!   (classic table or xref stream, matching the input) are appended
//! - **Certifying signature**: DocMDP with "no changes allowed"
//! - **Storage strategies**: sign in place, copy out of a read-only stream,
//!   or buffer a forward-only stream
//! - **Batch signing**: any number of documents per AIS request, with
//!   signatures routed by document index
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_ais::{AisClient, AisConfig, PdfBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AisConfig::from_json_file("ais.json")?;
//! let client = AisClient::new(&config)?;
//!
//! let mut pdf = PdfBuilder::new().input_path("contract.pdf").build()?;
//! let outcome = client.sign_one(&mut pdf)?;
//! println!("signed, request {}", outcome.request_id);
//!
//! std::fs::write("contract.signed.pdf", pdf.into_signed_bytes().unwrap_or_default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod text_string;
pub mod xref;

// Stream decoders
pub mod decoders;

// Incremental writing
pub mod writer;

// Signature placeholders
pub mod signatures;

// Document handle
pub mod pdf;

// AIS client
pub mod ais;

// Configuration
pub mod config;

// Re-exports
pub use ais::{AisClient, HttpTransport, SignOutcome, Transport};
pub use config::{AisConfig, PdfOptions};
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use pdf::{Pdf, PdfBuilder, PdfSource, Phase, StorageStrategy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
