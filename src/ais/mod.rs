//! Client for the Swisscom All-in Signing Service (AIS).
//!
//! AIS signs a SHA-256 digest with a static key held by the service and
//! returns a CMS SignedData container with timestamp and revocation
//! information. [`AisClient`] ties this to [`Pdf`](crate::pdf::Pdf) handles:
//! it computes their digests, sends one request and embeds the returned
//! signatures.

mod client;
pub mod request;
pub mod response;
mod transport;

pub use client::{AisClient, SignOutcome};
pub use response::classify_error;
pub use transport::{HttpTransport, Transport, REQUEST_CONTENT_TYPE};
