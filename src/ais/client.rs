//! Signing client: digests documents, asks AIS for signatures, embeds them.

use super::request::{new_request_id, SignRequestEnvelope};
use super::response::parse_response;
use super::transport::{HttpTransport, Transport};
use crate::config::AisConfig;
use crate::error::{Error, Result};
use crate::pdf::{Pdf, Phase};

/// What a completed sign call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    /// `@RequestID` sent to the service, for support cases
    pub request_id: String,
    /// Number of documents signed
    pub documents: usize,
}

/// Client for the AIS sign endpoint.
///
/// Holds no mutable state; one client can serve any number of requests.
#[derive(Debug, Clone)]
pub struct AisClient<T = HttpTransport> {
    identity: String,
    transport: T,
}

impl AisClient<HttpTransport> {
    /// Client that talks HTTPS to `config.url`.
    pub fn new(config: &AisConfig) -> Result<Self> {
        Ok(Self::with_transport(config, HttpTransport::new(config)?))
    }
}

impl<T: Transport> AisClient<T> {
    /// Client using a custom transport.
    pub fn with_transport(config: &AisConfig, transport: T) -> Self {
        Self {
            identity: config.claimed_identity(),
            transport,
        }
    }

    /// The transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Claimed identity sent with each request.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Digest `pdf`, have it signed and embed the signature.
    pub fn sign_one(&self, pdf: &mut Pdf<'_>) -> Result<SignOutcome> {
        let digest = pdf.digest()?;
        let request = SignRequestEnvelope::single(new_request_id(), &self.identity, digest);
        log::info!("Requesting signature for 1 document (request {})", request.request_id());

        let response = parse_response(self.transport.post(&serde_json::to_string(&request)?)?)?;
        pdf.write_signature(&response.single_signature()?)?;

        Ok(SignOutcome {
            request_id: request.sign_request.request_id,
            documents: 1,
        })
    }

    /// Sign several documents with one request.
    ///
    /// Each signature is routed by its `@WhichDocument` index, never by its
    /// position in the response. The first failing write aborts the call;
    /// documents signed before it stay signed.
    pub fn sign_batch(&self, pdfs: &mut [Pdf<'_>]) -> Result<SignOutcome> {
        match pdfs.len() {
            0 => return Err(Error::InvalidInput("empty batch".to_string())),
            1 => return self.sign_one(&mut pdfs[0]),
            _ => {},
        }

        let digests = pdfs.iter_mut().map(|pdf| pdf.digest()).collect::<Result<Vec<_>>>()?;
        let request = SignRequestEnvelope::batch(new_request_id(), &self.identity, digests);
        log::info!(
            "Requesting signatures for {} documents (request {})",
            pdfs.len(),
            request.request_id()
        );

        let response = parse_response(self.transport.post(&serde_json::to_string(&request)?)?)?;
        for (index, signature) in response.batch_signatures()? {
            let count = pdfs.len();
            let pdf = pdfs.get_mut(index).ok_or_else(|| {
                Error::InvalidResponse(format!("@WhichDocument {} out of range for {} documents", index, count))
            })?;
            if pdf.phase() == Phase::Signed {
                return Err(Error::InvalidResponse(format!("@WhichDocument {} returned twice", index)));
            }
            pdf.write_signature(&signature)?;
        }

        if let Some(missing) = pdfs.iter().position(|pdf| pdf.phase() != Phase::Signed) {
            return Err(Error::InvalidResponse(format!("no signature returned for document {}", missing)));
        }

        Ok(SignOutcome {
            request_id: request.sign_request.request_id,
            documents: pdfs.len(),
        })
    }
}
