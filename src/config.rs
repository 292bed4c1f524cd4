//! Configuration for the AIS client and for document handles.

use crate::error::{Error, Result};
use crate::signatures::DEFAULT_SIGNATURE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Production signing endpoint.
pub const DEFAULT_AIS_URL: &str = "https://ais.swisscom.com/AIS-Server/rs/v1.0/sign";

/// Signature field filled or created when no name is given.
pub const DEFAULT_FIELD_NAME: &str = "Signature";

fn default_url() -> String {
    DEFAULT_AIS_URL.to_string()
}

/// Connection settings for the All-in Signing Service.
///
/// Can be loaded from JSON:
///
/// ```json
/// {
///   "customer": "acme",
///   "key_static": "signing-key",
///   "cert_path": "/etc/ais/client.crt",
///   "key_path": "/etc/ais/client.key",
///   "timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AisConfig {
    /// Sign endpoint
    #[serde(default = "default_url")]
    pub url: String,
    /// Customer id (first half of the claimed identity)
    pub customer: String,
    /// Static key id (second half of the claimed identity)
    pub key_static: String,
    /// PEM client certificate
    pub cert_path: PathBuf,
    /// PEM private key of the client certificate
    pub key_path: PathBuf,
    /// Whole-request deadline; none means the HTTP client default
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl AisConfig {
    /// Create a configuration for the production endpoint.
    pub fn new(
        customer: impl Into<String>,
        key_static: impl Into<String>,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: default_url(),
            customer: customer.into(),
            key_static: key_static.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            timeout_secs: None,
        }
    }

    /// Use another sign endpoint (e.g. a test system).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Request timeout, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// `customer:key_static`, as sent in `ClaimedIdentity.Name`.
    pub fn claimed_identity(&self) -> String {
        format!("{}:{}", self.customer, self.key_static)
    }

    /// Parse a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        log::debug!("Loaded AIS configuration from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.customer.is_empty() || self.key_static.is_empty() {
            return Err(Error::InvalidInput("customer and key_static must not be empty".to_string()));
        }
        if self.url.is_empty() {
            return Err(Error::InvalidInput("url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Per-document signing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfOptions {
    /// Signature field name
    pub field_name: String,
    /// Reserved capacity for the hex-encoded signature
    pub sig_size: usize,
    /// `/Name` of the signature dictionary
    pub signer_name: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfOptions {
    /// Default field name and capacity, no optional metadata.
    pub fn new() -> Self {
        Self {
            field_name: DEFAULT_FIELD_NAME.to_string(),
            sig_size: DEFAULT_SIGNATURE_CAPACITY,
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
        }
    }

    /// Set the signature field name.
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Set the reserved signature capacity.
    pub fn with_sig_size(mut self, size: usize) -> Self {
        self.sig_size = size;
        self
    }

    /// Set the signer name.
    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = Some(name.into());
        self
    }

    /// Set the signing reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the signing location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the signer's contact information.
    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }
}
