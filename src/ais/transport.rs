//! HTTP transport to the sign endpoint.

use crate::config::AisConfig;
use crate::error::{Error, Result};
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;

/// `Content-Type` of sign requests.
pub const REQUEST_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Delivers a serialized sign request and returns the decoded JSON reply.
///
/// [`HttpTransport`] talks to the service; tests and proxies plug in their own.
pub trait Transport {
    /// POST `payload` and parse the response body as JSON.
    fn post(&self, payload: &str) -> Result<Value>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn post(&self, payload: &str) -> Result<Value> {
        (**self).post(payload)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn post(&self, payload: &str) -> Result<Value> {
        (**self).post(payload)
    }
}

/// Blocking HTTPS transport authenticated with a client certificate.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    /// Build the HTTP client from the certificate, key, URL and timeout in `config`.
    pub fn new(config: &AisConfig) -> Result<Self> {
        let mut pem = std::fs::read(&config.cert_path)?;
        if !pem.ends_with(b"\n") {
            pem.push(b'\n');
        }
        pem.extend_from_slice(&std::fs::read(&config.key_path)?);
        let identity = reqwest::Identity::from_pem(&pem)?;

        Self::with_builder(Client::builder().use_rustls_tls().identity(identity), config)
    }

    /// Finish `builder` with the JSON headers and the timeout from `config`.
    fn with_builder(builder: ClientBuilder, config: &AisConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(REQUEST_CONTENT_TYPE));

        let mut builder = builder.default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            url: config.url.clone(),
        })
    }

    /// Endpoint requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    fn post(&self, payload: &str) -> Result<Value> {
        let response = self.client.post(&self.url).body(payload.to_owned()).send()?;
        let status = response.status();
        log::debug!("AIS answered with HTTP {}", status);

        // Error results come with 4xx/5xx codes but still carry a JSON body.
        let body = response.text()?;
        serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                Error::Json(e)
            } else {
                Error::InvalidResponse(format!("HTTP {} with non-JSON body", status))
            }
        })
    }
}
