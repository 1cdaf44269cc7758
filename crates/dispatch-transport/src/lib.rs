//! dispatch-transport
//!
//! The Offer Transport: the one place that speaks HTTP to a vendor backend.
//! Normalizes/validates the stored `offer_url`, builds the outbound JSON
//! body, attaches the optional bearer, and enforces the 10-second timeout.
//! A single `reqwest::Client` is built once and shared across every call.

use std::time::Duration;

use dispatch_config::DeployEnv;
use dispatch_schemas::OfferPayload;
use tracing::{debug, warn};

const OFFER_PATH: &str = "/api/offer";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// OfferSendError
// ---------------------------------------------------------------------------

/// Why an offer failed to reach (or be accepted by) a vendor backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferSendError {
    InvalidUrl(String),
    UnsupportedScheme(String),
    LoopbackRejected(String),
    Timeout,
    Network(String),
    NonSuccessStatus(u16),
}

impl std::fmt::Display for OfferSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferSendError::InvalidUrl(url) => write!(f, "OFFER_SEND_REFUSED: invalid url {url}"),
            OfferSendError::UnsupportedScheme(scheme) => {
                write!(f, "OFFER_SEND_REFUSED: unsupported scheme {scheme}")
            }
            OfferSendError::LoopbackRejected(host) => write!(
                f,
                "OFFER_SEND_REFUSED: loopback host {host} rejected outside development"
            ),
            OfferSendError::Timeout => write!(f, "OFFER_SEND_FAILED: request timed out"),
            OfferSendError::Network(msg) => write!(f, "OFFER_SEND_FAILED: {msg}"),
            OfferSendError::NonSuccessStatus(code) => {
                write!(f, "OFFER_SEND_FAILED: vendor returned status {code}")
            }
        }
    }
}

impl std::error::Error for OfferSendError {}

// ---------------------------------------------------------------------------
// URL normalization + validation
// ---------------------------------------------------------------------------

/// Validate a vendor-supplied URL's scheme and loopback status, reused
/// by `/api/vendor/location`'s registration-time check. Does not touch
/// path/query/fragment.
pub fn validate_url(raw: &str, deploy_env: DeployEnv) -> Result<reqwest::Url, OfferSendError> {
    let url = reqwest::Url::parse(raw).map_err(|_| OfferSendError::InvalidUrl(raw.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(OfferSendError::UnsupportedScheme(other.to_string())),
    }

    let is_loopback = url
        .host_str()
        .map(|h| h == "localhost" || h.parse::<std::net::IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false))
        .unwrap_or(false);

    if is_loopback && !deploy_env.allows_loopback() {
        return Err(OfferSendError::LoopbackRejected(
            url.host_str().unwrap_or_default().to_string(),
        ));
    }

    Ok(url)
}

/// Normalize a stored `offer_url` to the vendor's `/api/offer` endpoint and
/// validate its scheme and loopback status. The caller's own path, if any,
/// is replaced: vendors are expected to register the root of their backend.
fn normalize_offer_url(raw: &str, deploy_env: DeployEnv) -> Result<reqwest::Url, OfferSendError> {
    let mut url = validate_url(raw, deploy_env)?;

    // If the vendor already registered the offer endpoint directly, leave it
    // untouched (query/fragment included). Otherwise the recorded URL is a
    // base URL: replace path, query and fragment with the canonical endpoint.
    if url.path() != OFFER_PATH {
        url.set_path(OFFER_PATH);
        url.set_query(None);
        url.set_fragment(None);
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// OfferTransport
// ---------------------------------------------------------------------------

/// Shared HTTP client and outbound configuration for sending offers.
#[derive(Clone)]
pub struct OfferTransport {
    client: reqwest::Client,
    outbound_bearer: Option<String>,
    deploy_env: DeployEnv,
}

impl OfferTransport {
    /// Build the shared client once. Panics only on a malformed TLS/client
    /// configuration, which would mean the process can't make HTTP calls at
    /// all — a startup-time fatal condition, not a per-request one.
    pub fn new(outbound_bearer: Option<String>, deploy_env: DeployEnv) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to construct the shared offer HTTP client");
        Self {
            client,
            outbound_bearer,
            deploy_env,
        }
    }

    /// POST an offer to `offer_url`. Success is any 2xx status; anything
    /// else (including transport failures) is an `OfferSendError`.
    pub async fn send_offer(
        &self,
        offer_url: &str,
        payload: &OfferPayload,
    ) -> Result<(), OfferSendError> {
        let url = normalize_offer_url(offer_url, self.deploy_env)?;

        debug!(vendor_url = %url, pickup_id = %payload.pickup_id, "sending offer");

        let mut req = self.client.post(url.clone()).json(payload);
        if let Some(bearer) = &self.outbound_bearer {
            req = req.bearer_auth(bearer);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                OfferSendError::Timeout
            } else {
                OfferSendError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            warn!(vendor_url = %url, status = status.as_u16(), "vendor rejected offer");
            Err(OfferSendError::NonSuccessStatus(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn payload() -> OfferPayload {
        let pickup_id = Uuid::new_v4();
        OfferPayload {
            vendor_id: "v-1".to_string(),
            request_id: Uuid::new_v4(),
            pickup_id_camel: pickup_id,
            pickup_id,
            latitude: Some(12.97),
            longitude: Some(77.59),
            scrap_summary: None,
        }
    }

    #[test]
    fn normalizes_to_api_offer_path() {
        let url = normalize_offer_url("https://vendor.example/some/other/path", DeployEnv::Production)
            .unwrap();
        assert_eq!(url.path(), "/api/offer");
        assert_eq!(url.host_str(), Some("vendor.example"));
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let err = normalize_offer_url("ftp://vendor.example", DeployEnv::Development).unwrap_err();
        assert_eq!(err, OfferSendError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn rejects_malformed_url() {
        let err = normalize_offer_url("not a url", DeployEnv::Development).unwrap_err();
        assert!(matches!(err, OfferSendError::InvalidUrl(_)));
    }

    #[test]
    fn rejects_loopback_in_production() {
        let err = normalize_offer_url("http://127.0.0.1:9000", DeployEnv::Production).unwrap_err();
        assert!(matches!(err, OfferSendError::LoopbackRejected(_)));

        let err = normalize_offer_url("http://localhost:9000", DeployEnv::Production).unwrap_err();
        assert!(matches!(err, OfferSendError::LoopbackRejected(_)));
    }

    #[test]
    fn preserves_url_already_ending_in_api_offer() {
        let url =
            normalize_offer_url("https://vendor.example/api/offer?debug=1", DeployEnv::Production)
                .unwrap();
        assert_eq!(url.path(), "/api/offer");
        assert_eq!(url.query(), Some("debug=1"));
    }

    #[test]
    fn allows_loopback_in_development() {
        let url = normalize_offer_url("http://127.0.0.1:9000", DeployEnv::Development).unwrap();
        assert_eq!(url.path(), "/api/offer");
    }

    #[tokio::test]
    async fn send_offer_rejects_before_making_any_request_on_bad_url() {
        let transport = OfferTransport::new(None, DeployEnv::Production);
        let err = transport
            .send_offer("http://localhost:1", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, OfferSendError::LoopbackRejected(_)));
    }
}
