use crate::crypto::{Crypto, Sha256Crypto};
use crate::utils::Redact;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Serializer turning a logical payload value into the bytes that are
/// hashed into the signature and sent as the request body.
///
/// The default serializer is plain JSON text encoding.
pub type PayloadSerializer =
    Arc<dyn Fn(&serde_json::Value) -> crate::Result<Vec<u8>> + Send + Sync>;

/// Long-lived signing configuration, immutable once handed to
/// [`Signer::new`](crate::Signer::new).
///
/// `access_key_id` and `secret_access_key` are required and must be
/// non-empty; everything else carries a usable default.
#[derive(Clone)]
pub struct Config {
    /// Access key id for aws services.
    pub access_key_id: String,
    /// Secret access key for aws services.
    pub secret_access_key: String,
    /// Session token for aws services.
    ///
    /// Passed through to the output as `x-amz-security-token` when set.
    pub session_token: Option<String>,
    /// Region to scope signatures to, e.g. `eu-west-1`.
    pub region: String,
    /// Service to scope signatures to, e.g. `execute-api`.
    pub service: String,
    /// `content-type` applied when the caller doesn't supply one.
    ///
    /// Dropped entirely for bodiless requests.
    pub default_content_type: Option<String>,
    /// `accept` applied when the caller doesn't supply one.
    pub default_accept_type: Option<String>,
    /// `expect` applied when the caller doesn't supply one.
    pub default_expect_type: Option<String>,
    /// Serializer for [`SigningRequest::data`](crate::SigningRequest).
    pub serialize_payload: PayloadSerializer,
    /// Hash/HMAC provider used by the pipeline.
    pub crypto: Arc<dyn Crypto>,
}

impl Config {
    /// Create a config with the given credentials and all defaults.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            session_token: None,
            region: "eu-west-1".to_string(),
            service: "execute-api".to_string(),
            default_content_type: Some("application/json".to_string()),
            default_accept_type: Some("application/json".to_string()),
            default_expect_type: None,
            serialize_payload: Arc::new(|v| Ok(serde_json::to_vec(v)?)),
            crypto: Arc::new(Sha256Crypto),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("region", &self.region)
            .field("service", &self.service)
            .field("default_content_type", &self.default_content_type)
            .field("default_accept_type", &self.default_accept_type)
            .field("default_expect_type", &self.default_expect_type)
            .finish_non_exhaustive()
    }
}
