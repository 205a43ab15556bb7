//! Pluggable request signing (spec §10 ambient stack).
//!
//! The exchange and sports-data feed both require authenticated requests,
//! but the concrete scheme is a vendor detail the engine shouldn't hardcode
//! into `exchange`/`sportsfeed`. Each surface depends on a trait; the
//! default implementation below signs with a static API key the way the
//! teacher's vault components authenticate outbound requests, and a
//! different exchange can swap in HMAC request signing without touching
//! the stream or feed code.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Produces the headers an outbound exchange REST/WS request needs.
pub trait ExchangeSigner: Send + Sync {
    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Vec<(String, String)>;
}

/// Produces the headers an outbound sports-data request needs.
pub trait SportsFeedAuth: Send + Sync {
    fn auth_headers(&self) -> Vec<(String, String)>;
}

/// Signs with a fixed API key, sent as a bearer token. This is the default
/// for both surfaces; exchanges that require HMAC-signed requests can
/// implement [`ExchangeSigner`] with [`hmac_signature`] instead.
pub struct StaticKey {
    pub api_key: String,
}

impl StaticKey {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into() }
    }
}

impl ExchangeSigner for StaticKey {
    fn auth_headers(&self, _method: &str, _path: &str, _body: &str) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), format!("Bearer {}", self.api_key))]
    }
}

impl SportsFeedAuth for StaticKey {
    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![("Authorization".to_string(), format!("Bearer {}", self.api_key))]
    }
}

/// HMAC-SHA256 request signer over `method + path + timestamp + body`,
/// base64-encoded, for exchanges that require signed requests rather than
/// a static bearer token.
pub struct HmacSigner {
    pub key_id: String,
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(key_id: impl Into<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self { key_id: key_id.into(), secret: secret.into() }
    }
}

impl ExchangeSigner for HmacSigner {
    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Vec<(String, String)> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let signature = hmac_signature(&self.secret, method, path, &timestamp, body);
        vec![
            ("KALSHI-ACCESS-KEY".to_string(), self.key_id.clone()),
            ("KALSHI-ACCESS-TIMESTAMP".to_string(), timestamp),
            ("KALSHI-ACCESS-SIGNATURE".to_string(), signature),
        ]
    }
}

fn hmac_signature(secret: &[u8], method: &str, path: &str, timestamp: &str, body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_key_emits_bearer_header() {
        let signer = StaticKey::new("abc123");
        let headers = ExchangeSigner::auth_headers(&signer, "GET", "/trade-api/v2/markets", "");
        assert_eq!(headers[0].1, "Bearer abc123");
    }

    #[test]
    fn hmac_signer_is_deterministic_given_fixed_timestamp() {
        let secret = b"supersecret".to_vec();
        let sig1 = hmac_signature(&secret, "GET", "/x", "1000", "");
        let sig2 = hmac_signature(&secret, "GET", "/x", "1000", "");
        assert_eq!(sig1, sig2);
        let sig3 = hmac_signature(&secret, "POST", "/x", "1000", "");
        assert_ne!(sig1, sig3);
    }
}
