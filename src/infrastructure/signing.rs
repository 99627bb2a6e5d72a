use crate::domain::ports::Signer;
use crate::error::{PaymentError, Result};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the canonical parameter string, as uppercase hex.
///
/// The canonical string is `k1=v1&k2=v2&...&key=<secret>` with keys in
/// ascending order. `sign`, null and empty values are left out.
#[derive(Debug, Default, Clone, Copy)]
pub struct HmacSigner;

impl HmacSigner {
    pub fn canonical_string(params: &Map<String, Value>, secret: &str) -> String {
        let sorted: BTreeMap<&str, String> = params
            .iter()
            .filter(|(key, _)| key.as_str() != "sign")
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some((key.as_str(), text.clone())),
                other => Some((key.as_str(), other.to_string())),
            })
            .collect();

        let mut canonical = String::new();
        for (key, value) in sorted {
            canonical.push_str(key);
            canonical.push('=');
            canonical.push_str(&value);
            canonical.push('&');
        }
        canonical.push_str("key=");
        canonical.push_str(secret);
        canonical
    }

    /// Checks `signature` in constant time.
    pub fn verify(
        &self,
        params: &Map<String, Value>,
        secret: &str,
        signature: &str,
    ) -> Result<bool> {
        let Ok(expected) = hex::decode(signature) else {
            return Ok(false);
        };
        let mut mac = Self::mac(secret)?;
        mac.update(Self::canonical_string(params, secret).as_bytes());
        Ok(mac.verify_slice(&expected).is_ok())
    }

    fn mac(secret: &str) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::internal(format!("invalid signing key: {e}")))
    }
}

impl Signer for HmacSigner {
    fn sign(&self, params: &Map<String, Value>, secret: &str) -> Result<String> {
        let mut mac = Self::mac(secret)?;
        mac.update(Self::canonical_string(params, secret).as_bytes());
        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }
}
