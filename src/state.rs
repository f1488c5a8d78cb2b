//! Tamper-evident encoding of [`AuthProperties`] for the `state` parameter.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{AuthError, AuthProperties};

type HmacSha256 = Hmac<Sha256>;

pub const MIN_KEY_BYTES: usize = 32;

/// Protects properties into an opaque string and recovers them again.
///
/// `unprotect` must return `None` for any input that `protect` did not
/// produce with the same key.
pub trait StateCodec: Send + Sync {
    fn protect(&self, properties: &AuthProperties) -> Result<String, AuthError>;

    fn unprotect(&self, protected: &str) -> Option<AuthProperties>;
}

/// `base64url(json) "." base64url(hmac_sha256(key, base64url(json)))`
#[derive(Clone)]
pub struct HmacStateCodec {
    key: Vec<u8>,
}

impl std::fmt::Debug for HmacStateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacStateCodec").finish_non_exhaustive()
    }
}

impl HmacStateCodec {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, AuthError> {
        let key = key.into();
        if key.len() < MIN_KEY_BYTES {
            return Err(AuthError::Config(format!(
                "state key must be at least {MIN_KEY_BYTES} bytes"
            )));
        }
        Ok(Self { key })
    }

    /// Codec keyed with fresh random bytes; tokens do not survive a restart.
    pub fn ephemeral() -> Result<Self, AuthError> {
        let key = crate::pkce::random_token(MIN_KEY_BYTES)?;
        Self::new(key.into_bytes())
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|err| AuthError::Config(format!("invalid state key: {err}")))
    }
}

impl StateCodec for HmacStateCodec {
    fn protect(&self, properties: &AuthProperties) -> Result<String, AuthError> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(properties)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{tag}"))
    }

    fn unprotect(&self, protected: &str) -> Option<AuthProperties> {
        let (payload, tag) = protected.split_once('.')?;
        let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&tag).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> HmacStateCodec {
        HmacStateCodec::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap()
    }

    fn sample() -> AuthProperties {
        AuthProperties::new()
            .with_redirect_uri("/dashboard")
            .with_item("correlation_id", "abc")
            .with_item("code_verifier", "verifier")
            .with_prompt("consent")
    }

    #[test]
    fn round_trips_properties() {
        let codec = codec();
        for properties in [AuthProperties::new(), sample()] {
            let protected = codec.protect(&properties).unwrap();
            assert_eq!(codec.unprotect(&protected), Some(properties));
        }
    }

    #[test]
    fn any_flipped_byte_fails() {
        let codec = codec();
        let protected = codec.protect(&sample()).unwrap();

        for index in 0..protected.len() {
            let mut bytes = protected.clone().into_bytes();
            bytes[index] ^= 0x01;
            let tampered = String::from_utf8(bytes).unwrap();
            assert!(
                codec.unprotect(&tampered).is_none(),
                "flipping byte {index} should invalidate the state"
            );
        }
    }

    #[test]
    fn rejects_other_keys_and_garbage() {
        let protected = codec().protect(&sample()).unwrap();
        let other = HmacStateCodec::new(vec![7u8; 32]).unwrap();
        assert!(other.unprotect(&protected).is_none());
        assert!(codec().unprotect("").is_none());
        assert!(codec().unprotect("not-a-state").is_none());
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(matches!(
            HmacStateCodec::new(b"short".to_vec()),
            Err(AuthError::Config(_))
        ));
    }
}
