//! Password hashing (Argon2 PHC strings) and session cookie signing (HMAC-SHA256).

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use password_hash::{SaltString, PasswordHash};
use sha2::Sha256;
use std::sync::Arc;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

/// A hash that does not parse as a PHC string never verifies.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Random bytes encoded base64url without padding.
pub fn random_token(len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Key used to sign the session id cookie.
///
/// The cookie value is `<sid>.<mac>` where `mac` is base64url(HMAC-SHA256(key, sid)).
#[derive(Clone)]
pub struct CookieKey {
    key_bytes: Arc<[u8]>,
}

impl std::fmt::Debug for CookieKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieKey").field("len", &self.key_bytes.len()).finish()
    }
}

impl CookieKey {
    pub const MIN_KEY_LENGTH: usize = 32;

    pub fn new(key: impl AsRef<[u8]>) -> Result<Self> {
        let key_bytes = key.as_ref();
        if key_bytes.len() < Self::MIN_KEY_LENGTH {
            return Err(anyhow!(
                "session secret too short: {} bytes (minimum {})",
                key_bytes.len(),
                Self::MIN_KEY_LENGTH
            ));
        }
        Ok(Self { key_bytes: Arc::from(key_bytes) })
    }

    /// Fresh random key; cookies signed with it do not survive a restart.
    pub fn generate() -> Result<Self> {
        let mut buf = [0u8; 64];
        getrandom::getrandom(&mut buf).map_err(|e| anyhow!(e.to_string()))?;
        Self::new(buf)
    }

    fn mac(&self) -> Hmac<Sha256> {
        // HMAC accepts keys of any length
        Hmac::<Sha256>::new_from_slice(&self.key_bytes).expect("hmac accepts any key length")
    }

    pub fn sign(&self, value: &str) -> String {
        let mut mac = self.mac();
        mac.update(value.as_bytes());
        let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}", value, sig)
    }

    /// Returns the original value when the signature checks out.
    pub fn unsign(&self, signed: &str) -> Option<String> {
        let (value, sig) = signed.rsplit_once('.')?;
        if value.is_empty() { return None; }
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig).ok()?;
        let mut mac = self.mac();
        mac.update(value.as_bytes());
        mac.verify_slice(&sig_bytes).ok()?;
        Some(value.to_string())
    }
}
