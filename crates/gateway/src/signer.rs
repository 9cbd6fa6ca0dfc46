//! Signing for authenticated commands
//!
//! The command is serialized to canonical JSON (field declaration order,
//! `sign` absent) and hashed with HMAC-MD5. The HMAC key is the lowercase
//! hex SHA-1 of the account secret.

use hmac::{Hmac, Mac};
use md5::Md5;
use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::GatewayError;

type HmacMd5 = Hmac<Md5>;

/// Account key and secret
#[derive(Clone)]
pub struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Both key and secret are present
    pub fn is_complete(&self) -> bool {
        !self.key.trim().is_empty() && !self.secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Signer {
    access_key: String,
    hmac_key: String,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        let hmac_key = hex::encode(Sha1::digest(credentials.secret.as_bytes()));
        Self {
            access_key: credentials.key,
            hmac_key,
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Hex digest of `command`'s canonical JSON form
    pub fn sign<T: Serialize + ?Sized>(&self, command: &T) -> Result<String, GatewayError> {
        let canonical =
            serde_json::to_vec(command).map_err(|e| GatewayError::Signing(e.to_string()))?;
        self.sign_bytes(&canonical)
    }

    pub fn sign_bytes(&self, payload: &[u8]) -> Result<String, GatewayError> {
        let mut mac = HmacMd5::new_from_slice(self.hmac_key.as_bytes())
            .map_err(|e| GatewayError::Signing(e.to_string()))?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("hmac_key", &"<redacted>")
            .finish()
    }
}
