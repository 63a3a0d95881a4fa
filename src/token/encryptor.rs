//! JWE envelope encryption for card payloads.

use std::sync::Arc;

use josekit::jwe::{self, JweHeader};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{Result, WalletError},
    token::keys::KeyMaterial,
};

/// Encrypts an arbitrary JSON payload to the platform's public key.
///
/// Produces a JWE compact serialization with `RSA1_5` key transport and
/// `A128GCM` content encryption: five dot-separated segments (protected
/// header, encrypted key, initialization vector, ciphertext, tag). The
/// algorithm pair is mandated by the platform token specification.
///
/// The encryptor interprets nothing about the payload; it only requires
/// that the payload serializes to JSON.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use serde_json::json;
/// use wallet_link::token::{EnvelopeEncryptor, KeyMaterial};
///
/// # fn example(keys: Arc<KeyMaterial>) -> wallet_link::error::Result<()> {
/// let encryptor = EnvelopeEncryptor::new(keys);
/// let envelope = encryptor.encrypt(&json!({"title": "Concert"}))?;
/// assert_eq!(envelope.split('.').count(), 5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeEncryptor {
    keys: Arc<KeyMaterial>,
}

impl EnvelopeEncryptor {
    /// Creates an encryptor over shared key material.
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }

    /// Encrypts a JSON-serializable payload into a compact JWE envelope.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Encryption`] if the payload cannot be
    /// serialized to JSON or the JWE encryption step fails. No partial
    /// envelope is ever returned.
    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| WalletError::Encryption(format!("payload serialization failed: {e}")))?;

        let mut header = JweHeader::new();
        header.set_algorithm("RSA1_5");
        header.set_content_encryption("A128GCM");

        let envelope = jwe::serialize_compact(&json, &header, self.keys.encrypter())
            .map_err(|e| WalletError::Encryption(format!("JWE encryption failed: {e}")))?;

        debug!(segments = envelope.split('.').count(), "card payload encrypted");
        Ok(envelope)
    }
}
