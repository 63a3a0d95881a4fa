//! JWS envelope signing with partner identity headers.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use josekit::jws::{self, JwsHeader};
use serde_json::json;

use crate::{
    error::{Result, WalletError},
    token::keys::KeyMaterial,
};

/// Content-type marker identifying the inner payload as a card envelope.
pub const CONTENT_TYPE_CARD: &str = "CARD";

/// Fixed protocol version expected by the receiving platform.
pub const PROTOCOL_VERSION: &str = "3";

/// Header fields embedded verbatim in the signed protected header.
///
/// These are signed, not just attached: identity and timestamp live in
/// the protected header because the inner payload is opaque ciphertext to
/// the signer, so the verifier must be able to authenticate and
/// freshness-check from the header alone.
///
/// `utc` is captured when the header set is constructed and must not be
/// reused across two different payloads; construct a fresh set per
/// signature.
#[derive(Debug, Clone)]
pub struct SignedHeaderSet {
    /// Content-type marker, always [`CONTENT_TYPE_CARD`] for card tokens.
    pub content_type: &'static str,
    /// Partner identifier assigned by the platform.
    pub partner_id: String,
    /// Protocol version, always [`PROTOCOL_VERSION`].
    pub version: &'static str,
    /// 4-character signing certificate code.
    pub certificate_id: String,
    /// UTC milliseconds captured at construction time.
    pub utc: i64,
}

impl SignedHeaderSet {
    /// Builds a header set from the active key material, capturing the
    /// current wall-clock time in UTC milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if the system clock reports a time
    /// before the Unix epoch.
    pub fn new(keys: &KeyMaterial) -> Result<Self> {
        Ok(Self {
            content_type: CONTENT_TYPE_CARD,
            partner_id: keys.partner_id().to_owned(),
            version: PROTOCOL_VERSION,
            certificate_id: keys.certificate_id().to_owned(),
            utc: now_millis()?,
        })
    }
}

/// Signs an inner payload with the partner's RSA key and the partner
/// header set.
///
/// Output is a JWS compact serialization (`RS256`, three dot-separated
/// segments: protected header, payload, signature). For outbound card
/// tokens the inner payload is the serialized JWE envelope from
/// [`EnvelopeEncryptor`](crate::token::EnvelopeEncryptor); for callback
/// tokens it is a plain claim set.
#[derive(Debug, Clone)]
pub struct EnvelopeSigner {
    keys: Arc<KeyMaterial>,
}

impl EnvelopeSigner {
    /// Creates a signer over shared key material.
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }

    /// Signs `inner` with the given header set.
    ///
    /// The header fields are embedded verbatim in the protected header:
    /// `cty`, `partnerId`, `ver`, `certificateId`, and `utc`, plus
    /// `typ=JWT` and the `alg` chosen by the signing key.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if header construction or the
    /// signature itself fails.
    pub fn sign(&self, inner: &[u8], headers: &SignedHeaderSet) -> Result<String> {
        let mut header = JwsHeader::new();
        header.set_token_type("JWT");
        header.set_content_type(headers.content_type);
        for (name, value) in [
            ("partnerId", json!(headers.partner_id)),
            ("ver", json!(headers.version)),
            ("certificateId", json!(headers.certificate_id)),
            ("utc", json!(headers.utc)),
        ] {
            header
                .set_claim(name, Some(value))
                .map_err(|e| WalletError::Signing(format!("header {name}: {e}")))?;
        }

        jws::serialize_compact(inner, &header, self.keys.signer())
            .map_err(|e| WalletError::Signing(format!("JWS signing failed: {e}")))
    }
}

/// Current wall-clock time as UTC milliseconds.
pub(crate) fn now_millis() -> Result<i64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| WalletError::Signing(format!("system time error: {e}")))?;
    i64::try_from(now.as_millis())
        .map_err(|_| WalletError::Signing("system time out of range".to_owned()))
}
