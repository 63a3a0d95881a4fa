//! Encrypt-then-sign token pipeline.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use josekit::jws;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Result, WalletError},
    token::{
        encryptor::EnvelopeEncryptor,
        keys::KeyMaterial,
        signer::{now_millis, EnvelopeSigner, SignedHeaderSet},
    },
};

/// Header and claim fields read from a token without verifying it.
///
/// Produced by [`TokenManager::peek_token_info`]. Everything here is
/// attacker-controlled until the token has been verified; use it for
/// routing, logging, and diagnostics only, never for authorization.
///
/// The claim-derived fields (`issued_at`, `expires_at`, `token_id`) are
/// `None` for outbound card tokens, whose payload is ciphertext rather
/// than a claim set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// `partnerId` header value.
    pub partner_id: Option<String>,
    /// `certificateId` header value.
    pub certificate_id: Option<String>,
    /// `ver` header value.
    pub version: Option<String>,
    /// `utc` header value, milliseconds.
    pub utc: Option<i64>,
    /// `iat` claim, seconds, when the payload is a readable claim set.
    pub issued_at: Option<i64>,
    /// `exp` claim, seconds, when the payload is a readable claim set.
    pub expires_at: Option<i64>,
    /// `jti` claim, when the payload is a readable claim set.
    pub token_id: Option<String>,
}

impl TokenInfo {
    /// Whether the `exp` claim, if present, is still in the future.
    ///
    /// Returns `None` when the token carries no readable expiry. A `Some`
    /// result is still unverified data.
    #[must_use]
    pub fn is_unexpired(&self) -> Option<bool> {
        let exp = self.expires_at?;
        let now = now_millis().ok()? / 1000;
        Some(exp > now)
    }
}

/// Signed header fields recovered from a verified token, together with
/// the authenticated inner payload.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// The header fields, now authenticated by the signature.
    pub headers: SignedHeaderSet,
    /// The signed payload bytes. For card tokens this is the JWE
    /// envelope; for callback tokens, a JSON claim set.
    pub payload: Vec<u8>,
}

/// Builds and verifies two-stage card tokens.
///
/// Issuing is strictly encrypt-then-sign: the card payload is first
/// sealed to the platform's public key as a JWE envelope, and that
/// envelope is then signed with the partner's private key under a fresh
/// header set. The two stages never run in the other order and no
/// intermediate value is exposed.
///
/// Stateless apart from the shared [`KeyMaterial`]; clone freely.
#[derive(Debug, Clone)]
pub struct TokenManager {
    keys: Arc<KeyMaterial>,
    encryptor: EnvelopeEncryptor,
    signer: EnvelopeSigner,
}

impl TokenManager {
    /// Creates a manager over shared key material.
    #[must_use]
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self {
            encryptor: EnvelopeEncryptor::new(Arc::clone(&keys)),
            signer: EnvelopeSigner::new(Arc::clone(&keys)),
            keys,
        }
    }

    /// Issues a card token: encrypts `payload` to the platform key, then
    /// signs the resulting envelope with a freshly timestamped header set.
    ///
    /// The platform enforces a short freshness window on the `utc` header,
    /// so transmit the token immediately and never cache it.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Encryption`] or [`WalletError::Signing`] if
    /// either stage fails; no partial token is ever produced.
    #[instrument(skip_all, fields(partner_id = %self.keys.partner_id()))]
    pub fn issue_card_token<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let envelope = self.encryptor.encrypt(payload)?;
        let headers = SignedHeaderSet::new(&self.keys)?;
        let token = self.signer.sign(envelope.as_bytes(), &headers)?;
        debug!(utc = headers.utc, "card token issued");
        Ok(token)
    }

    /// Signs a plain claim set without the encryption stage.
    ///
    /// Used for callback-style tokens whose payload must remain readable
    /// by the holder of the partner public key.
    pub(crate) fn sign_claims<T: Serialize + ?Sized>(&self, claims: &T) -> Result<String> {
        let json = serde_json::to_vec(claims)
            .map_err(|e| WalletError::Signing(format!("claim serialization failed: {e}")))?;
        let headers = SignedHeaderSet::new(&self.keys)?;
        self.signer.sign(&json, &headers)
    }

    /// Verifies a token's signature against the partner key pair and
    /// returns the authenticated headers and payload.
    ///
    /// The algorithm family is checked before any signature math: a token
    /// whose `alg` header is not RSA-based is rejected outright, so a
    /// substituted symmetric algorithm can never cause the partner public
    /// key to be misused as an HMAC secret.
    ///
    /// # Errors
    ///
    /// - [`WalletError::TokenInvalid`] for structural problems, a non-RSA
    ///   `alg`, a bad signature, or missing identity headers.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<VerifiedToken> {
        reject_non_rsa_alg(token)?;

        let (payload, header) = jws::deserialize_compact(token, self.keys.verifier())
            .map_err(|e| {
                warn!("token signature verification failed");
                WalletError::TokenInvalid(format!("signature verification failed: {e}"))
            })?;

        let claim_str = |name: &str| -> Result<String> {
            header
                .claim(name)
                .and_then(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
                .ok_or_else(|| WalletError::TokenInvalid(format!("missing {name} header")))
        };

        let partner_id = claim_str("partnerId")?;
        let certificate_id = claim_str("certificateId")?;
        let version = claim_str("ver")?;
        let utc = header
            .claim("utc")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| WalletError::TokenInvalid("missing utc header".to_owned()))?;

        let headers = SignedHeaderSet {
            content_type: match header.content_type() {
                Some("CARD") => super::signer::CONTENT_TYPE_CARD,
                _ => "",
            },
            partner_id,
            version: if version == super::signer::PROTOCOL_VERSION {
                super::signer::PROTOCOL_VERSION
            } else {
                return Err(WalletError::TokenInvalid(format!(
                    "unsupported protocol version {version:?}"
                )));
            },
            certificate_id,
            utc,
        };

        Ok(VerifiedToken { headers, payload })
    }

    /// Reads header and claim fields from a token without verifying it.
    ///
    /// Never fails on a well-formed but unauthentic token; everything
    /// returned is untrusted. Claim fields are populated only when the
    /// payload segment decodes as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::TokenInvalid`] only for tokens that are not
    /// structurally JWS compact serializations at all.
    pub fn peek_token_info(&self, token: &str) -> Result<TokenInfo> {
        let mut segments = token.split('.');
        let (header_b64, payload_b64) = match (segments.next(), segments.next(), segments.next())
        {
            (Some(h), Some(p), Some(_)) if segments.next().is_none() => (h, p),
            _ => {
                return Err(WalletError::TokenInvalid(
                    "expected a 3-segment JWS compact serialization".to_owned(),
                ))
            }
        };

        let header: serde_json::Value = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(|| {
                WalletError::TokenInvalid("protected header is not base64url JSON".to_owned())
            })?;

        // Claims are best-effort: card tokens carry ciphertext here.
        let claims: Option<serde_json::Value> = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok());

        let str_of = |v: &serde_json::Value, name: &str| {
            v.get(name).and_then(serde_json::Value::as_str).map(ToOwned::to_owned)
        };
        let i64_of =
            |v: &serde_json::Value, name: &str| v.get(name).and_then(serde_json::Value::as_i64);

        Ok(TokenInfo {
            partner_id: str_of(&header, "partnerId"),
            certificate_id: str_of(&header, "certificateId"),
            version: str_of(&header, "ver"),
            utc: i64_of(&header, "utc"),
            issued_at: claims.as_ref().and_then(|c| i64_of(c, "iat")),
            expires_at: claims.as_ref().and_then(|c| i64_of(c, "exp")),
            token_id: claims.as_ref().and_then(|c| str_of(c, "jti")),
        })
    }

    pub(crate) fn keys(&self) -> &Arc<KeyMaterial> {
        &self.keys
    }
}

/// Rejects tokens whose `alg` header is not an RSA-family algorithm.
pub(crate) fn reject_non_rsa_alg(token: &str) -> Result<()> {
    let header_b64 = token
        .split('.')
        .next()
        .ok_or_else(|| WalletError::TokenInvalid("empty token".to_owned()))?;
    let header: serde_json::Value = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| {
            WalletError::TokenInvalid("protected header is not base64url JSON".to_owned())
        })?;

    match header.get("alg").and_then(serde_json::Value::as_str) {
        Some(alg) if alg.starts_with("RS") || alg.starts_with("PS") => Ok(()),
        Some(alg) => Err(WalletError::TokenInvalid(format!(
            "unexpected signing algorithm {alg:?}"
        ))),
        None => Err(WalletError::TokenInvalid("missing alg header".to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use josekit::jwe::{self, RSA1_5};
    use serde_json::json;

    use super::*;
    use crate::token::testkeys;

    fn manager() -> TokenManager {
        TokenManager::new(testkeys::key_material())
    }

    #[test]
    fn test_issue_card_token_has_signed_envelope_inside() {
        let m = manager();

        let token = m.issue_card_token(&json!({"title": "Concert"})).unwrap();

        assert_eq!(token.split('.').count(), 3);
        let verified = m.verify(&token).unwrap();
        let inner = String::from_utf8(verified.payload).unwrap();
        assert_eq!(inner.split('.').count(), 5, "signed payload must be a JWE envelope");
    }

    #[test]
    fn test_issue_card_token_headers() {
        let m = manager();

        let token = m.issue_card_token(&json!({"title": "Concert"})).unwrap();
        let verified = m.verify(&token).unwrap();

        assert_eq!(verified.headers.partner_id, "partner-123");
        assert_eq!(verified.headers.version, "3");
        assert_eq!(verified.headers.certificate_id, "A1B2");
        let now = now_millis().unwrap();
        assert!((now - verified.headers.utc).abs() < 5000);
    }

    #[test]
    fn test_full_pipeline_decrypts_to_original_payload() {
        let (keys, platform_private_pem) = testkeys::key_material_with_platform_key();
        let m = TokenManager::new(keys);
        let payload = json!({"title": "Concert", "seat": "12A"});

        let token = m.issue_card_token(&payload).unwrap();
        let verified = m.verify(&token).unwrap();

        #[allow(deprecated)]
        let decrypter = RSA1_5.decrypter_from_pem(&platform_private_pem).unwrap();
        let envelope = String::from_utf8(verified.payload).unwrap();
        let (plaintext, _) = jwe::deserialize_compact(&envelope, &decrypter).unwrap();
        let recovered: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(recovered, payload);
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let m = manager();
        let token = m.issue_card_token(&json!({"title": "Concert"})).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let tampered_payload = URL_SAFE_NO_PAD.encode(b"forged-envelope");
        parts[1] = &tampered_payload;
        let tampered = parts.join(".");

        assert!(matches!(m.verify(&tampered), Err(WalletError::TokenInvalid(_))));
    }

    #[test]
    fn test_verify_rejects_foreign_key_signature() {
        let m = manager();
        let other = manager();

        let token = other.issue_card_token(&json!({"a": 1})).unwrap();

        assert!(
            matches!(m.verify(&token), Err(WalletError::TokenInvalid(_))),
            "tokens signed with a different key pair must not verify"
        );
    }

    #[test]
    fn test_verify_rejects_substituted_algorithm() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"{}");
        let forged = format!("{header}.{payload}.c2ln");

        let result = manager().verify(&forged);

        match result {
            Err(WalletError::TokenInvalid(msg)) => {
                assert!(msg.contains("HS256"), "rejection should name the bad algorithm")
            }
            other => panic!("expected TokenInvalid, got {other:?}"),
        }
    }

    #[test]
    fn test_verify_rejects_unsupported_version() {
        let keys = testkeys::key_material();
        let signer = EnvelopeSigner::new(Arc::clone(&keys));
        let mut headers = SignedHeaderSet::new(&keys).unwrap();
        headers.version = "2";

        let token = signer.sign(b"inner", &headers).unwrap();

        let result = TokenManager::new(keys).verify(&token);
        assert!(matches!(result, Err(WalletError::TokenInvalid(_))));
    }

    #[test]
    fn test_peek_token_info_reads_headers_without_verification() {
        let m = manager();
        let token = m.issue_card_token(&json!({"title": "Concert"})).unwrap();

        let info = m.peek_token_info(&token).unwrap();

        assert_eq!(info.partner_id.as_deref(), Some("partner-123"));
        assert_eq!(info.certificate_id.as_deref(), Some("A1B2"));
        assert_eq!(info.version.as_deref(), Some("3"));
        assert!(info.utc.is_some());
        // Card token payloads are ciphertext, so no claims surface.
        assert_eq!(info.issued_at, None);
        assert_eq!(info.expires_at, None);
        assert_eq!(info.token_id, None);
    }

    #[test]
    fn test_peek_token_info_works_on_tampered_tokens() {
        let m = manager();
        let token = m.issue_card_token(&json!({"a": 1})).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "bm90LWEtc2ln";
        let tampered = parts.join(".");

        let info = m.peek_token_info(&tampered).unwrap();

        assert_eq!(info.partner_id.as_deref(), Some("partner-123"));
    }

    #[test]
    fn test_peek_token_info_rejects_non_jws_input() {
        let result = manager().peek_token_info("only.two");
        assert!(matches!(result, Err(WalletError::TokenInvalid(_))));
    }

    #[test]
    fn test_token_info_expiry_helper() {
        let info = TokenInfo {
            partner_id: None,
            certificate_id: None,
            version: None,
            utc: None,
            issued_at: None,
            expires_at: Some(now_millis().unwrap() / 1000 + 600),
            token_id: None,
        };
        assert_eq!(info.is_unexpired(), Some(true));

        let stale = TokenInfo { expires_at: Some(100), ..info.clone() };
        assert_eq!(stale.is_unexpired(), Some(false));

        let opaque = TokenInfo { expires_at: None, ..info };
        assert_eq!(opaque.is_unexpired(), None);
    }
}
