//! Token envelope protocol: encrypt-then-sign card tokens and signed
//! state-change callbacks.
//!
//! # Protocol Overview
//!
//! Outbound card tokens ("CDATA") are built in two fixed stages:
//!
//! 1. The card payload is serialized to JSON and encrypted to the
//!    platform's RSA public key as a JWE compact envelope
//!    (`RSA1_5` key transport + `A128GCM` content encryption,
//!    five dot-separated segments).
//! 2. The encrypted envelope becomes the payload of a JWS compact
//!    structure signed with the partner's RSA private key (`RS256`,
//!    three dot-separated segments). Partner identity and the signing
//!    timestamp live in the protected header, so the receiving platform
//!    can authenticate and freshness-check the token without being able
//!    to read the inner ciphertext.
//!
//! Reversing the order breaks compatibility with the receiving platform;
//! both the algorithm pair and the header schema are mandated by the
//! platform token specification, not a design freedom.
//!
//! # Signed Header Fields
//!
//! Every outbound token carries, case-sensitive, inside the signed
//! protected header:
//!
//! - `cty`: `"CARD"`, marks the payload as a card envelope
//! - `partnerId`: issuer identity assigned by the platform
//! - `ver`: `"3"`, the fixed protocol version
//! - `certificateId`: 4-character signing certificate code
//! - `utc`: UTC milliseconds captured at signing time
//!
//! # Freshness
//!
//! The platform rejects tokens whose `utc` header is older than a short
//! validity window (on the order of 30 seconds). Nothing here enforces
//! that locally: [`TokenManager`] only guarantees the timestamp reflects
//! the actual construction instant, so create the token immediately
//! before transmission and never cache or reuse it.
//!
//! # Key Components
//!
//! - [`KeyMaterial`]: parsed, immutable key handles shared by every
//!   token operation
//! - [`EnvelopeEncryptor`]: JWE encryption of an arbitrary JSON payload
//! - [`EnvelopeSigner`]: JWS signing with the partner header set
//! - [`TokenManager`]: the encrypt-then-sign pipeline plus
//!   self-verification and unauthenticated inspection
//! - [`CallbackVerifier`]: verification of inbound signed state-change
//!   notifications
//!
//! All components hold no mutable state and are safe to share across
//! threads; each call is independent apart from the signing timestamp and
//! the random content-encryption key generated per JWE.

pub mod callback;
pub mod encryptor;
pub mod keys;
pub mod manager;
pub mod signer;

pub use callback::{CallbackClaims, CallbackVerifier, CardState, CardStateEvent};
pub use encryptor::EnvelopeEncryptor;
pub use keys::KeyMaterial;
pub use manager::{TokenInfo, TokenManager, VerifiedToken};
pub use signer::{EnvelopeSigner, SignedHeaderSet};

#[cfg(test)]
pub(crate) mod testkeys {
    use std::sync::Arc;

    use openssl::{pkey::PKey, rsa::Rsa};

    use super::keys::KeyMaterial;

    /// Generates a fresh 2048-bit RSA key pair as (private PKCS#8 PEM,
    /// public SPKI PEM).
    pub(crate) fn rsa_pem_pair() -> (Vec<u8>, Vec<u8>) {
        let rsa = Rsa::generate(2048).expect("RSA key generation should succeed");
        let pkey = PKey::from_rsa(rsa).expect("PKey conversion should succeed");
        let private_pem =
            pkey.private_key_to_pem_pkcs8().expect("private PEM encoding should succeed");
        let public_pem = pkey.public_key_to_pem().expect("public PEM encoding should succeed");
        (private_pem, public_pem)
    }

    /// Key material for partner `"partner-123"` / certificate `"A1B2"`,
    /// returned together with the platform private key PEM so tests can
    /// exercise the reference decrypt path.
    pub(crate) fn key_material_with_platform_key() -> (Arc<KeyMaterial>, Vec<u8>) {
        let (partner_private, _) = rsa_pem_pair();
        let (platform_private, platform_public) = rsa_pem_pair();
        let keys =
            KeyMaterial::from_pem(&partner_private, &platform_public, "partner-123", "A1B2")
                .expect("key material should load");
        (Arc::new(keys), platform_private)
    }

    pub(crate) fn key_material() -> Arc<KeyMaterial> {
        key_material_with_platform_key().0
    }
}
