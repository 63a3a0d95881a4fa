//! Key material loading and storage.
//!
//! [`KeyMaterial`] parses the partner's PEM-encoded RSA private key and the
//! platform's PEM-encoded public key (or certificate) exactly once, at
//! construction, and holds the resulting JOSE handles for the lifetime of
//! the process. It is immutable after construction and is shared read-only
//! (via `Arc`) across all token operations, which is what makes every
//! cryptographic call in this crate safe to run concurrently without
//! locking.
//!
//! The private key is held as an opaque signing capability only: there is
//! no accessor for it, it is excluded from `Debug` output, and it is never
//! serialized or logged.

use josekit::{
    jwe::{JweEncrypter, RSA1_5},
    jws::{JwsSigner, JwsVerifier, RS256},
};
use openssl::{
    pkey::{PKey, Public},
    rsa::Rsa,
    x509::X509,
};

use crate::error::{Result, WalletError};

/// Parsed, immutable key handles for one partner.
///
/// Holds the partner's RS256 signing key, the matching verification key
/// (derived from the private key, used for creation-side self-verification
/// and inbound callback verification), and the platform's RSA public key
/// as a JWE encrypter.
///
/// # Accepted Encodings
///
/// - Private key: PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`)
///   PEM blocks. Any other block type fails with
///   [`WalletError::KeyFormat`].
/// - Public key: SPKI (`PUBLIC KEY`), PKCS#1 (`RSA PUBLIC KEY`), or a
///   full X.509 certificate, in which case the public key is extracted
///   from it.
///
/// Both keys must be RSA; the token protocol mandates RSA-family
/// algorithms end to end.
pub struct KeyMaterial {
    signer: Box<dyn JwsSigner + Send + Sync>,
    verifier: Box<dyn JwsVerifier + Send + Sync>,
    encrypter: Box<dyn JweEncrypter + Send + Sync>,
    partner_id: String,
    certificate_id: String,
}

impl KeyMaterial {
    /// Parses PEM key material into ready-to-use JOSE handles.
    ///
    /// # Arguments
    ///
    /// * `partner_private_pem` - partner's RSA private key (PKCS#1 or PKCS#8 PEM)
    /// * `platform_public_pem` - platform's RSA public key or X.509 certificate (PEM)
    /// * `partner_id` - partner identifier assigned by the platform
    /// * `certificate_id` - 4-character signing certificate code
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::KeyFormat`] if either input is undecodable,
    /// has an unsupported PEM block type, or is not an RSA key.
    pub fn from_pem(
        partner_private_pem: &[u8],
        platform_public_pem: &[u8],
        partner_id: impl Into<String>,
        certificate_id: impl Into<String>,
    ) -> Result<Self> {
        let private = PKey::private_key_from_pem(partner_private_pem)
            .map_err(|e| WalletError::KeyFormat(format!("partner private key: {e}")))?;
        if private.rsa().is_err() {
            return Err(WalletError::KeyFormat(
                "partner private key is not an RSA key".to_owned(),
            ));
        }

        // Normalize to PKCS#8 so josekit sees one encoding regardless of
        // which PEM block type the partner supplied.
        let private_pkcs8 = private
            .private_key_to_pem_pkcs8()
            .map_err(|e| WalletError::KeyFormat(format!("partner private key: {e}")))?;
        let signer = RS256
            .signer_from_pem(&private_pkcs8)
            .map_err(|e| WalletError::KeyFormat(format!("partner signing key: {e}")))?;

        // The verification key is the public half of the same pair.
        let partner_public = private
            .public_key_to_pem()
            .map_err(|e| WalletError::KeyFormat(format!("partner public key: {e}")))?;
        let verifier = RS256
            .verifier_from_pem(&partner_public)
            .map_err(|e| WalletError::KeyFormat(format!("partner verification key: {e}")))?;

        let platform = parse_public_key(platform_public_pem)?;
        let platform_spki = platform
            .public_key_to_pem()
            .map_err(|e| WalletError::KeyFormat(format!("platform public key: {e}")))?;
        // RSA1_5 key transport is mandated by the platform token
        // specification; it is not selectable here.
        #[allow(deprecated)]
        let encrypter = RSA1_5
            .encrypter_from_pem(&platform_spki)
            .map_err(|e| WalletError::KeyFormat(format!("platform encryption key: {e}")))?;

        Ok(Self {
            signer: Box::new(signer),
            verifier: Box::new(verifier),
            encrypter: Box::new(encrypter),
            partner_id: partner_id.into(),
            certificate_id: certificate_id.into(),
        })
    }

    /// Partner identifier embedded in every signed header.
    #[must_use]
    pub fn partner_id(&self) -> &str {
        &self.partner_id
    }

    /// Signing certificate identifier embedded in every signed header.
    #[must_use]
    pub fn certificate_id(&self) -> &str {
        &self.certificate_id
    }

    /// RS256 signer over the partner private key.
    pub(crate) fn signer(&self) -> &dyn JwsSigner {
        self.signer.as_ref()
    }

    /// RS256 verifier for tokens signed with the partner key pair.
    pub(crate) fn verifier(&self) -> &dyn JwsVerifier {
        self.verifier.as_ref()
    }

    /// JWE encrypter holding the platform public key.
    pub(crate) fn encrypter(&self) -> &dyn JweEncrypter {
        self.encrypter.as_ref()
    }
}

impl std::fmt::Debug for KeyMaterial {
    // Key handles are intentionally omitted: private key material must
    // never reach logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("partner_id", &self.partner_id)
            .field("certificate_id", &self.certificate_id)
            .finish_non_exhaustive()
    }
}

/// Parses a platform public key from SPKI PEM, PKCS#1 PEM, or an X.509
/// certificate, rejecting non-RSA keys.
fn parse_public_key(pem: &[u8]) -> Result<PKey<Public>> {
    if let Ok(key) = PKey::public_key_from_pem(pem) {
        if key.rsa().is_err() {
            return Err(WalletError::KeyFormat(
                "platform public key is not an RSA key".to_owned(),
            ));
        }
        return Ok(key);
    }

    if let Ok(rsa) = Rsa::public_key_from_pem_pkcs1(pem) {
        return PKey::from_rsa(rsa)
            .map_err(|e| WalletError::KeyFormat(format!("platform public key: {e}")));
    }

    if let Ok(cert) = X509::from_pem(pem) {
        let key = cert
            .public_key()
            .map_err(|e| WalletError::KeyFormat(format!("platform certificate: {e}")))?;
        if key.rsa().is_err() {
            return Err(WalletError::KeyFormat(
                "platform certificate does not contain an RSA public key".to_owned(),
            ));
        }
        return Ok(key);
    }

    Err(WalletError::KeyFormat(
        "platform public key must be an RSA public key or X.509 certificate in PEM format"
            .to_owned(),
    ))
}
