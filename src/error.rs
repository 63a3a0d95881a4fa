//! Error types for the wallet-link crate.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Key errors** ([`WalletError::KeyFormat`]): unparseable or unsupported
//!   key material, raised once at client construction
//! - **Token construction errors** ([`WalletError::Encryption`],
//!   [`WalletError::Signing`]): cryptographic failures while issuing a token
//! - **Token verification errors** ([`WalletError::TokenInvalid`],
//!   [`WalletError::TokenExpired`], [`WalletError::IdentityMismatch`]):
//!   distinct rejection causes so callers can tell forgery from staleness
//!   from misconfiguration
//! - **Transport errors** ([`WalletError::Http`], [`WalletError::Api`]):
//!   HTTP communication failures and structured platform error responses
//!
//! # Examples
//!
//! ```
//! use wallet_link::error::{Result, WalletError};
//!
//! fn check_card_id(card_id: &str) -> Result<()> {
//!     if card_id.is_empty() {
//!         return Err(WalletError::InvalidLink("card id is required".to_owned()));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for wallet operations.
///
/// This is a convenience type that uses [`WalletError`] as the error type.
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, WalletError>;

/// Errors that can occur when issuing tokens, verifying callbacks, or
/// talking to the wallet platform.
///
/// Verification errors are deliberately split three ways: a bad signature or
/// malformed structure ([`TokenInvalid`](Self::TokenInvalid)) must never be
/// processed; a stale token ([`TokenExpired`](Self::TokenExpired)) is a
/// replay or clock issue, not a forgery; and a token signed for a different
/// partner ([`IdentityMismatch`](Self::IdentityMismatch)) usually means a
/// misconfigured partner id rather than an attack.
///
/// None of these are retried inside the crate. Re-encrypting and re-signing
/// the same payload with a fresh timestamp is indistinguishable from issuing
/// a new token, so retry policy belongs to the caller.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum WalletError {
    /// Key material could not be parsed or has an unsupported encoding.
    ///
    /// Raised at construction time when the partner private key is not a
    /// PKCS#1 or PKCS#8 RSA key, or the platform public key is not a bare
    /// RSA public key or X.509 certificate. Fatal: fix the configured PEM
    /// material before retrying.
    #[error("invalid key material: {0}")]
    KeyFormat(String),

    /// Payload encryption failed.
    ///
    /// Either the card payload could not be serialized to JSON or the JWE
    /// encryption step failed. Fatal per call; the same payload will fail
    /// again until the cause is addressed.
    #[error("envelope encryption failed: {0}")]
    Encryption(String),

    /// Envelope signing failed.
    ///
    /// The JWS signature over the encrypted envelope (or callback claims)
    /// could not be produced. Check the partner private key and system time.
    #[error("envelope signing failed: {0}")]
    Signing(String),

    /// Token is malformed, uses an unexpected algorithm, or its signature
    /// does not verify.
    ///
    /// The embedded event must not be processed. This covers structural
    /// problems (wrong segment count, undecodable header), algorithm
    /// substitution attempts, and signature mismatches alike.
    #[error("invalid token: {0}")]
    TokenInvalid(String),

    /// Token is authentic but its expiry time has passed.
    ///
    /// Distinct from [`TokenInvalid`](Self::TokenInvalid) so callers can
    /// treat replayed or stale tokens differently from forged ones.
    #[error("token expired: {0}")]
    TokenExpired(String),

    /// Token is authentically signed but was issued for a different partner.
    ///
    /// Treat as a potential misconfiguration alert: either the verifier or
    /// the sender is using the wrong partner identifier.
    #[error("partner identity mismatch: {0}")]
    IdentityMismatch(String),

    /// Card payload could not be serialized or a response body could not be
    /// decoded.
    #[error("payload error: {0}")]
    Payload(String),

    /// Configuration is incomplete or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Add-to-Wallet link inputs are invalid.
    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// HTTP request to the wallet platform failed.
    ///
    /// Wraps [`reqwest::Error`]: timeouts, connection failures, TLS errors.
    /// Transient; the transport caller may retry.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The wallet platform returned a structured error response.
    #[error("platform error {code}: {message}")]
    Api {
        /// Machine-readable error code from the platform.
        code: String,
        /// Human-readable message.
        message: String,
        /// Optional additional detail.
        details: Option<String>,
    },
}

impl WalletError {
    /// Returns a stable machine-readable code for this error.
    ///
    /// HTTP-layer callers use this to map a failure to a status code
    /// without string-matching on display output.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::KeyFormat(_) => "KEY_FORMAT_ERROR",
            Self::Encryption(_) => "ENCRYPTION_ERROR",
            Self::Signing(_) => "SIGNING_ERROR",
            Self::TokenInvalid(_) => "TOKEN_INVALID",
            Self::TokenExpired(_) => "TOKEN_EXPIRED",
            Self::IdentityMismatch(_) => "IDENTITY_MISMATCH",
            Self::Payload(_) => "PAYLOAD_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidLink(_) => "INVALID_LINK",
            Self::Http(_) => "HTTP_ERROR",
            Self::Api { code, .. } => code,
        }
    }
}
