//! Inbound card state-change notifications.
//!
//! When a user adds, removes, or cancels a provisioned card on a device,
//! the platform notifies the partner with a signed token whose payload is
//! a readable claim set rather than ciphertext. [`CallbackVerifier`]
//! authenticates such tokens and extracts the event; it can also issue
//! them, which is how partner test suites and sandbox environments
//! produce realistic notifications.

use josekit::jws;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    error::{Result, WalletError},
    token::{
        keys::KeyMaterial,
        manager::{reject_non_rsa_alg, TokenManager},
        signer::now_millis,
    },
};

/// Lifetime of an issued callback token, seconds.
const CALLBACK_TOKEN_TTL_SECS: i64 = 3600;

/// Card lifecycle transition reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardState {
    /// The card was added to a device wallet.
    #[serde(rename = "ADDED")]
    Added,
    /// The card was removed from a device wallet.
    #[serde(rename = "DELETED")]
    Deleted,
    /// The card was canceled and can no longer be used.
    #[serde(rename = "CANCELED")]
    Canceled,
}

/// A verified card state-change notification.
///
/// Wire form uses snake_case keys (`partner_id`, `card_id`, `event`,
/// `country_code`, `timestamp`), unlike the camelCase card payload
/// schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStateEvent {
    /// Partner the notification is addressed to.
    pub partner_id: String,
    /// Card the event concerns.
    pub card_id: String,
    /// The lifecycle transition.
    pub event: CardState,
    /// ISO 3166-1 alpha-2 country code of the device, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Event time, UTC milliseconds, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Full claim set carried by a callback token: the event plus standard
/// freshness claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackClaims {
    /// The state-change event.
    #[serde(flatten)]
    pub event: CardStateEvent,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    /// Unique token id, for replay detection by the caller.
    pub jti: String,
}

/// Verifies and issues signed state-change callback tokens.
///
/// Verification runs in a fixed order and stops at the first failure:
/// structure, algorithm family, signature, claim decoding, partner
/// identity, expiry. The ordering matters for error fidelity; a forged
/// token must surface as [`WalletError::TokenInvalid`] even if it is
/// also expired.
#[derive(Debug, Clone)]
pub struct CallbackVerifier {
    manager: TokenManager,
}

impl CallbackVerifier {
    /// Creates a verifier over shared key material.
    #[must_use]
    pub fn new(manager: TokenManager) -> Self {
        Self { manager }
    }

    /// Verifies a callback token and returns the embedded event.
    ///
    /// # Errors
    ///
    /// - [`WalletError::TokenInvalid`]: malformed token, non-RSA `alg`,
    ///   bad signature, or undecodable claims. Do not process the event.
    /// - [`WalletError::IdentityMismatch`]: authentic token addressed to
    ///   a different partner.
    /// - [`WalletError::TokenExpired`]: authentic token past its `exp`.
    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<CardStateEvent> {
        reject_non_rsa_alg(token)?;

        let keys = self.manager.keys();
        let (payload, _header) = jws::deserialize_compact(token, keys.verifier())
            .map_err(|e| {
                warn!("callback signature verification failed");
                WalletError::TokenInvalid(format!("signature verification failed: {e}"))
            })?;

        let claims: CallbackClaims = serde_json::from_slice(&payload)
            .map_err(|e| WalletError::TokenInvalid(format!("undecodable claims: {e}")))?;

        if claims.event.partner_id != keys.partner_id() {
            warn!(
                token_partner = %claims.event.partner_id,
                "callback addressed to a different partner"
            );
            return Err(WalletError::IdentityMismatch(format!(
                "callback addressed to partner {:?}",
                claims.event.partner_id
            )));
        }

        let now = now_millis()? / 1000;
        if claims.exp <= now {
            return Err(WalletError::TokenExpired(format!(
                "callback expired {} seconds ago",
                now - claims.exp
            )));
        }

        Ok(claims.event)
    }

    /// Issues a signed callback token for `event`, valid for one hour.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Signing`] if the claim set cannot be
    /// serialized or signed.
    pub fn issue(&self, event: &CardStateEvent) -> Result<String> {
        self.issue_at(event, now_millis()? / 1000)
    }

    /// Issues a token with an explicit issued-at instant. Expiry testing
    /// hooks in here.
    fn issue_at(&self, event: &CardStateEvent, iat: i64) -> Result<String> {
        let claims = CallbackClaims {
            event: event.clone(),
            iat,
            exp: iat + CALLBACK_TOKEN_TTL_SECS,
            jti: Uuid::new_v4().to_string(),
        };
        self.manager.sign_claims(&claims)
    }
}
