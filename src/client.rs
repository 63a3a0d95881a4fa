//! HTTP client for the wallet platform and Add-to-Wallet link assembly.

use std::{sync::Arc, time::Duration};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    card::WalletCard,
    config::WalletConfig,
    error::{Result, WalletError},
    token::{CallbackVerifier, CardStateEvent, KeyMaterial, TokenManager},
};

const PATH_UPDATE_CARD: &str = "/v1/wallet/card/update";
const PATH_CANCEL_CARD: &str = "/v1/wallet/card/cancel";
const PATH_GET_CARD: &str = "/v1/wallet/card/get";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A data-fetch Add-to-Wallet link and the reference the platform will
/// present back when it fetches the card.
///
/// The caller must persist the `reference` to card-payload mapping; the
/// platform's fetch request carries only the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLink {
    /// The link to hand to the user.
    pub url: String,
    /// Opaque reference embedded in the link, unique per call.
    pub reference: String,
}

#[derive(Serialize)]
struct UpdateCardRequest<'a> {
    partner_id: &'a str,
    card_id: &'a str,
    card_data: &'a WalletCard,
    country_code: &'a str,
}

#[derive(Serialize)]
struct CancelCardRequest<'a> {
    partner_id: &'a str,
    event_id: &'a str,
    reason: &'a str,
}

#[derive(Serialize)]
struct GetCardRequest<'a> {
    partner_id: &'a str,
    card_id: &'a str,
    country_code: &'a str,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    details: Option<String>,
}

/// Entry point for one partner integration.
///
/// Wraps the token pipeline, callback verification, Add-to-Wallet link
/// assembly, and the card management HTTP API behind a single handle.
/// Construction parses the configured key material once; the client is
/// cheap to clone and safe to share across tasks.
#[derive(Debug, Clone)]
pub struct WalletClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
    callbacks: CallbackVerifier,
    partner_id: String,
    certificate_id: String,
}

impl WalletClient {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InvalidConfig`] if the configuration fails
    ///   validation.
    /// - [`WalletError::KeyFormat`] if either PEM input is unusable.
    pub fn new(config: &WalletConfig) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeyMaterial::from_pem(
            config.partner_private_key_pem.as_bytes(),
            config.platform_public_key_pem.as_bytes(),
            config.partner_id.clone(),
            config.certificate_id.clone(),
        )?);

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(WalletError::Http)?;

        let tokens = TokenManager::new(keys);
        let callbacks = CallbackVerifier::new(tokens.clone());

        info!(partner_id = %config.partner_id, "wallet client initialized");
        Ok(Self {
            http,
            base_url: config.base_url().trim_end_matches('/').to_owned(),
            tokens,
            callbacks,
            partner_id: config.partner_id.clone(),
            certificate_id: config.certificate_id.clone(),
        })
    }

    /// Builds a data-transmit Add-to-Wallet link carrying the full card
    /// payload as a freshly issued token.
    ///
    /// The platform enforces a short freshness window on the embedded
    /// token, so build the link at click time, not ahead of it.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InvalidLink`] if the card has no reference id.
    /// - [`WalletError::Encryption`] / [`WalletError::Signing`] if token
    ///   issuance fails.
    #[instrument(skip_all)]
    pub fn data_transmit_link(&self, card: &WalletCard) -> Result<String> {
        let card_id = card
            .ref_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| WalletError::InvalidLink("card has no reference id".to_owned()))?;

        let token = self.tokens.issue_card_token(card)?;
        debug!(card_id, "data-transmit link issued");
        Ok(format!("{}/atw/v3/{card_id}#Clip?cdata={token}", self.base_url))
    }

    /// Builds a data-fetch Add-to-Wallet link.
    ///
    /// No card data travels in the link; the platform calls back with
    /// the returned reference and the partner serves the payload then.
    /// The reference is a fresh UUID, so repeated calls for the same
    /// card yield distinct links.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::InvalidLink`] if `card_id` is empty.
    pub fn data_fetch_link(&self, card_id: &str) -> Result<FetchLink> {
        if card_id.is_empty() {
            return Err(WalletError::InvalidLink("card id is required".to_owned()));
        }

        let reference = Uuid::new_v4().to_string();
        let url = format!(
            "{}/atw/v3/{}/{card_id}#Clip?pdata={reference}",
            self.base_url, self.certificate_id
        );
        Ok(FetchLink { url, reference })
    }

    /// Pushes updated card data to the platform.
    ///
    /// # Errors
    ///
    /// [`WalletError::Http`] for transport failures, [`WalletError::Api`]
    /// when the platform rejects the update.
    #[instrument(skip_all, fields(card_id = %card_id))]
    pub async fn update_card(
        &self,
        card_id: &str,
        card: &WalletCard,
        country_code: &str,
    ) -> Result<()> {
        let request = UpdateCardRequest {
            partner_id: &self.partner_id,
            card_id,
            card_data: card,
            country_code,
        };
        let path = format!("{PATH_UPDATE_CARD}/{country_code}");
        self.post(&path, &request).await?;
        Ok(())
    }

    /// Cancels all cards issued for an event.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`update_card`](Self::update_card).
    #[instrument(skip_all, fields(event_id = %event_id))]
    pub async fn cancel_card(&self, event_id: &str, reason: &str) -> Result<()> {
        let request = CancelCardRequest {
            partner_id: &self.partner_id,
            event_id,
            reason,
        };
        self.post(PATH_CANCEL_CARD, &request).await?;
        Ok(())
    }

    /// Fetches the platform's current view of a card.
    ///
    /// The response shape is platform-defined and returned as raw JSON.
    ///
    /// # Errors
    ///
    /// [`WalletError::Http`], [`WalletError::Api`], or
    /// [`WalletError::Payload`] if the response body is not JSON.
    #[instrument(skip_all, fields(card_id = %card_id))]
    pub async fn get_card(&self, card_id: &str, country_code: &str) -> Result<serde_json::Value> {
        let request = GetCardRequest {
            partner_id: &self.partner_id,
            card_id,
            country_code,
        };
        let path = format!("{PATH_GET_CARD}/{country_code}");
        let body = self.post(&path, &request).await?;
        serde_json::from_slice(&body)
            .map_err(|e| WalletError::Payload(format!("undecodable card response: {e}")))
    }

    /// Parses an unsigned JSON callback body and checks it is addressed
    /// to this partner.
    ///
    /// For signed callback tokens use
    /// [`verify_signed_callback`](Self::verify_signed_callback) instead;
    /// this entry point performs no cryptographic verification.
    ///
    /// # Errors
    ///
    /// - [`WalletError::Payload`] if the body is not a callback document.
    /// - [`WalletError::IdentityMismatch`] if it names another partner.
    pub fn handle_callback(&self, body: &[u8]) -> Result<CardStateEvent> {
        let event: CardStateEvent = serde_json::from_slice(body)
            .map_err(|e| WalletError::Payload(format!("undecodable callback: {e}")))?;

        if event.partner_id != self.partner_id {
            warn!(callback_partner = %event.partner_id, "callback addressed to a different partner");
            return Err(WalletError::IdentityMismatch(format!(
                "callback addressed to partner {:?}",
                event.partner_id
            )));
        }
        Ok(event)
    }

    /// Verifies a signed callback token and returns the embedded event.
    ///
    /// # Errors
    ///
    /// See [`CallbackVerifier::verify`].
    pub fn verify_signed_callback(&self, token: &str) -> Result<CardStateEvent> {
        self.callbacks.verify(token)
    }

    /// The token pipeline, for callers that manage links themselves.
    #[must_use]
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// The callback verifier.
    #[must_use]
    pub fn callback_verifier(&self) -> &CallbackVerifier {
        &self.callbacks
    }

    /// The effective platform endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize>(&self, path: &str, request: &T) -> Result<Vec<u8>> {
        let url = format!("{}{path}", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            return Ok(body.to_vec());
        }

        warn!(%status, path, "platform request rejected");
        match serde_json::from_slice::<ApiErrorBody>(&body) {
            Ok(error) => Err(WalletError::Api {
                code: error.code,
                message: error.message,
                details: error.details,
            }),
            Err(_) => Err(WalletError::Api {
                code: status_code_name(status),
                message: String::from_utf8_lossy(&body).into_owned(),
                details: None,
            }),
        }
    }
}

fn status_code_name(status: StatusCode) -> String {
    format!("HTTP_{}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        card::TicketAttributes,
        token::{testkeys, CardState},
    };

    fn client() -> WalletClient {
        let (partner_private, _) = testkeys::rsa_pem_pair();
        let (_, platform_public) = testkeys::rsa_pem_pair();
        let config = WalletConfig {
            partner_id: "partner-123".to_owned(),
            partner_private_key_pem: String::from_utf8(partner_private).unwrap(),
            platform_public_key_pem: String::from_utf8(platform_public).unwrap(),
            certificate_id: "A1B2".to_owned(),
            base_url: None,
        };
        WalletClient::new(&config).unwrap()
    }

    fn concert_card(ref_id: &str) -> WalletCard {
        let attributes = TicketAttributes {
            title: "Summer Concert".to_owned(),
            provider_name: "Example Tickets".to_owned(),
            ..TicketAttributes::default()
        };
        WalletCard::event_ticket(ref_id, attributes).unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = WalletConfig {
            partner_id: String::new(),
            partner_private_key_pem: "x".to_owned(),
            platform_public_key_pem: "y".to_owned(),
            certificate_id: "A1B2".to_owned(),
            base_url: None,
        };
        assert!(matches!(WalletClient::new(&config), Err(WalletError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_bad_key_material() {
        let config = WalletConfig {
            partner_id: "partner-123".to_owned(),
            partner_private_key_pem: "not a pem".to_owned(),
            platform_public_key_pem: "not a pem".to_owned(),
            certificate_id: "A1B2".to_owned(),
            base_url: None,
        };
        assert!(matches!(WalletClient::new(&config), Err(WalletError::KeyFormat(_))));
    }

    #[test]
    fn test_data_transmit_link_shape() {
        let client = client();
        let link = client.data_transmit_link(&concert_card("ref-001")).unwrap();

        assert!(link.starts_with("https://a.swallet.link/atw/v3/ref-001#Clip?cdata="));
        let token = link.split("cdata=").nth(1).unwrap();
        assert_eq!(token.split('.').count(), 3, "link must embed a signed token");
        client.token_manager().verify(token).unwrap();
    }

    #[test]
    fn test_data_fetch_link_shape() {
        let client = client();
        let link = client.data_fetch_link("card-42").unwrap();

        assert!(link.url.starts_with("https://a.swallet.link/atw/v3/A1B2/card-42#Clip?pdata="));
        assert!(link.url.ends_with(&link.reference));
        Uuid::parse_str(&link.reference).expect("reference should be a UUID");
    }

    #[test]
    fn test_data_fetch_links_are_unique() {
        let client = client();
        let a = client.data_fetch_link("card-42").unwrap();
        let b = client.data_fetch_link("card-42").unwrap();
        assert_ne!(a.reference, b.reference);
    }

    #[test]
    fn test_data_fetch_link_rejects_empty_card_id() {
        assert!(matches!(
            client().data_fetch_link(""),
            Err(WalletError::InvalidLink(_))
        ));
    }

    #[test]
    fn test_handle_callback_accepts_own_partner() {
        let client = client();
        let body = br#"{"partner_id":"partner-123","card_id":"card-7","event":"DELETED","country_code":"DE"}"#;

        let event = client.handle_callback(body).unwrap();
        assert_eq!(event.event, CardState::Deleted);
        assert_eq!(event.card_id, "card-7");
    }

    #[test]
    fn test_handle_callback_rejects_foreign_partner() {
        let client = client();
        let body = br#"{"partner_id":"partner-999","card_id":"card-7","event":"ADDED"}"#;

        assert!(matches!(
            client.handle_callback(body),
            Err(WalletError::IdentityMismatch(_))
        ));
    }

    #[test]
    fn test_handle_callback_rejects_garbage() {
        assert!(matches!(
            client().handle_callback(b"not json"),
            Err(WalletError::Payload(_))
        ));
    }

    #[test]
    fn test_custom_base_url_is_used_in_links() {
        let (partner_private, _) = testkeys::rsa_pem_pair();
        let (_, platform_public) = testkeys::rsa_pem_pair();
        let config = WalletConfig {
            partner_id: "partner-123".to_owned(),
            partner_private_key_pem: String::from_utf8(partner_private).unwrap(),
            platform_public_key_pem: String::from_utf8(platform_public).unwrap(),
            certificate_id: "A1B2".to_owned(),
            base_url: Some("https://sandbox.example.com/".to_owned()),
        };
        let client = WalletClient::new(&config).unwrap();

        let link = client.data_fetch_link("card-1").unwrap();
        assert!(link.url.starts_with("https://sandbox.example.com/atw/v3/"));
    }
}
