//! Typed wallet card payloads.
//!
//! The platform accepts card payloads as JSON with camelCase field names
//! and flattened dotted keys for grouped attributes (`barcode.value`,
//! `provision.data`). The types here encode that wire schema directly, so
//! a payload that compiles is structurally well-formed; the token layer
//! treats the result as opaque JSON.
//!
//! Cards are plain values constructed up front. There is no mutating
//! builder: collect the attributes, then call
//! [`WalletCard::event_ticket`].

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, WalletError},
    token::signer::now_millis,
};

/// Event ticket subtype recognized by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSubType {
    /// Concerts, theater, shows.
    Performances,
    /// Sports events and games.
    Sports,
    /// Movie tickets.
    Movies,
    /// General entrance tickets.
    #[default]
    Entrances,
    /// Anything else.
    Others,
}

/// Ticket usage classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketClassification {
    /// Single-use ticket. The platform default.
    Onetime,
    /// Reusable within the validity period.
    Regular,
    /// Valid for a year.
    Annual,
}

/// Attributes of an event ticket card.
///
/// Field names serialize to the exact wire keys the platform expects,
/// including the dotted group keys. `title`, `main_img`, `logo_image`,
/// and `provider_name` are required by the platform; everything else is
/// omitted from the JSON when `None`.
///
/// Construct with struct-update syntax:
///
/// ```
/// use wallet_link::card::TicketAttributes;
///
/// let attributes = TicketAttributes {
///     title: "Concert".to_owned(),
///     provider_name: "Example Tickets".to_owned(),
///     seat_number: Some("12A".to_owned()),
///     ..TicketAttributes::default()
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketAttributes {
    /// Main title, max 32 chars.
    pub title: String,
    /// Main ticket image URL.
    #[serde(rename = "mainImg")]
    pub main_img: String,
    /// Logo image URL.
    #[serde(rename = "logoImage")]
    pub logo_image: String,
    /// Ticket provider name, max 32 chars.
    #[serde(rename = "providerName")]
    pub provider_name: String,

    /// Dark-mode logo image URL.
    #[serde(rename = "logoImage.darkUrl", skip_serializing_if = "Option::is_none")]
    pub logo_image_dark_url: Option<String>,
    /// Light-mode logo image URL.
    #[serde(rename = "logoImage.lightUrl", skip_serializing_if = "Option::is_none")]
    pub logo_image_light_url: Option<String>,

    /// Auxiliary subtitle, max 32 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle1: Option<String>,
    /// Event identifier, max 32 chars.
    #[serde(rename = "eventId", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Grouping identifier for related tickets.
    #[serde(rename = "groupingId", skip_serializing_if = "Option::is_none")]
    pub grouping_id: Option<String>,
    /// Order identifier, max 32 chars.
    #[serde(rename = "orderId", skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Wide horizontal image URL.
    #[serde(rename = "wideImage", skip_serializing_if = "Option::is_none")]
    pub wide_image: Option<String>,
    /// Link to additional provider information.
    #[serde(rename = "providerViewLink", skip_serializing_if = "Option::is_none")]
    pub provider_view_link: Option<String>,
    /// Usage classification; the platform assumes single-use when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<TicketClassification>,
    /// Card holder name, max 64 chars.
    #[serde(rename = "holderName", skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    /// Ticket grade, max 32 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    /// Seat class, max 32 chars.
    #[serde(rename = "seatClass", skip_serializing_if = "Option::is_none")]
    pub seat_class: Option<String>,
    /// Entrance gate, max 64 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrance: Option<String>,
    /// Seat location, max 256 chars.
    #[serde(rename = "seatNumber", skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<String>,
    /// Seat layout image URL.
    #[serde(rename = "seatLayoutImage", skip_serializing_if = "Option::is_none")]
    pub seat_layout_image: Option<String>,
    /// Issue date, UTC milliseconds.
    #[serde(rename = "issueDate", skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<i64>,
    /// Reservation number, max 32 chars.
    #[serde(rename = "reservationNumber", skip_serializing_if = "Option::is_none")]
    pub reservation_number: Option<String>,
    /// User name, max 32 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Certification text, max 32 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certification: Option<String>,
    /// Event start, UTC milliseconds.
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    /// Event end, UTC milliseconds.
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<i64>,
    /// Person info as a JSON string, max 512 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person1: Option<String>,
    /// Locations as a JSON string, max 512 chars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<String>,
    /// Notice description, max 1024 chars.
    #[serde(rename = "noticeDesc", skip_serializing_if = "Option::is_none")]
    pub notice_desc: Option<String>,
    /// Free-form group line 1, max 32 chars.
    #[serde(rename = "groupInfo1", skip_serializing_if = "Option::is_none")]
    pub group_info1: Option<String>,
    /// Free-form group line 2, max 32 chars.
    #[serde(rename = "groupInfo2", skip_serializing_if = "Option::is_none")]
    pub group_info2: Option<String>,
    /// Free-form group line 3, max 32 chars.
    #[serde(rename = "groupInfo3", skip_serializing_if = "Option::is_none")]
    pub group_info3: Option<String>,
    /// Customer service info as a JSON string, max 512 chars.
    #[serde(rename = "csInfo", skip_serializing_if = "Option::is_none")]
    pub cs_info: Option<String>,
    /// Companion app link name, max 32 chars.
    #[serde(rename = "appLinkName", skip_serializing_if = "Option::is_none")]
    pub app_link_name: Option<String>,
    /// Companion app link logo URL.
    #[serde(rename = "appLinkLogo", skip_serializing_if = "Option::is_none")]
    pub app_link_logo: Option<String>,
    /// Companion app link data, max 512 chars.
    #[serde(rename = "appLinkData", skip_serializing_if = "Option::is_none")]
    pub app_link_data: Option<String>,

    /// Card background color.
    #[serde(rename = "bgColor", skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<String>,
    /// Font color, `light`, `dark`, or a hex value.
    #[serde(rename = "fontColor", skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    /// Blink color shown while the barcode is presented.
    #[serde(rename = "blinkColor", skip_serializing_if = "Option::is_none")]
    pub blink_color: Option<String>,

    /// Barcode value, max 4096 chars.
    #[serde(rename = "barcode.value", skip_serializing_if = "Option::is_none")]
    pub barcode_value: Option<String>,
    /// Barcode serial type, for example `QRCODE` or `BARCODE`.
    #[serde(rename = "barcode.serialType", skip_serializing_if = "Option::is_none")]
    pub barcode_serial_type: Option<String>,
    /// Barcode presentation format.
    #[serde(rename = "barcode.ptFormat", skip_serializing_if = "Option::is_none")]
    pub barcode_pt_format: Option<String>,
    /// Barcode presentation sub-format.
    #[serde(rename = "barcode.ptSubFormat", skip_serializing_if = "Option::is_none")]
    pub barcode_pt_sub_format: Option<String>,
    /// QR error correction level, `L`, `M`, `Q`, or `H`.
    #[serde(rename = "barcode.errorCorrectionLevel", skip_serializing_if = "Option::is_none")]
    pub barcode_error_correction_level: Option<String>,
    /// Barcode refresh interval.
    #[serde(rename = "barcode.interval", skip_serializing_if = "Option::is_none")]
    pub barcode_interval: Option<String>,

    /// Provisioning data, max 512 chars.
    #[serde(rename = "provision.data", skip_serializing_if = "Option::is_none")]
    pub provision_data: Option<String>,
    /// Provisioning refresh interval.
    #[serde(rename = "provision.interval", skip_serializing_if = "Option::is_none")]
    pub provision_interval: Option<String>,
}

/// Attributes overridden for one additional language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardLocalization {
    /// Language code, for example `ko` or `de`.
    pub language: String,
    /// Localized attribute values.
    pub attributes: TicketAttributes,
}

/// One card instance within a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCardData {
    /// Partner-side card reference, unique per card.
    #[serde(rename = "refId")]
    pub ref_id: String,
    /// Creation time, UTC milliseconds.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    /// Last update time, UTC milliseconds.
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    /// Primary language code.
    pub language: String,
    /// Ticket attribute values.
    pub attributes: TicketAttributes,
    /// Per-language attribute overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localization: Option<Vec<CardLocalization>>,
}

/// Card type and instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCardBody {
    /// Card type, `ticket` for event tickets.
    #[serde(rename = "type")]
    pub card_type: String,
    /// Ticket subtype.
    #[serde(rename = "subType")]
    pub sub_type: TicketSubType,
    /// Card instances, usually one.
    pub data: Vec<WalletCardData>,
}

/// Complete card payload as transmitted inside the token envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletCard {
    /// The card body.
    pub card: WalletCardBody,
}

impl WalletCard {
    /// Builds an event ticket payload with the default `entrances`
    /// subtype and English as the primary language.
    ///
    /// Creation and update timestamps are set to the current time.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Payload`] if `ref_id` or the title is
    /// empty; the platform rejects both.
    pub fn event_ticket(ref_id: impl Into<String>, attributes: TicketAttributes) -> Result<Self> {
        Self::event_ticket_localized(ref_id, TicketSubType::default(), "en", attributes)
    }

    /// Builds an event ticket payload with an explicit subtype and
    /// primary language.
    ///
    /// # Errors
    ///
    /// Same conditions as [`WalletCard::event_ticket`].
    pub fn event_ticket_localized(
        ref_id: impl Into<String>,
        sub_type: TicketSubType,
        language: impl Into<String>,
        attributes: TicketAttributes,
    ) -> Result<Self> {
        let ref_id = ref_id.into();
        if ref_id.is_empty() {
            return Err(WalletError::Payload("card ref_id is required".to_owned()));
        }
        if attributes.title.is_empty() {
            return Err(WalletError::Payload("ticket title is required".to_owned()));
        }

        let now = now_millis()?;
        Ok(Self {
            card: WalletCardBody {
                card_type: "ticket".to_owned(),
                sub_type,
                data: vec![WalletCardData {
                    ref_id,
                    created_at: now,
                    updated_at: now,
                    language: language.into(),
                    attributes,
                    localization: None,
                }],
            },
        })
    }

    /// The reference id of the first card instance.
    #[must_use]
    pub fn ref_id(&self) -> Option<&str> {
        self.card.data.first().map(|d| d.ref_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn concert_attributes() -> TicketAttributes {
        TicketAttributes {
            title: "Summer Concert".to_owned(),
            main_img: "https://example.com/main.png".to_owned(),
            logo_image: "https://example.com/logo.png".to_owned(),
            provider_name: "Example Tickets".to_owned(),
            seat_number: Some("12A".to_owned()),
            barcode_value: Some("TICKET-0001".to_owned()),
            barcode_serial_type: Some("QRCODE".to_owned()),
            ..TicketAttributes::default()
        }
    }

    #[test]
    fn test_event_ticket_shape() {
        let card = WalletCard::event_ticket("ref-001", concert_attributes()).unwrap();

        assert_eq!(card.card.card_type, "ticket");
        assert_eq!(card.card.sub_type, TicketSubType::Entrances);
        assert_eq!(card.card.data.len(), 1);
        assert_eq!(card.ref_id(), Some("ref-001"));
        assert_eq!(card.card.data[0].language, "en");
        assert_eq!(card.card.data[0].created_at, card.card.data[0].updated_at);
    }

    #[test]
    fn test_wire_serialization_uses_platform_keys() {
        let card = WalletCard::event_ticket("ref-001", concert_attributes()).unwrap();
        let value = serde_json::to_value(&card).unwrap();

        assert_eq!(value["card"]["type"], "ticket");
        assert_eq!(value["card"]["subType"], "entrances");
        let data = &value["card"]["data"][0];
        assert_eq!(data["refId"], "ref-001");
        assert_eq!(data["attributes"]["title"], "Summer Concert");
        assert_eq!(data["attributes"]["mainImg"], "https://example.com/main.png");
        assert_eq!(data["attributes"]["providerName"], "Example Tickets");
        assert_eq!(data["attributes"]["seatNumber"], "12A");
        assert_eq!(data["attributes"]["barcode.value"], "TICKET-0001");
        assert_eq!(data["attributes"]["barcode.serialType"], "QRCODE");
    }

    #[test]
    fn test_unset_optionals_are_omitted() {
        let card = WalletCard::event_ticket("ref-001", concert_attributes()).unwrap();
        let value = serde_json::to_value(&card).unwrap();

        let attributes = value["card"]["data"][0]["attributes"].as_object().unwrap();
        assert!(!attributes.contains_key("eventId"));
        assert!(!attributes.contains_key("provision.data"));
        assert!(!value["card"]["data"][0].as_object().unwrap().contains_key("localization"));
    }

    #[test]
    fn test_subtype_and_classification_wire_values() {
        assert_eq!(serde_json::to_value(TicketSubType::Performances).unwrap(), "performances");
        assert_eq!(serde_json::to_value(TicketSubType::Sports).unwrap(), "sports");
        assert_eq!(serde_json::to_value(TicketSubType::Movies).unwrap(), "movies");
        assert_eq!(serde_json::to_value(TicketSubType::Others).unwrap(), "others");
        assert_eq!(serde_json::to_value(TicketClassification::Onetime).unwrap(), "ONETIME");
        assert_eq!(serde_json::to_value(TicketClassification::Annual).unwrap(), "ANNUAL");
    }

    #[test]
    fn test_event_ticket_rejects_empty_ref_id() {
        let result = WalletCard::event_ticket("", concert_attributes());
        assert!(matches!(result, Err(WalletError::Payload(_))));
    }

    #[test]
    fn test_event_ticket_rejects_empty_title() {
        let attributes = TicketAttributes { title: String::new(), ..concert_attributes() };
        let result = WalletCard::event_ticket("ref-001", attributes);
        assert!(matches!(result, Err(WalletError::Payload(_))));
    }

    #[test]
    fn test_localized_constructor() {
        let card = WalletCard::event_ticket_localized(
            "ref-002",
            TicketSubType::Sports,
            "ko",
            concert_attributes(),
        )
        .unwrap();

        assert_eq!(card.card.sub_type, TicketSubType::Sports);
        assert_eq!(card.card.data[0].language, "ko");
    }

    #[test]
    fn test_deserializes_from_wire_form() {
        let wire = json!({
            "card": {
                "type": "ticket",
                "subType": "movies",
                "data": [{
                    "refId": "ref-9",
                    "createdAt": 1_700_000_000_000_i64,
                    "updatedAt": 1_700_000_000_000_i64,
                    "language": "en",
                    "attributes": {
                        "title": "Premiere",
                        "mainImg": "https://example.com/m.png",
                        "logoImage": "https://example.com/l.png",
                        "providerName": "Cinema",
                        "barcode.value": "ABC"
                    }
                }]
            }
        });

        let card: WalletCard = serde_json::from_value(wire).unwrap();
        assert_eq!(card.card.sub_type, TicketSubType::Movies);
        assert_eq!(card.card.data[0].attributes.barcode_value.as_deref(), Some("ABC"));
    }
}
