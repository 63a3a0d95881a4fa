//! Walks through issuing an event ticket and building both kinds of
//! Add-to-Wallet link.
//!
//! Run with: `cargo run --example event_ticket_link`
//!
//! Uses throwaway RSA keys so it runs without portal credentials; a real
//! integration loads its configuration with `WalletConfig::from_env`.

use openssl::{pkey::PKey, rsa::Rsa};
use wallet_link::{
    card::{TicketAttributes, TicketSubType, WalletCard},
    client::WalletClient,
    config::WalletConfig,
};

fn throwaway_pem_pair() -> (String, String) {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    (
        String::from_utf8(pkey.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        String::from_utf8(pkey.public_key_to_pem().unwrap()).unwrap(),
    )
}

fn main() -> wallet_link::Result<()> {
    let (partner_private, _) = throwaway_pem_pair();
    let (_, platform_public) = throwaway_pem_pair();

    let config = WalletConfig {
        partner_id: "demo-partner".to_owned(),
        partner_private_key_pem: partner_private,
        platform_public_key_pem: platform_public,
        certificate_id: "A1B2".to_owned(),
        base_url: None,
    };
    let client = WalletClient::new(&config)?;
    println!("client ready for partner {:?}\n", config.partner_id);

    let card = WalletCard::event_ticket_localized(
        "order-2024-001",
        TicketSubType::Performances,
        "en",
        TicketAttributes {
            title: "Summer Concert".to_owned(),
            main_img: "https://example.com/tickets/main.png".to_owned(),
            logo_image: "https://example.com/tickets/logo.png".to_owned(),
            provider_name: "Example Tickets".to_owned(),
            subtitle1: Some("Main Stage".to_owned()),
            seat_class: Some("VIP".to_owned()),
            seat_number: Some("12A".to_owned()),
            barcode_value: Some("TICKET-0001".to_owned()),
            barcode_serial_type: Some("QRCODE".to_owned()),
            ..TicketAttributes::default()
        },
    )?;
    println!("card payload:\n{}\n", serde_json::to_string_pretty(&card).unwrap());

    // Data transmit: the full card travels inside the link as a token.
    // The platform rejects stale tokens, so this is built at click time.
    let transmit = client.data_transmit_link(&card)?;
    println!("data-transmit link:\n{transmit}\n");

    let token = transmit.split("cdata=").nth(1).unwrap();
    let info = client.token_manager().peek_token_info(token)?;
    println!(
        "token header (unverified peek): partner={:?} cert={:?} ver={:?} utc={:?}\n",
        info.partner_id, info.certificate_id, info.version, info.utc
    );

    // Data fetch: the link only carries a reference; the platform calls
    // back and the partner serves the payload then.
    let fetch = client.data_fetch_link("order-2024-001")?;
    println!("data-fetch link:\n{}", fetch.url);
    println!("store this reference for the fetch callback: {}", fetch.reference);

    Ok(())
}
