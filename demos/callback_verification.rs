//! Demonstrates verification of signed card state-change callbacks,
//! including the rejection paths.
//!
//! Run with: `cargo run --example callback_verification`

use openssl::{pkey::PKey, rsa::Rsa};
use wallet_link::{
    client::WalletClient,
    config::WalletConfig,
    token::{CardState, CardStateEvent},
};

fn throwaway_pem_pair() -> (String, String) {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    (
        String::from_utf8(pkey.private_key_to_pem_pkcs8().unwrap()).unwrap(),
        String::from_utf8(pkey.public_key_to_pem().unwrap()).unwrap(),
    )
}

fn demo_client(partner_id: &str) -> WalletClient {
    let (partner_private, _) = throwaway_pem_pair();
    let (_, platform_public) = throwaway_pem_pair();
    WalletClient::new(&WalletConfig {
        partner_id: partner_id.to_owned(),
        partner_private_key_pem: partner_private,
        platform_public_key_pem: platform_public,
        certificate_id: "A1B2".to_owned(),
        base_url: None,
    })
    .unwrap()
}

fn main() -> wallet_link::Result<()> {
    let client = demo_client("demo-partner");

    // A user added the card to their wallet; the platform notifies us
    // with a signed token. issue() stands in for the platform here.
    let event = CardStateEvent {
        partner_id: "demo-partner".to_owned(),
        card_id: "order-2024-001".to_owned(),
        event: CardState::Added,
        country_code: Some("US".to_owned()),
        timestamp: None,
    };
    let token = client.callback_verifier().issue(&event)?;
    println!("signed callback token ({} chars)\n", token.len());

    let verified = client.verify_signed_callback(&token)?;
    println!(
        "verified: card {:?} was {:?} in {:?}\n",
        verified.card_id, verified.event, verified.country_code
    );

    // Rejection 1: token signed with someone else's keys.
    let imposter = demo_client("demo-partner");
    let forged = imposter.callback_verifier().issue(&event)?;
    println!("foreign signature: {:?}\n", client.verify_signed_callback(&forged).unwrap_err());

    // Rejection 2: authentic token addressed to another partner.
    let other_event = CardStateEvent {
        partner_id: "someone-else".to_owned(),
        ..event.clone()
    };
    let misaddressed = client.callback_verifier().issue(&other_event)?;
    println!(
        "wrong partner: {:?}\n",
        client.verify_signed_callback(&misaddressed).unwrap_err()
    );

    // Rejection 3: tampered claims.
    let mut parts: Vec<&str> = token.split('.').collect();
    parts[1] = "eyJmb3JnZWQiOnRydWV9";
    let tampered = parts.join(".");
    println!("tampered claims: {:?}", client.verify_signed_callback(&tampered).unwrap_err());

    Ok(())
}
