//! Wallet card provisioning over signed, encrypted token envelopes.
//!
//! This crate issues the tokens a wallet-provisioning platform requires
//! to accept card data from an issuing partner, and verifies the signed
//! state-change notifications the platform sends back. Card payloads are
//! sealed in two fixed stages: encrypted to the platform's RSA public
//! key as a JWE envelope, then signed with the partner's RSA private key
//! as a JWS whose protected header carries the partner identity and a
//! freshness timestamp.
//!
//! # Quick Start
//!
//! ```no_run
//! use wallet_link::{
//!     card::{TicketAttributes, WalletCard},
//!     client::WalletClient,
//!     config::WalletConfig,
//! };
//!
//! # fn main() -> wallet_link::error::Result<()> {
//! let config = WalletConfig::from_env()?;
//! let client = WalletClient::new(&config)?;
//!
//! let card = WalletCard::event_ticket(
//!     "order-2024-001",
//!     TicketAttributes {
//!         title: "Summer Concert".to_owned(),
//!         provider_name: "Example Tickets".to_owned(),
//!         ..TicketAttributes::default()
//!     },
//! )?;
//!
//! // Build at click time; the embedded token expires within seconds.
//! let link = client.data_transmit_link(&card)?;
//! println!("{link}");
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`token`]: the envelope protocol (encrypt-then-sign, verification,
//!   callback tokens)
//! - [`card`]: typed card payloads
//! - [`client`]: Add-to-Wallet links and the card management HTTP API
//! - [`config`]: partner credentials and endpoints
//! - [`error`]: the crate-wide error type
//!
//! # Security Notes
//!
//! The partner private key is parsed once into an opaque signing handle,
//! wiped from configuration memory on drop, and excluded from all
//! `Debug` output. Inbound tokens are verified in a fixed order that
//! rejects non-RSA algorithms before any signature math runs.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod card;
pub mod client;
pub mod config;
pub mod error;
pub mod token;

pub use card::{TicketAttributes, TicketSubType, WalletCard};
pub use client::{FetchLink, WalletClient};
pub use config::WalletConfig;
pub use error::{Result, WalletError};
pub use token::{CallbackVerifier, CardState, CardStateEvent, TokenManager};
