//! # walletconnect-provider
//!
//! dApp side of a [WalletConnect v2](https://specs.walletconnect.com/2.0/)
//! session with a MultiversX wallet.
//!
//! ## Features
//! - Session lifecycle: init, connect, login, logout
//! - Recovery of a session persisted by the relay client
//! - Message, transaction and batch signing
//! - Relay event routing into `ProviderEvent` notifications
//!
//! The relay transport is not part of this crate: plug one in by implementing
//! `RelayClientFactory` and `RelayClient`.
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = ProviderConfig::new("D", DEFAULT_RELAY_URL, project_id);
//! let provider = WalletConnectProvider::new(config, Arc::new(MyRelayFactory))?;
//! let mut events = provider.subscribe();
//!
//! provider.init().await?;
//!
//! // `ProviderEvent::PairingUri` is published while login waits for the
//! // wallet, display it as a QR code
//! let address = provider.login(LoginOptions::default().token(login_token)).await?;
//!
//! let signed = provider.sign_transaction(transaction).await?;
//!
//! provider.logout(None).await?;
//! ```
//!
//! ## License
//! MIT OR Apache-2.0

pub mod address;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod operation;
pub mod params;
pub mod provider;
pub mod registry;
mod router;
pub mod signable;
mod signing;
pub mod types;
pub mod utils;

#[cfg(test)]
mod mock;

/// Exposed for easy access
pub use client::{
    Approval, ConnectResponse, RelayClient, RelayClientFactory, RelayConfig,
};
pub use config::{ClientOptions, ProviderConfig};
pub use error::Error;
pub use operation::Operation;
pub use params::ConnectOptions;
pub use provider::{LoginOptions, Phase, WalletConnectProvider};
pub use signable::{Signature, SignableMessage, Transaction};
pub use types::{ProviderEvent, RelayEvent};
