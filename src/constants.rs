// WalletConnect namespace for MultiversX
pub const WALLETCONNECT_MULTIVERSX_NAMESPACE: &str = "mvx";

// Human readable part of a MultiversX bech32 account address
pub const ADDRESS_HRP: &str = "erd";

pub const DEFAULT_RELAY_URL: &str = "wss://relay.walletconnect.com";

pub const ACCOUNT_DELIMITER: &str = ":";

// https://github.com/WalletConnect/walletconnect-monorepo/blob/v2.0/packages/utils/src/errors.ts
pub const USER_DISCONNECTED_CODE: i64 = 6000;
pub const USER_DISCONNECTED_MESSAGE: &str = "User disconnected.";

pub const EVENT_CHANNEL_CAPACITY: usize = 64;
