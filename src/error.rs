use std::fmt::{self, Display};

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    // Provider lifecycle
    NotInitialized,
    UnableToInit,
    UnableToConnect,
    UnableToConnectExisting,
    UnableToLogin,
    UnableToSignLoginToken,
    SessionNotConnected,
    InvalidAddress(String),

    // Signing
    RequestDifferentChain,
    InvalidMessageResponse,
    InvalidMessageSignature,
    InvalidTransactionResponse,
    TransactionError(String),
    InvalidCustomRequestResponse,

    // wc: uri parsing
    RelayProtocolNotMentioned,
    InvalidUri,
    SymKeyNotMentioned,
    PathEndNotFound,

    InvalidConfig(String),
    Transport(String),
    ParseInt(std::num::ParseIntError),
    Anyhow(anyhow::Error),
    InternalError(String),
    SerdeJsonError(serde_json::Error),
    FromHexError(alloy::hex::FromHexError),
    UrlError(url::ParseError),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotInitialized => {
                write!(f, "WalletConnect is not initialized, call init() first")
            }
            Error::UnableToInit => write!(f, "WalletConnect is unable to init"),
            Error::UnableToConnect => {
                write!(f, "WalletConnect is unable to connect")
            }
            Error::UnableToConnectExisting => write!(
                f,
                "WalletConnect is unable to connect to existing pairing"
            ),
            Error::UnableToLogin => write!(f, "WalletConnect is unable to login"),
            Error::UnableToSignLoginToken => {
                write!(f, "WalletConnect could not sign login token")
            }
            Error::SessionNotConnected => write!(f, "Session is not connected"),
            Error::InvalidAddress(address) => {
                write!(f, "Invalid address {address}")
            }
            Error::RequestDifferentChain => write!(
                f,
                "Transaction Chain Id different than Connection Chain Id"
            ),
            Error::InvalidMessageResponse => {
                write!(f, "WalletConnect could not sign the message")
            }
            Error::InvalidMessageSignature => {
                write!(f, "Invalid message signature")
            }
            Error::InvalidTransactionResponse => write!(
                f,
                "WalletConnect could not sign the transactions. Invalid signatures."
            ),
            Error::TransactionError(e) => write!(f, "Transaction error: {e}"),
            Error::InvalidCustomRequestResponse => {
                write!(f, "WalletConnect could not send the custom request")
            }
            Error::RelayProtocolNotMentioned => {
                write!(f, "relay-protocol is missing from the uri")
            }
            Error::InvalidUri => write!(f, "Invalid WalletConnect uri"),
            Error::SymKeyNotMentioned => write!(f, "symKey is missing from the uri"),
            Error::PathEndNotFound => write!(f, "Uri has no query string"),
            Error::InvalidConfig(e) => write!(f, "Invalid config: {e}"),
            Error::Transport(e) => write!(f, "Relay transport error: {e}"),
            Error::ParseInt(e) => write!(f, "{e}"),
            Error::Anyhow(e) => write!(f, "{e}"),
            Error::InternalError(e) => write!(f, "{e}"),
            Error::SerdeJsonError(e) => write!(f, "{e}"),
            Error::FromHexError(e) => write!(f, "{e}"),
            Error::UrlError(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::InternalError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::InternalError(e)
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Error::ParseInt(e)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Anyhow(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerdeJsonError(e)
    }
}

impl From<alloy::hex::FromHexError> for Error {
    fn from(e: alloy::hex::FromHexError) -> Self {
        Error::FromHexError(e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::UrlError(e)
    }
}
