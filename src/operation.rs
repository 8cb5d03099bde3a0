use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Methods exchanged with the wallet over a session request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "multiversx_signTransaction")]
    SignTransaction,

    #[serde(rename = "multiversx_signTransactions")]
    SignTransactions,

    #[serde(rename = "multiversx_signMessage")]
    SignMessage,

    #[serde(rename = "multiversx_signLoginToken")]
    SignLoginToken,

    #[serde(rename = "multiversx_signNativeAuthToken")]
    SignNativeAuthToken,

    #[serde(rename = "multiversx_cancelAction")]
    CancelAction,
}

impl Operation {
    /// Methods every session proposal requires.
    pub const BASELINE: [Operation; 4] = [
        Operation::SignTransaction,
        Operation::SignTransactions,
        Operation::SignMessage,
        Operation::SignLoginToken,
    ];

    pub const OPTIONAL: [Operation; 2] =
        [Operation::SignNativeAuthToken, Operation::CancelAction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignTransaction => "multiversx_signTransaction",
            Self::SignTransactions => "multiversx_signTransactions",
            Self::SignMessage => "multiversx_signMessage",
            Self::SignLoginToken => "multiversx_signLoginToken",
            Self::SignNativeAuthToken => "multiversx_signNativeAuthToken",
            Self::CancelAction => "multiversx_cancelAction",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operation {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_plain::from_str(s).map_err(|e| {
            crate::Error::InternalError(format!("unknown operation {s}: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for op in Operation::BASELINE.iter().chain(Operation::OPTIONAL.iter()) {
            assert_eq!(serde_plain::to_string(op).unwrap(), op.to_string());
            assert_eq!(Operation::from_str(op.as_str()).unwrap(), *op);
        }
    }

    #[test]
    fn test_unknown_operation() {
        assert!(Operation::from_str("erd_signTransaction").is_err());
    }
}
