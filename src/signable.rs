use alloy::hex;
use alloy::primitives::Bytes;
use serde_json::Value;

use crate::address::UserAddress;
use crate::error::Result;

/// Raw signature bytes returned by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(Bytes);

impl Signature {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Accepts both plain and `0x` prefixed hex.
    pub fn from_hex(value: &str) -> Result<Self> {
        Ok(Self(Bytes::from(hex::decode(value)?)))
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Anything the wallet can sign with `multiversx_signMessage`.
pub trait SignableMessage {
    fn message(&self) -> String;

    fn apply_signature(
        &mut self,
        signature: Signature,
        signer: &UserAddress,
    ) -> Result<()>;
}

/// A transaction the wallet can sign.
///
/// `to_plain_object` produces the JSON shape sent over the relay, the
/// provider never inspects it beyond the chain id check.
pub trait Transaction {
    fn chain_id(&self) -> &str;

    fn to_plain_object(&self, sender: &UserAddress) -> Result<Value>;

    fn apply_signature(
        &mut self,
        signature: Signature,
        signer: &UserAddress,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_hex() {
        let sig = Signature::from_hex("0xdeadbeef").unwrap();
        assert_eq!(sig.hex(), "deadbeef");
        assert_eq!(sig.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(Signature::from_hex("deadbeef").unwrap(), sig);
        assert!(Signature::from_hex("zz").is_err());
    }
}
