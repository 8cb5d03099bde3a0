/// Address
///
/// Validation of MultiversX bech32 account addresses received from a wallet.
///
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::constants::ADDRESS_HRP;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserAddress {
    value: String,
}

impl UserAddress {
    pub fn from_bech32(value: &str) -> Result<Self> {
        let (hrp, _data) = bech32::decode(value)
            .map_err(|_| Error::InvalidAddress(value.to_string()))?;

        if hrp.as_str() != ADDRESS_HRP {
            return Err(Error::InvalidAddress(value.to_string()));
        }

        Ok(Self {
            value: value.to_string(),
        })
    }

    pub fn bech32(&self) -> &str {
        &self.value
    }
}

impl Display for UserAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for UserAddress {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_bech32(s)
    }
}

/// Never fails: any decoding problem or foreign prefix is `false`.
pub fn address_is_valid(address: &str) -> bool {
    UserAddress::from_bech32(address).is_ok()
}

#[cfg(test)]
pub(crate) fn test_address(fill: u8) -> String {
    let hrp = bech32::Hrp::parse(ADDRESS_HRP).unwrap();
    bech32::encode::<bech32::Bech32>(hrp, &[fill; 32]).unwrap()
}
