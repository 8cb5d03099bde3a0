use base64ct::{Base64, Encoding};
use std::collections::HashMap;
use url::form_urlencoded;

use crate::{constants::ACCOUNT_DELIMITER, error::Error};

#[derive(Debug, PartialEq)]
pub struct UriParameters {
    pub protocol: String,
    pub topic: String,
    pub version: u32,
    pub sym_key: String,
    pub relay: RelayProtocolOptions,
    pub methods: Option<Vec<String>>,
    pub expiry_timestamp: Option<u64>,
}

#[derive(Debug, PartialEq)]
pub struct RelayProtocolOptions {
    pub protocol: String,
    pub data: Option<String>,
}

/// Parses the pairing uri returned by a session proposal, e.g.
/// `wc:<topic>@2?relay-protocol=irn&symKey=<key>`.
pub fn parse_uri(mut input: String) -> Result<UriParameters, Error> {
    if !input.contains("wc:") {
        if let Ok(decoded_bytes) = Base64::decode_vec(&input) {
            if let Ok(decoded_str) = String::from_utf8(decoded_bytes) {
                if decoded_str.contains("wc:") {
                    input = decoded_str;
                }
            }
        }
    }

    if input.contains("wc://") {
        input = input.replacen("wc://", "", 1);
    } else if input.contains("wc:") {
        input = input.replacen("wc:", "", 1);
    } else {
        return Err(Error::InvalidUri);
    }

    let path_end = input.find('?').ok_or(Error::PathEndNotFound)?;
    let path = &input[..path_end];
    let query_string = &input[path_end + 1..];

    let required_values: Vec<&str> = path.split('@').collect();

    if required_values.len() != 2 || required_values[0].is_empty() {
        return Err(Error::InvalidUri);
    }

    let mut query_params: HashMap<String, String> = HashMap::new();
    for (key, value) in form_urlencoded::parse(query_string.as_bytes()) {
        query_params.insert(key.into(), value.into());
    }

    let methods = query_params
        .get("methods")
        .map(|m| m.split(',').map(|s| s.to_string()).collect());

    Ok(UriParameters {
        protocol: "wc".to_string(),
        topic: parse_topic(required_values[0]),
        version: required_values[1].parse()?,
        sym_key: query_params
            .get("symKey")
            .ok_or(Error::SymKeyNotMentioned)?
            .to_string(),
        relay: parse_relay_params(&query_params)?,
        methods,
        expiry_timestamp: query_params
            .get("expiryTimestamp")
            .and_then(|v| v.parse().ok()),
    })
}

pub fn parse_topic(topic: &str) -> String {
    topic.strip_prefix("//").unwrap_or(topic).to_string()
}

pub fn parse_relay_params(
    params: &HashMap<String, String>,
) -> Result<RelayProtocolOptions, Error> {
    let protocol = params
        .get("relay-protocol")
        .ok_or(Error::RelayProtocolNotMentioned)?
        .clone();
    let data = params.get("relay-data").cloned();

    Ok(RelayProtocolOptions { protocol, data })
}

/// Splits a `<namespace>:<chainId>:<address>` session account.
pub fn split_account(account: &str) -> Option<(&str, &str, &str)> {
    let mut parts = account.splitn(3, ACCOUNT_DELIMITER);
    let namespace = parts.next()?;
    let reference = parts.next()?;
    let address = parts.next()?;
    Some((namespace, reference, address))
}

/// Removes duplicates, first occurrence wins.
pub fn dedupe<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
