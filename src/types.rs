/// Types
///
/// Data model shared between the provider and the relay client: sessions,
/// pairings, namespaces, request payloads and the events flowing in both
/// directions.
///
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{
    USER_DISCONNECTED_CODE, USER_DISCONNECTED_MESSAGE,
    WALLETCONNECT_MULTIVERSX_NAMESPACE,
};
use crate::utils::split_account;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,
    #[serde(default)]
    pub chains: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub metadata: Metadata,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub topic: String,
    #[serde(rename = "pairingTopic")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    pub namespaces: HashMap<String, Namespace>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<Participant>,
}

impl Session {
    /// Address of the first account under the MultiversX namespace, empty
    /// when the wallet shared none.
    pub fn address(&self) -> String {
        self.namespaces
            .get(WALLETCONNECT_MULTIVERSX_NAMESPACE)
            .and_then(|n| n.accounts.as_ref())
            .and_then(|accounts| accounts.first())
            .and_then(|account| split_account(account))
            .map(|(_, _, address)| address.to_string())
            .unwrap_or_default()
    }

    pub fn with_namespaces(
        &self,
        namespaces: HashMap<String, Namespace>,
    ) -> Session {
        Session {
            namespaces,
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub topic: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
    #[serde(rename = "peerMetadata")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_metadata: Option<Metadata>,
}

/// Session proposal handed to the relay client's `connect`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalParams {
    #[serde(rename = "pairingTopic")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_topic: Option<String>,
    #[serde(rename = "requiredNamespaces")]
    pub required_namespaces: HashMap<String, Namespace>,
    #[serde(rename = "optionalNamespaces")]
    pub optional_namespaces: HashMap<String, Namespace>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    pub params: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    pub topic: String,
    pub request: RequestArguments,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorReason {
    pub code: i64,
    pub message: String,
}

impl ErrorReason {
    pub fn user_disconnected() -> Self {
        Self {
            code: USER_DISCONNECTED_CODE,
            message: USER_DISCONNECTED_MESSAGE.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionEventParams {
    pub event: SessionEvent,
    #[serde(rename = "chainId")]
    pub chain_id: String,
}

/// Events delivered by the relay client's subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayEvent {
    SessionUpdate {
        topic: String,
        namespaces: HashMap<String, Namespace>,
    },
    SessionEvent {
        topic: String,
        params: SessionEventParams,
    },
    SessionDelete {
        topic: String,
    },
    SessionExpire {
        topic: String,
    },
    PairingDelete {
        topic: String,
    },
    PairingExpire {
        topic: String,
    },
}

impl RelayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session_update",
            Self::SessionEvent { .. } => "session_event",
            Self::SessionDelete { .. } => "session_delete",
            Self::SessionExpire { .. } => "session_expire",
            Self::PairingDelete { .. } => "pairing_delete",
            Self::PairingExpire { .. } => "pairing_expire",
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::SessionUpdate { topic, .. }
            | Self::SessionEvent { topic, .. }
            | Self::SessionDelete { topic }
            | Self::SessionExpire { topic }
            | Self::PairingDelete { topic }
            | Self::PairingExpire { topic } => topic,
        }
    }
}

/// Notifications published to the host application.
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderEvent {
    Login,
    Logout,
    Event(Value),
    // Uri of a proposal opened implicitly by `login`, meant for QR display
    PairingUri(String),
}
