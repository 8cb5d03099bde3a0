use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::client::RelayConfig;
use crate::constants::DEFAULT_RELAY_URL;
use crate::error::{Error, Result};
use crate::types::Metadata;

/// Options forwarded untouched to the relay client factory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "relayUrl", default = "default_relay_url")]
    pub relay_url: String,
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(default)]
    pub options: ClientOptions,
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.to_string()
}

impl ProviderConfig {
    pub fn new(chain_id: &str, relay_url: &str, project_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            relay_url: relay_url.to_string(),
            project_id: project_id.to_string(),
            options: ClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = serde_json::from_str::<Self>(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id.trim().is_empty() {
            return Err(Error::InvalidConfig("chain id is empty".to_string()));
        }
        if self.project_id.trim().is_empty() {
            return Err(Error::InvalidConfig("project id is empty".to_string()));
        }

        let url = Url::parse(&self.relay_url)?;
        match url.scheme() {
            "ws" | "wss" | "http" | "https" => Ok(()),
            scheme => Err(Error::InvalidConfig(format!(
                "unsupported relay url scheme {scheme}"
            ))),
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            relay_url: self.relay_url.clone(),
            project_id: self.project_id.clone(),
            options: self.options.clone(),
        }
    }
}
