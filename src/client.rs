/// Client
///
/// The relay/session client is an external collaborator: it owns the
/// network transport, the session encryption and the pairing/session stores.
/// The provider only talks to it through these traits.
///
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::config::ClientOptions;
use crate::error::Result;
use crate::types::{
    ErrorReason, Pairing, ProposalParams, RelayEvent, RequestParams, Session,
};
use crate::utils::parse_uri;

/// Resolves once the wallet approves (or rejects) the session proposal.
pub type Approval = Pin<Box<dyn Future<Output = Result<Session>> + Send>>;

pub struct ConnectResponse {
    pub uri: Option<String>,
    pub approval: Approval,
}

impl ConnectResponse {
    /// Pairing topic encoded in `uri`, usable later with
    /// `ConnectOptions::with_topic` to rehydrate the pairing.
    pub fn pairing_topic(&self) -> Option<String> {
        let uri = self.uri.clone()?;
        parse_uri(uri).ok().map(|params| params.topic)
    }
}

impl fmt::Debug for ConnectResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectResponse")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// What the factory needs to reach the relay.
#[derive(Clone, Debug, PartialEq)]
pub struct RelayConfig {
    pub relay_url: String,
    pub project_id: String,
    pub options: ClientOptions,
}

#[async_trait]
pub trait RelayClientFactory: Send + Sync {
    async fn init(&self, config: &RelayConfig) -> Result<Arc<dyn RelayClient>>;
}

#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn connect(&self, params: ProposalParams) -> Result<ConnectResponse>;

    /// The single correlated rpc used for every wallet interaction.
    async fn request(&self, params: RequestParams) -> Result<Value>;

    async fn disconnect(&self, topic: &str, reason: ErrorReason) -> Result<()>;

    async fn ping(&self, topic: &str) -> Result<()>;

    async fn expire_pairing(&self, topic: &str) -> Result<()>;

    /// Sessions in store insertion order.
    fn sessions(&self) -> Vec<Session>;

    fn session(&self, topic: &str) -> Option<Session>;

    fn pairings(&self) -> Vec<Pairing>;

    fn subscribe(&self) -> broadcast::Receiver<RelayEvent>;
}
