/// Session registry
///
/// Answers "which session is authoritative" and "which pairings are alive"
/// on top of the relay client's stores.
///
use log::{debug, warn};

use crate::client::RelayClient;
use crate::error::{Error, Result};
use crate::params::ConnectionParams;
use crate::types::{Pairing, Session};

pub struct SessionRegistry<'a> {
    client: &'a dyn RelayClient,
}

impl<'a> SessionRegistry<'a> {
    pub fn new(client: &'a dyn RelayClient) -> Self {
        Self { client }
    }

    /// Last acknowledged session granting the chain's connection params,
    /// falling back to the last session in the store.
    ///
    /// Both tie-breaks are store insertion order: the most recently
    /// registered session wins. A session that was just approved but not
    /// yet acknowledged by the relay is still picked up by the fallback.
    pub fn current_session(&self, chain_id: &str) -> Result<Session> {
        let params = ConnectionParams::build(chain_id, None);
        let sessions = self.client.sessions();

        if let Some(session) = sessions
            .iter()
            .rev()
            .find(|s| s.acknowledged && params.matches(s))
        {
            return Ok(session.clone());
        }

        match sessions.last() {
            Some(session) => {
                debug!(
                    "current_session: no acknowledged session for chain {chain_id}, using last stored session"
                );
                Ok(session.clone())
            }
            None => Err(Error::SessionNotConnected),
        }
    }

    pub fn current_topic(&self, chain_id: &str) -> Result<String> {
        let session = self.current_session(chain_id)?;
        if session.topic.is_empty() {
            return Err(Error::SessionNotConnected);
        }
        Ok(session.topic)
    }

    pub fn active_pairings(&self) -> Vec<Pairing> {
        self.client
            .pairings()
            .into_iter()
            .filter(|p| p.active)
            .collect()
    }

    /// Expires every inactive pairing and returns the active ones, minus
    /// `exclude` which the caller just tore down.
    ///
    /// Expiry failures are logged and skipped.
    pub async fn sweep_pairings(&self, exclude: Option<&str>) -> Vec<Pairing> {
        for pairing in self.client.pairings().iter().filter(|p| !p.active) {
            if let Err(e) = self.client.expire_pairing(&pairing.topic).await {
                warn!("sweep_pairings: unable to expire {}: {e}", pairing.topic);
            }
        }

        self.active_pairings()
            .into_iter()
            .filter(|p| Some(p.topic.as_str()) != exclude)
            .collect()
    }
}
