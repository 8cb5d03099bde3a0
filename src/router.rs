/// Router
///
/// Consumes the relay client's event subscription and turns session and
/// pairing lifecycle events into provider state changes and notifications.
///
use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::provider::WalletConnectProvider;
use crate::registry::SessionRegistry;
use crate::types::{Namespace, ProviderEvent, RelayEvent, SessionEventParams};

/// Spawns the subscription loop. The task only holds a weak reference, it
/// stops once the provider is dropped or the relay closes the channel.
pub(crate) fn spawn(
    provider: &WalletConnectProvider,
    mut events: broadcast::Receiver<RelayEvent>,
) {
    let weak = Arc::downgrade(&provider.inner);

    let handle = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("router: skipped {skipped} relay events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(inner) = weak.upgrade() else {
                break;
            };
            WalletConnectProvider { inner }
                .handle_relay_event(event)
                .await;
        }
        debug!("router: subscription closed");
    });

    let previous = provider
        .inner
        .router
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(handle);
    if let Some(previous) = previous {
        previous.abort();
    }
}

impl WalletConnectProvider {
    /// Applies one relay event. Failures are logged, never returned.
    pub async fn handle_relay_event(&self, event: RelayEvent) {
        debug!("router: {} for {}", event.name(), event.topic());

        match event {
            RelayEvent::SessionUpdate { topic, namespaces } => {
                self.handle_session_update(&topic, namespaces).await
            }
            RelayEvent::SessionEvent { topic, params } => {
                self.handle_session_event(&topic, params)
            }
            RelayEvent::SessionDelete { topic }
            | RelayEvent::SessionExpire { topic } => {
                self.handle_session_end(&topic).await
            }
            RelayEvent::PairingDelete { topic }
            | RelayEvent::PairingExpire { topic } => {
                self.handle_topic_update(&topic).await
            }
        }
    }

    fn is_current_topic(&self, topic: &str) -> bool {
        self.state().current_topic().as_deref() == Some(topic)
    }

    async fn handle_session_update(
        &self,
        topic: &str,
        namespaces: HashMap<String, Namespace>,
    ) {
        if !self.is_current_topic(topic) {
            debug!("session_update: ignoring foreign topic {topic}");
            return;
        }

        let stored = self.client().and_then(|client| client.session(topic));
        let current = self.state().session.clone();
        let Some(base) = stored.or(current) else {
            return;
        };

        if let Err(e) = self
            .on_session_connected(base.with_namespaces(namespaces), None)
            .await
        {
            warn!("session_update: unable to rebind session {topic}: {e}");
        }
    }

    fn handle_session_event(&self, topic: &str, params: SessionEventParams) {
        if !self.is_current_topic(topic) || params.event.name.is_empty() {
            debug!("session_event: ignoring event for {topic}");
            return;
        }
        self.notify(ProviderEvent::Event(params.event.data));
    }

    async fn handle_session_end(&self, topic: &str) {
        if !self.is_current_topic(topic) {
            debug!("session_end: ignoring foreign topic {topic}");
            return;
        }

        self.state().reset();
        if let Some(client) = self.client() {
            let pairings = SessionRegistry::new(client.as_ref())
                .sweep_pairings(Some(topic))
                .await;
            self.state().pairings = Some(pairings);
        }
        self.settle();
        self.notify(ProviderEvent::Logout);
    }

    async fn handle_topic_update(&self, topic: &str) {
        let Some(client) = self.client() else {
            return;
        };
        let pairings = SessionRegistry::new(client.as_ref()).active_pairings();

        let logged_out = {
            let mut state = self.state();
            let no_pairings = pairings.is_empty();
            state.pairings = Some(pairings);

            let affected = state.current_topic().as_deref() == Some(topic)
                || state
                    .session
                    .as_ref()
                    .and_then(|s| s.pairing_topic.as_deref())
                    == Some(topic)
                || no_pairings;

            if !state.address.is_empty() && !state.is_initializing && affected {
                state.reset();
                true
            } else {
                false
            }
        };

        if logged_out {
            self.settle();
            self.notify(ProviderEvent::Logout);
        }
    }

    fn settle(&self) {
        let mut state = self.state();
        state.phase = self.settled_phase(&state);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use super::*;
    use crate::address::test_address;
    use crate::mock::{connected_provider, pairing, session};
    use crate::provider::Phase;
    use crate::types::SessionEvent;

    fn session_event(topic: &str, name: &str) -> RelayEvent {
        RelayEvent::SessionEvent {
            topic: topic.to_string(),
            params: SessionEventParams {
                event: SessionEvent {
                    name: name.to_string(),
                    data: json!({"balance": "10"}),
                },
                chain_id: "mvx:D".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_session_event_forwarded() {
        let (provider, _) = connected_provider().await;
        let mut events = provider.subscribe();

        provider.handle_relay_event(session_event("other", "x")).await;
        provider.handle_relay_event(session_event("topic-1", "")).await;
        provider
            .handle_relay_event(session_event("topic-1", "balanceChanged"))
            .await;

        assert_eq!(
            events.try_recv().unwrap(),
            ProviderEvent::Event(json!({"balance": "10"}))
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_delete_logs_out() {
        let (provider, factory) = connected_provider().await;
        factory.relay.add_pairing(pairing("stale", false));
        let mut events = provider.subscribe();

        provider
            .handle_relay_event(RelayEvent::SessionDelete {
                topic: "unrelated".to_string(),
            })
            .await;
        assert!(provider.is_connected());

        provider
            .handle_relay_event(RelayEvent::SessionDelete {
                topic: "topic-1".to_string(),
            })
            .await;

        assert!(!provider.is_connected());
        assert_eq!(provider.get_address().unwrap(), "");
        assert_eq!(provider.phase(), Phase::Idle);
        assert_eq!(factory.relay.expired(), vec!["stale".to_string()]);
        assert_eq!(events.try_recv().unwrap(), ProviderEvent::Logout);
    }

    #[tokio::test]
    async fn test_session_update_rebinds_address() {
        let (provider, _) = connected_provider().await;
        let mut events = provider.subscribe();

        let updated = session("topic-1", "D", 7, true);
        provider
            .handle_relay_event(RelayEvent::SessionUpdate {
                topic: "topic-1".to_string(),
                namespaces: updated.namespaces,
            })
            .await;

        assert_eq!(provider.get_address().unwrap(), test_address(7));
        assert_eq!(events.try_recv().unwrap(), ProviderEvent::Login);
    }

    #[tokio::test]
    async fn test_session_update_invalid_address_disconnects() {
        let (provider, factory) = connected_provider().await;
        let mut events = provider.subscribe();

        let mut updated = session("topic-1", "D", 7, true);
        updated.namespaces.get_mut("mvx").unwrap().accounts =
            Some(vec!["mvx:D:erd1broken".to_string()]);
        provider
            .handle_relay_event(RelayEvent::SessionUpdate {
                topic: "topic-1".to_string(),
                namespaces: updated.namespaces,
            })
            .await;

        assert!(!provider.is_connected());
        assert_eq!(factory.relay.disconnects(), vec!["topic-1".to_string()]);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pairing_delete() {
        let (provider, factory) = connected_provider().await;
        factory.relay.add_pairing(pairing("pairing-topic-1", true));
        factory.relay.add_pairing(pairing("other", true));
        let mut events = provider.subscribe();

        // another pairing is still alive and the session does not use it
        provider
            .handle_relay_event(RelayEvent::PairingDelete {
                topic: "unrelated".to_string(),
            })
            .await;
        assert!(provider.is_connected());
        assert_eq!(provider.get_pairings().unwrap().len(), 2);

        provider
            .handle_relay_event(RelayEvent::PairingExpire {
                topic: "pairing-topic-1".to_string(),
            })
            .await;
        assert!(!provider.is_connected());
        assert_eq!(events.try_recv().unwrap(), ProviderEvent::Logout);
    }

    #[tokio::test]
    async fn test_pairing_delete_without_active_pairings() {
        let (provider, _) = connected_provider().await;
        let mut events = provider.subscribe();

        provider
            .handle_relay_event(RelayEvent::PairingDelete {
                topic: "whatever".to_string(),
            })
            .await;

        assert!(!provider.is_connected());
        assert_eq!(events.try_recv().unwrap(), ProviderEvent::Logout);
    }

    #[tokio::test]
    async fn test_spawned_router_dispatches() {
        let (provider, factory) = connected_provider().await;
        let mut events = provider.subscribe();

        factory.relay.emit(RelayEvent::SessionExpire {
            topic: "topic-1".to_string(),
        });

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, ProviderEvent::Logout);
        assert!(!provider.is_connected());
    }
}
