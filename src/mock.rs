/// In-memory relay client used by the unit tests.
///
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::address::{UserAddress, test_address};
use crate::client::{
    Approval, ConnectResponse, RelayClient, RelayClientFactory, RelayConfig,
};
use crate::config::ProviderConfig;
use crate::constants::DEFAULT_RELAY_URL;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::provider::WalletConnectProvider;
use crate::signable::{Signature, SignableMessage, Transaction};
use crate::types::{
    ErrorReason, Namespace, Pairing, ProposalParams, RelayEvent, RequestParams,
    Session,
};

pub(crate) const PAIRING_URI: &str = "wc:6c0a8da4a0c672f063bc9972ea1a40b88c5a20c5b8984237987121d6f6024025@2?relay-protocol=irn&symKey=1b53c9465436bef7fd23211a0c233c60b6799b47c20db904df0bbe2ff6227a13";

pub(crate) fn session(
    topic: &str,
    chain: &str,
    fill: u8,
    acknowledged: bool,
) -> Session {
    session_for(topic, chain, &test_address(fill), acknowledged)
}

pub(crate) fn session_for(
    topic: &str,
    chain: &str,
    address: &str,
    acknowledged: bool,
) -> Session {
    Session {
        topic: topic.to_string(),
        pairing_topic: Some(format!("pairing-{topic}")),
        namespaces: HashMap::from([(
            "mvx".to_string(),
            Namespace {
                accounts: Some(vec![format!("mvx:{chain}:{address}")]),
                chains: vec![format!("mvx:{chain}")],
                events: vec![],
                methods: Operation::BASELINE
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            },
        )]),
        acknowledged,
        ..Default::default()
    }
}

pub(crate) fn pairing(topic: &str, active: bool) -> Pairing {
    Pairing {
        topic: topic.to_string(),
        active,
        ..Default::default()
    }
}

pub(crate) fn approved(session: Session) -> Approval {
    Box::pin(async move { Ok(session) })
}

pub(crate) struct MockRelay {
    sessions: Mutex<Vec<Session>>,
    pairings: Mutex<Vec<Pairing>>,
    requests: Mutex<Vec<RequestParams>>,
    responses: Mutex<VecDeque<Result<Value>>>,
    proposals: Mutex<Vec<ProposalParams>>,
    disconnects: Mutex<Vec<String>>,
    expired: Mutex<Vec<String>>,
    approval: Mutex<Option<Session>>,
    pings: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub fail_disconnect: AtomicBool,
    pub fail_ping: AtomicBool,
    events: broadcast::Sender<RelayEvent>,
}

impl MockRelay {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sessions: Mutex::new(vec![]),
            pairings: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
            responses: Mutex::new(VecDeque::new()),
            proposals: Mutex::new(vec![]),
            disconnects: Mutex::new(vec![]),
            expired: Mutex::new(vec![]),
            approval: Mutex::new(None),
            pings: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            fail_ping: AtomicBool::new(false),
            events,
        }
    }

    pub fn add_session(&self, session: Session) {
        self.sessions.lock().unwrap().push(session);
    }

    pub fn add_pairing(&self, pairing: Pairing) {
        self.pairings.lock().unwrap().push(pairing);
    }

    /// Session the next `connect` approval resolves to; rejected if unset.
    pub fn approve_with(&self, session: Session) {
        *self.approval.lock().unwrap() = Some(session);
    }

    pub fn push_response(&self, response: Result<Value>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn emit(&self, event: RelayEvent) {
        self.events.send(event).unwrap();
    }

    pub fn requests(&self) -> Vec<RequestParams> {
        self.requests.lock().unwrap().clone()
    }

    pub fn proposals(&self) -> Vec<ProposalParams> {
        self.proposals.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.disconnects.lock().unwrap().clone()
    }

    pub fn expired(&self) -> Vec<String> {
        self.expired.lock().unwrap().clone()
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayClient for MockRelay {
    async fn connect(&self, params: ProposalParams) -> Result<ConnectResponse> {
        self.proposals.lock().unwrap().push(params);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Transport("relay unreachable".to_string()));
        }

        let session = self.approval.lock().unwrap().take();
        Ok(ConnectResponse {
            uri: Some(PAIRING_URI.to_string()),
            approval: Box::pin(async move {
                session.ok_or(Error::Transport("proposal rejected".to_string()))
            }),
        })
    }

    async fn request(&self, params: RequestParams) -> Result<Value> {
        self.requests.lock().unwrap().push(params);
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Error::Transport("no response".to_string())))
    }

    async fn disconnect(&self, topic: &str, _reason: ErrorReason) -> Result<()> {
        self.disconnects.lock().unwrap().push(topic.to_string());
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(Error::Transport("disconnect failed".to_string()));
        }
        self.sessions.lock().unwrap().retain(|s| s.topic != topic);
        Ok(())
    }

    async fn ping(&self, _topic: &str) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(Error::Transport("ping timed out".to_string()));
        }
        Ok(())
    }

    async fn expire_pairing(&self, topic: &str) -> Result<()> {
        self.expired.lock().unwrap().push(topic.to_string());
        self.pairings.lock().unwrap().retain(|p| p.topic != topic);
        Ok(())
    }

    fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }

    fn session(&self, topic: &str) -> Option<Session> {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.topic == topic)
            .cloned()
    }

    fn pairings(&self) -> Vec<Pairing> {
        self.pairings.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }
}

pub(crate) struct MockFactory {
    pub relay: Arc<MockRelay>,
    inits: AtomicUsize,
    pub fail: AtomicBool,
}

impl MockFactory {
    pub fn new(relay: Arc<MockRelay>) -> Self {
        Self {
            relay,
            inits: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayClientFactory for MockFactory {
    async fn init(&self, _config: &RelayConfig) -> Result<Arc<dyn RelayClient>> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        // lets a concurrent caller run while this init is in flight
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("relay unreachable".to_string()));
        }
        Ok(self.relay.clone())
    }
}

pub(crate) fn provider(chain: &str) -> (WalletConnectProvider, Arc<MockFactory>) {
    let factory = Arc::new(MockFactory::new(Arc::new(MockRelay::new())));
    let provider = WalletConnectProvider::new(
        ProviderConfig::new(chain, DEFAULT_RELAY_URL, "project"),
        factory.clone(),
    )
    .unwrap();
    (provider, factory)
}

/// Provider initialised on chain "D" and bound to `session("topic-1", "D", 1)`.
pub(crate) async fn connected_provider() -> (WalletConnectProvider, Arc<MockFactory>)
{
    let (provider, factory) = provider("D");
    factory.relay.add_session(session("topic-1", "D", 1, true));
    provider.init().await.unwrap();
    assert!(provider.is_connected());
    (provider, factory)
}

pub(crate) fn signature_response(hex: &str) -> Result<Value> {
    Ok(json!({ "signature": hex }))
}

#[derive(Debug, Default)]
pub(crate) struct TestTransaction {
    pub chain_id: String,
    pub nonce: u64,
    pub signature: Option<Signature>,
    // shared between the transactions of a batch
    pub applied: Arc<AtomicUsize>,
}

impl TestTransaction {
    pub fn new(chain_id: &str, nonce: u64) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            nonce,
            ..Default::default()
        }
    }

    pub fn batch(chain_id: &str, size: u64) -> (Vec<Self>, Arc<AtomicUsize>) {
        let applied = Arc::new(AtomicUsize::new(0));
        let batch = (0..size)
            .map(|nonce| Self {
                applied: applied.clone(),
                ..Self::new(chain_id, nonce)
            })
            .collect();
        (batch, applied)
    }
}

impl Transaction for TestTransaction {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn to_plain_object(&self, sender: &UserAddress) -> Result<Value> {
        Ok(json!({
            "nonce": self.nonce,
            "sender": sender.bech32(),
            "chainID": self.chain_id,
        }))
    }

    fn apply_signature(
        &mut self,
        signature: Signature,
        _signer: &UserAddress,
    ) -> Result<()> {
        self.applied.fetch_add(1, Ordering::SeqCst);
        self.signature = Some(signature);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct TestMessage {
    pub text: String,
    pub signature: Option<Signature>,
    pub signer: Option<String>,
}

impl SignableMessage for TestMessage {
    fn message(&self) -> String {
        self.text.clone()
    }

    fn apply_signature(
        &mut self,
        signature: Signature,
        signer: &UserAddress,
    ) -> Result<()> {
        self.signature = Some(signature);
        self.signer = Some(signer.bech32().to_string());
        Ok(())
    }
}
