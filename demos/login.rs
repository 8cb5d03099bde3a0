use std::sync::{Arc, Mutex};

use alloy::hex;
use async_trait::async_trait;
use log::info;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use walletconnect_provider::{
    ConnectResponse, LoginOptions, ProviderConfig, ProviderEvent, RelayClient,
    RelayClientFactory, RelayConfig, RelayEvent, Signature, Transaction,
    WalletConnectProvider,
    address::UserAddress,
    constants::DEFAULT_RELAY_URL,
    error::Result,
    types::{ErrorReason, Pairing, ProposalParams, RequestParams, Session},
};

// Any erd1 address works, nothing below checks signatures.
fn wallet_address() -> String {
    let hrp = bech32::Hrp::parse("erd").expect("valid hrp");
    bech32::encode::<bech32::Bech32>(hrp, &[0x11u8; 32]).expect("valid address")
}

/// Wallet living in the same process, approving and signing everything.
struct LoopbackWallet {
    sessions: Mutex<Vec<Session>>,
    events: broadcast::Sender<RelayEvent>,
}

#[async_trait]
impl RelayClient for LoopbackWallet {
    async fn connect(&self, params: ProposalParams) -> Result<ConnectResponse> {
        let address = wallet_address();
        let mut namespaces = params.required_namespaces;
        for namespace in namespaces.values_mut() {
            namespace.accounts = Some(
                namespace
                    .chains
                    .iter()
                    .map(|chain| format!("{chain}:{address}"))
                    .collect(),
            );
        }
        let session = Session {
            topic: "f1a5c0ffee".to_string(),
            namespaces,
            acknowledged: true,
            ..Default::default()
        };
        self.sessions.lock().unwrap().push(session.clone());

        Ok(ConnectResponse {
            uri: Some("wc:0bb3c0ffee@2?relay-protocol=irn&symKey=00".to_string()),
            approval: Box::pin(async move { Ok(session) }),
        })
    }

    async fn request(&self, params: RequestParams) -> Result<Value> {
        info!("wallet received {}", params.request.method);
        Ok(json!({ "signature": hex::encode([0x5au8; 64]) }))
    }

    async fn disconnect(&self, topic: &str, reason: ErrorReason) -> Result<()> {
        info!("wallet disconnected from {topic}: {}", reason.message);
        self.sessions.lock().unwrap().retain(|s| s.topic != topic);
        Ok(())
    }

    async fn ping(&self, _topic: &str) -> Result<()> {
        Ok(())
    }

    async fn expire_pairing(&self, _topic: &str) -> Result<()> {
        Ok(())
    }

    fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().unwrap().clone()
    }

    fn session(&self, topic: &str) -> Option<Session> {
        self.sessions().into_iter().find(|s| s.topic == topic)
    }

    fn pairings(&self) -> Vec<Pairing> {
        vec![]
    }

    fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }
}

struct LoopbackFactory;

#[async_trait]
impl RelayClientFactory for LoopbackFactory {
    async fn init(&self, config: &RelayConfig) -> Result<Arc<dyn RelayClient>> {
        info!("connecting to {}", config.relay_url);
        let (events, _) = broadcast::channel(16);
        Ok(Arc::new(LoopbackWallet {
            sessions: Mutex::new(vec![]),
            events,
        }))
    }
}

#[derive(Debug)]
struct Transfer {
    chain_id: String,
    receiver: String,
    value: u128,
    signature: Option<Signature>,
}

impl Transaction for Transfer {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn to_plain_object(&self, sender: &UserAddress) -> Result<Value> {
        Ok(json!({
            "sender": sender.bech32(),
            "receiver": self.receiver,
            "value": self.value.to_string(),
            "chainID": self.chain_id,
        }))
    }

    fn apply_signature(
        &mut self,
        signature: Signature,
        _signer: &UserAddress,
    ) -> Result<()> {
        self.signature = Some(signature);
        Ok(())
    }
}

/// This example shows the full dApp flow against an in-process wallet:
/// init, login with a token, sign a transaction and logout.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // ProjectId is required to prevent DOS on the relay. You can create your
    // own from https://cloud.reown.com
    let config = ProviderConfig::new(
        "D",
        DEFAULT_RELAY_URL,
        "35d44d49c2dee217a3eb24bb4410acc7",
    );
    let provider = WalletConnectProvider::new(config, Arc::new(LoopbackFactory))?;

    let mut events = provider.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ProviderEvent::PairingUri(uri) => println!("scan to connect: {uri}"),
                event => println!("event: {event:?}"),
            }
        }
    });

    provider.init().await?;

    let address = provider
        .login(LoginOptions::default().token("aHR0cHM6Ly9leGFtcGxlLmNvbQ"))
        .await?;
    println!("logged in as {address}");
    println!("login token signature {}", provider.get_signature()?);

    let transfer = provider
        .sign_transaction(Transfer {
            chain_id: "D".to_string(),
            receiver: wallet_address(),
            value: 1_000_000_000_000_000_000,
            signature: None,
        })
        .await?;
    println!(
        "signature: {}",
        transfer.signature.map(|s| s.hex()).unwrap_or_default()
    );

    provider.logout(None).await?;
    println!("connected after logout: {}", provider.is_connected());

    Ok(())
}
