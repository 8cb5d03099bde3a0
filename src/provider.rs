/// Provider
///
/// Connection lifecycle of a dApp talking to a MultiversX wallet over
/// WalletConnect: init, connect, login, logout and recovery of a session
/// persisted by the relay client.
///
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, error, info, warn};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::address::address_is_valid;
use crate::client::{Approval, ConnectResponse, RelayClient, RelayClientFactory};
use crate::config::ProviderConfig;
use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::params::{ConnectOptions, ConnectionParams, chain_reference};
use crate::registry::SessionRegistry;
use crate::router;
use crate::signing::signature_field;
use crate::types::{
    ErrorReason, Pairing, ProviderEvent, RequestArguments, RequestParams,
    Session,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Idle,
    Connecting,
    AwaitingApproval,
    Authenticated,
    LoggingOut,
}

impl Phase {
    fn is_login_in_flight(&self) -> bool {
        matches!(self, Phase::Connecting | Phase::AwaitingApproval)
    }
}

/// The only mutable state of the provider. Written by the lifecycle and the
/// event router, read by the signing operations.
#[derive(Clone, Debug, Default)]
pub struct ProviderState {
    pub address: String,
    pub signature: String,
    pub session: Option<Session>,
    pub pairings: Option<Vec<Pairing>>,
    pub events: Vec<String>,
    pub methods: Vec<String>,
    pub phase: Phase,
    pub is_initializing: bool,
    pub processing_topic: Option<String>,
}

impl ProviderState {
    /// Clears identity. Pairings and the client are left alone.
    pub fn reset(&mut self) {
        self.address.clear();
        self.signature.clear();
        self.session = None;
    }

    pub fn current_topic(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| s.topic.clone())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Default)]
pub struct LoginOptions {
    pub approval: Option<Approval>,
    pub token: Option<String>,
}

impl LoginOptions {
    pub fn with_approval(approval: Approval) -> Self {
        Self {
            approval: Some(approval),
            token: None,
        }
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

pub(crate) struct Inner {
    config: ProviderConfig,
    factory: Arc<dyn RelayClientFactory>,
    client: RwLock<Option<Arc<dyn RelayClient>>>,
    state: Mutex<ProviderState>,
    init_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<ProviderEvent>,
    pub(crate) router: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let router = self
            .router
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = router.take() {
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct WalletConnectProvider {
    pub(crate) inner: Arc<Inner>,
}

// Holds `is_initializing` for the duration of init/login. The outermost
// guard also settles an in-flight phase, so an abandoned login never leaves
// the provider stuck in AwaitingApproval.
struct InitializingGuard<'a> {
    provider: &'a WalletConnectProvider,
    previous: bool,
}

impl<'a> InitializingGuard<'a> {
    fn acquire(provider: &'a WalletConnectProvider) -> Self {
        let mut state = provider.state();
        let previous = state.is_initializing;
        state.is_initializing = true;
        Self { provider, previous }
    }
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.provider.state();
        state.is_initializing = self.previous;
        if !self.previous
            && (state.phase == Phase::Initializing
                || state.phase.is_login_in_flight())
        {
            state.phase = self.provider.settled_phase(&state);
        }
    }
}

// Logout re-entrancy guard, released on every exit path. Only clears the
// marker it set, an overlapping logout may have replaced it since.
struct ProcessingGuard<'a> {
    provider: &'a WalletConnectProvider,
    topic: Option<String>,
    previous: Phase,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.provider.state();
        if state.processing_topic == self.topic {
            state.processing_topic = None;
        }
        state.phase = self.provider.finished_phase(&state, self.previous);
    }
}

impl WalletConnectProvider {
    pub fn new(
        config: ProviderConfig,
        factory: Arc<dyn RelayClientFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                factory,
                client: RwLock::new(None),
                state: Mutex::new(ProviderState::default()),
                init_lock: tokio::sync::Mutex::new(()),
                events,
                router: Mutex::new(None),
            }),
        })
    }

    /// Initiates the relay client.
    ///
    /// Calling it again once a client exists is a no-op. Concurrent calls
    /// wait for the first one and share its client.
    pub async fn init(&self) -> Result<bool> {
        let _lock = self.inner.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(true);
        }

        let guard = InitializingGuard::acquire(self);
        // login owns session binding when it drives init
        let recover = !guard.previous;
        {
            let mut state = self.state();
            state.reset();
            if state.phase == Phase::Uninitialized {
                state.phase = Phase::Initializing;
            }
        }

        let client = match self
            .inner
            .factory
            .init(&self.inner.config.relay_config())
            .await
        {
            Ok(client) => client,
            Err(e) => {
                error!("init: WalletConnect is unable to init: {e}");
                return Err(Error::UnableToInit);
            }
        };

        *self
            .inner
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(client.clone());

        router::spawn(self, client.subscribe());
        self.check_persisted_state(client.as_ref(), recover).await;

        Ok(self.is_initialized())
    }

    /// Returns true if init() was previously called successfully
    pub fn is_initialized(&self) -> bool {
        self.client().is_some()
    }

    /// Returns true if provider is initialized and a session is bound
    pub fn is_connected(&self) -> bool {
        self.is_initialized() && self.state().session.is_some()
    }

    /// Proposes a new session, or rehydrates the pairing in
    /// `options.topic`. The returned `uri` is meant for QR display and
    /// `approval` resolves once the wallet accepts.
    pub async fn connect(
        &self,
        options: Option<ConnectOptions>,
    ) -> Result<ConnectResponse> {
        let Some(client) = self.client() else {
            error!("connect: WalletConnect not initialised, call init() first");
            return Err(Error::NotInitialized);
        };

        let params = ConnectionParams::build(self.chain_id(), options.as_ref());
        let pairing_topic = options.and_then(|o| o.topic);

        let previous = {
            let mut state = self.state();
            let previous = state.phase;
            state.phase = Phase::Connecting;
            previous
        };

        let result = client
            .connect(params.clone().into_proposal(pairing_topic.clone()))
            .await;

        match result {
            Ok(response) => {
                let mut state = self.state();
                state.events = params.events();
                state.methods = params.methods();
                state.phase = self.finished_phase(&state, previous);
                Ok(response)
            }
            Err(e) => {
                {
                    let mut state = self.state();
                    state.reset();
                    state.phase = self.finished_phase(&state, previous);
                }

                if let Some(topic) = pairing_topic {
                    error!(
                        "connect: WalletConnect is unable to connect to existing pairing {topic}: {e}"
                    );
                    if let Err(e) = self.logout(Some(&topic)).await {
                        warn!("connect: unable to logout stale pairing {topic}: {e}");
                    }
                    Err(Error::UnableToConnectExisting)
                } else {
                    error!("connect: WalletConnect is unable to connect: {e}");
                    Err(Error::UnableToConnect)
                }
            }
        }
    }

    /// Awaits wallet approval and binds the approved session.
    ///
    /// Without an `approval` a fresh proposal is opened and its uri is
    /// published as `ProviderEvent::PairingUri`. A current session is logged
    /// out first. With a `token`, the wallet must sign it before the session
    /// is accepted. Returns the bound address, empty if the wallet shared
    /// none.
    pub async fn login(&self, options: LoginOptions) -> Result<String> {
        {
            let mut state = self.state();
            if state.phase.is_login_in_flight() {
                warn!("login: another login is already in progress");
                return Err(Error::UnableToLogin);
            }
            state.phase = Phase::Connecting;
        }
        let _guard = InitializingGuard::acquire(self);

        match self.try_login(options).await {
            Ok(address) => Ok(address),
            Err(e) => {
                error!("login: WalletConnect is unable to login: {e}");
                self.state().reset();
                Err(match e {
                    Error::UnableToSignLoginToken | Error::InvalidAddress(_) => e,
                    _ => Error::UnableToLogin,
                })
            }
        }
    }

    async fn try_login(&self, options: LoginOptions) -> Result<String> {
        let LoginOptions { approval, token } = options;

        if !self.is_initialized() {
            self.init().await?;
        }
        let Some(client) = self.client() else {
            return Err(Error::NotInitialized);
        };

        if self.state().session.is_some() {
            self.logout(None).await?;
        }

        let approval = match approval {
            Some(approval) => approval,
            None => {
                let response = self.connect(None).await?;
                if let Some(uri) = &response.uri {
                    info!("login: waiting for approval of {uri}");
                    self.notify(ProviderEvent::PairingUri(uri.clone()));
                }
                response.approval
            }
        };

        self.state().phase = Phase::AwaitingApproval;
        let session = approval.await?;

        let signature = match token {
            Some(token) => {
                let address = session.address();
                let response = client
                    .request(RequestParams {
                        chain_id: chain_reference(self.chain_id()),
                        topic: session.topic.clone(),
                        request: RequestArguments {
                            method: Operation::SignLoginToken.to_string(),
                            params: json!({
                                "token": token,
                                "address": address,
                            }),
                        },
                    })
                    .await?;

                match signature_field(&response) {
                    Some(signature) => Some(signature),
                    None => {
                        error!("login: WalletConnect could not sign login token");
                        return Err(Error::UnableToSignLoginToken);
                    }
                }
            }
            None => None,
        };

        self.on_session_connected(session, signature).await
    }

    /// Disconnects `topic`, or the current session when none is given.
    ///
    /// Always succeeds locally: relay failures are logged and swallowed.
    pub async fn logout(&self, topic: Option<&str>) -> Result<bool> {
        let Some(client) = self.client() else {
            error!("logout: WalletConnect not initialised, call init() first");
            return Err(Error::NotInitialized);
        };

        let explicit = topic.map(|t| t.to_string());
        let previous;
        let target = {
            let mut state = self.state();
            let target = explicit.clone().or_else(|| state.current_topic());
            if target.is_some() && state.processing_topic == target {
                debug!("logout: already processing {target:?}");
                return Ok(true);
            }
            state.processing_topic = target.clone();
            previous = state.phase;
            state.phase = Phase::LoggingOut;
            target
        };
        let _processing = ProcessingGuard {
            provider: self,
            topic: target.clone(),
            previous,
        };

        let mut disconnected = false;
        if let Some(topic) = &target {
            match client
                .disconnect(topic, ErrorReason::user_disconnected())
                .await
            {
                Ok(()) => disconnected = true,
                Err(e) => {
                    error!("logout: WalletConnect was unable to logout: {e}")
                }
            }
        }

        let is_current = target.is_some() && self.state().current_topic() == target;
        let registry = SessionRegistry::new(client.as_ref());

        if explicit.is_none() || is_current {
            self.state().reset();
            if disconnected {
                let pairings = registry.sweep_pairings(target.as_deref()).await;
                self.state().pairings = Some(pairings);
            }
        } else if disconnected {
            let pairings: Vec<Pairing> = registry
                .active_pairings()
                .into_iter()
                .filter(|p| Some(&p.topic) != target.as_ref())
                .collect();
            self.state().pairings = Some(pairings);
        }

        Ok(true)
    }

    /// Fetches the WalletConnect address
    pub fn get_address(&self) -> Result<String> {
        self.require_client("get_address")?;
        Ok(self.state().address.clone())
    }

    /// Fetches the login token signature
    pub fn get_signature(&self) -> Result<String> {
        self.require_client("get_signature")?;
        Ok(self.state().signature.clone())
    }

    /// Fetches the WalletConnect pairings
    pub fn get_pairings(&self) -> Result<Vec<Pairing>> {
        let client = self.require_client("get_pairings")?;
        let cached = self.state().pairings.clone();
        Ok(cached.unwrap_or_else(|| {
            SessionRegistry::new(client.as_ref()).active_pairings()
        }))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.inner.events.subscribe()
    }

    pub fn chain_id(&self) -> &str {
        &self.inner.config.chain_id
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn session(&self) -> Option<Session> {
        self.state().session.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.state().is_initializing
    }

    /// Methods negotiated by the last successful `connect`.
    pub fn methods(&self) -> Vec<String> {
        self.state().methods.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn reset(&self) {
        self.state().reset();
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn client(&self) -> Option<Arc<dyn RelayClient>> {
        self.inner
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn require_client(
        &self,
        operation: &str,
    ) -> Result<Arc<dyn RelayClient>> {
        self.client().ok_or_else(|| {
            error!("{operation}: WalletConnect not initialised, call init() first");
            Error::NotInitialized
        })
    }

    pub(crate) fn notify(&self, event: ProviderEvent) {
        if self.inner.events.send(event).is_err() {
            debug!("notify: no subscriber for provider events");
        }
    }

    pub(crate) fn settled_phase(&self, state: &ProviderState) -> Phase {
        if !self.is_initialized() {
            Phase::Uninitialized
        } else if state.session.is_some() && !state.address.is_empty() {
            Phase::Authenticated
        } else {
            Phase::Idle
        }
    }

    // A login in flight keeps its phase across nested connect/logout calls.
    fn finished_phase(&self, state: &ProviderState, previous: Phase) -> Phase {
        if previous.is_login_in_flight() {
            previous
        } else {
            self.settled_phase(state)
        }
    }

    async fn check_persisted_state(&self, client: &dyn RelayClient, recover: bool) {
        let registry = SessionRegistry::new(client);
        {
            let mut state = self.state();
            state.pairings = Some(registry.active_pairings());
            if !recover || state.session.is_some() || !state.address.is_empty() {
                return;
            }
        }

        match registry.current_session(self.chain_id()) {
            Ok(session) => {
                info!("init: recovering persisted session {}", session.topic);
                if let Err(e) = self.on_session_connected(session, None).await {
                    warn!("init: persisted session rejected: {e}");
                }
            }
            Err(_) => debug!("init: no persisted session"),
        }
    }

    /// Binds `session` as current and logs in its first account.
    pub(crate) async fn on_session_connected(
        &self,
        session: Session,
        signature: Option<String>,
    ) -> Result<String> {
        let address = session.address();
        self.state().session = Some(session);

        if address.is_empty() {
            debug!("on_session_connected: session carries no account");
            return Ok(address);
        }

        self.login_account(&address, signature).await?;
        Ok(address)
    }

    async fn login_account(
        &self,
        address: &str,
        signature: Option<String>,
    ) -> Result<()> {
        if address_is_valid(address) {
            {
                let mut state = self.state();
                state.address = address.to_string();
                if let Some(signature) = signature.filter(|s| !s.is_empty()) {
                    state.signature = signature;
                }
                if !state.phase.is_login_in_flight() {
                    state.phase = Phase::Authenticated;
                }
            }
            self.notify(ProviderEvent::Login);
            return Ok(());
        }

        error!("WalletConnect invalid address {address}");
        let topic = self.state().current_topic();
        if let (Some(topic), Some(client)) = (topic, self.client()) {
            if let Err(e) = client
                .disconnect(&topic, ErrorReason::user_disconnected())
                .await
            {
                warn!("login_account: unable to disconnect {topic}: {e}");
            }
            let pairings = SessionRegistry::new(client.as_ref()).active_pairings();
            self.state().pairings = Some(pairings);
        }
        {
            let mut state = self.state();
            state.reset();
            if !state.phase.is_login_in_flight() {
                state.phase = self.settled_phase(&state);
            }
        }

        Err(Error::InvalidAddress(address.to_string()))
    }
}
