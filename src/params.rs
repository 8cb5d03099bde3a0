use std::collections::HashMap;

use crate::constants::{ACCOUNT_DELIMITER, WALLETCONNECT_MULTIVERSX_NAMESPACE};
use crate::operation::Operation;
use crate::types::{Namespace, ProposalParams, Session};
use crate::utils::dedupe;

/// Caller overrides for a session proposal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectOptions {
    /// Existing pairing to rehydrate instead of creating a new one
    pub topic: Option<String>,
    pub events: Option<Vec<String>>,
    pub methods: Option<Vec<String>>,
    /// Drops the baseline signing methods from the required set
    pub skip_baseline_methods: bool,
}

impl ConnectOptions {
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Default::default()
        }
    }
}

/// Namespace requirements used both to open a session and to search the
/// session store for one that already satisfies them.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionParams {
    pub required_namespaces: HashMap<String, Namespace>,
    pub optional_namespaces: HashMap<String, Namespace>,
}

impl ConnectionParams {
    pub fn build(chain_id: &str, options: Option<&ConnectOptions>) -> Self {
        let baseline = match options {
            Some(o) if o.skip_baseline_methods => vec![],
            _ => Operation::BASELINE.iter().map(|m| m.to_string()).collect(),
        };
        let methods = dedupe(
            baseline.into_iter().chain(
                options
                    .and_then(|o| o.methods.clone())
                    .unwrap_or_default(),
            ),
        );
        let chains = vec![chain_reference(chain_id)];
        let events = options.and_then(|o| o.events.clone()).unwrap_or_default();

        let optional_methods =
            Operation::OPTIONAL.iter().map(|m| m.to_string()).collect();

        Self {
            required_namespaces: HashMap::from([(
                WALLETCONNECT_MULTIVERSX_NAMESPACE.to_string(),
                Namespace {
                    accounts: None,
                    chains: chains.clone(),
                    events,
                    methods,
                },
            )]),
            optional_namespaces: HashMap::from([(
                WALLETCONNECT_MULTIVERSX_NAMESPACE.to_string(),
                Namespace {
                    accounts: None,
                    chains,
                    events: vec![],
                    methods: optional_methods,
                },
            )]),
        }
    }

    pub fn required(&self) -> Option<&Namespace> {
        self.required_namespaces.get(WALLETCONNECT_MULTIVERSX_NAMESPACE)
    }

    pub fn methods(&self) -> Vec<String> {
        self.required().map(|n| n.methods.clone()).unwrap_or_default()
    }

    pub fn events(&self) -> Vec<String> {
        self.required().map(|n| n.events.clone()).unwrap_or_default()
    }

    pub fn into_proposal(self, pairing_topic: Option<String>) -> ProposalParams {
        ProposalParams {
            pairing_topic,
            required_namespaces: self.required_namespaces,
            optional_namespaces: self.optional_namespaces,
        }
    }

    /// True when the session grants every required chain, method and event.
    ///
    /// A chain counts as granted if it is listed in the namespace's `chains`
    /// or if one of its accounts lives on it.
    pub fn matches(&self, session: &Session) -> bool {
        self.required_namespaces.iter().all(|(name, required)| {
            let Some(granted) = session.namespaces.get(name) else {
                return false;
            };

            let chains_ok = required.chains.iter().all(|chain| {
                granted.chains.contains(chain)
                    || granted.accounts.iter().flatten().any(|account| {
                        account
                            .strip_prefix(chain.as_str())
                            .is_some_and(|rest| rest.starts_with(ACCOUNT_DELIMITER))
                    })
            });
            let methods_ok =
                required.methods.iter().all(|m| granted.methods.contains(m));
            let events_ok =
                required.events.iter().all(|e| granted.events.contains(e));

            chains_ok && methods_ok && events_ok
        })
    }
}

pub fn chain_reference(chain_id: &str) -> String {
    format!("{WALLETCONNECT_MULTIVERSX_NAMESPACE}{ACCOUNT_DELIMITER}{chain_id}")
}
