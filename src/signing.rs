/// Signing
///
/// Wallet round trips over the bound session: messages, transactions,
/// custom requests and liveness checks.
///
use std::sync::Arc;

use log::error;
use serde_json::{Value, json};

use crate::address::UserAddress;
use crate::client::RelayClient;
use crate::error::{Error, Result};
use crate::operation::Operation;
use crate::params::chain_reference;
use crate::provider::WalletConnectProvider;
use crate::signable::{Signature, SignableMessage, Transaction};
use crate::types::{ProviderEvent, RequestArguments, RequestParams};

/// Non-empty `signature` string of a wallet response.
pub(crate) fn signature_field(response: &Value) -> Option<String> {
    response
        .get("signature")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

struct SessionContext {
    client: Arc<dyn RelayClient>,
    topic: String,
    address: String,
}

impl WalletConnectProvider {
    // Every signing call needs a client and a bound session. A missing
    // session is announced as a logout.
    fn session_context(&self, operation: &str) -> Result<SessionContext> {
        let client = self.require_client(operation)?;
        let (topic, address) = {
            let state = self.state();
            (state.current_topic(), state.address.clone())
        };

        let Some(topic) = topic else {
            error!("{operation}: Session is not connected");
            self.notify(ProviderEvent::Logout);
            return Err(Error::SessionNotConnected);
        };

        Ok(SessionContext {
            client,
            topic,
            address,
        })
    }

    fn request_params(
        &self,
        topic: &str,
        operation: Operation,
        params: Value,
    ) -> RequestParams {
        RequestParams {
            chain_id: chain_reference(self.chain_id()),
            topic: topic.to_string(),
            request: RequestArguments {
                method: operation.to_string(),
                params,
            },
        }
    }

    /// Signs a message with the bound account
    pub async fn sign_message<M: SignableMessage>(
        &self,
        mut message: M,
    ) -> Result<M> {
        let ctx = self.session_context("sign_message")?;

        let response = ctx
            .client
            .request(self.request_params(
                &ctx.topic,
                Operation::SignMessage,
                json!({
                    "address": ctx.address,
                    "message": message.message(),
                }),
            ))
            .await
            .map_err(|e| {
                error!("sign_message: {e}");
                Error::InvalidMessageResponse
            })?;

        let Some(signature) = signature_field(&response) else {
            error!("sign_message: Wallet Connect could not sign the message");
            return Err(Error::InvalidMessageResponse);
        };

        let signer = UserAddress::from_bech32(&ctx.address)?;
        let signature = Signature::from_hex(&signature).map_err(|e| {
            error!("sign_message: invalid signature: {e}");
            Error::InvalidMessageSignature
        })?;
        message.apply_signature(signature, &signer).map_err(|e| {
            error!("sign_message: unable to apply signature: {e}");
            Error::InvalidMessageSignature
        })?;

        Ok(message)
    }

    /// Signs a transaction with the bound account
    pub async fn sign_transaction<T: Transaction>(
        &self,
        mut transaction: T,
    ) -> Result<T> {
        let ctx = self.session_context("sign_transaction")?;

        if transaction.chain_id() != self.chain_id() {
            error!(
                "sign_transaction: transaction chain {} differs from session chain {}",
                transaction.chain_id(),
                self.chain_id()
            );
            return Err(Error::RequestDifferentChain);
        }

        let signer = UserAddress::from_bech32(&ctx.address)?;
        let plain = transaction.to_plain_object(&signer)?;

        let response = ctx
            .client
            .request(self.request_params(
                &ctx.topic,
                Operation::SignTransaction,
                json!({ "transaction": plain }),
            ))
            .await
            .map_err(|e| {
                error!("sign_transaction: {e}");
                Error::TransactionError(e.to_string())
            })?;

        let signature = signature_field(&response)
            .and_then(|s| Signature::from_hex(&s).ok())
            .ok_or_else(|| {
                error!("sign_transaction: Wallet Connect could not sign the transaction");
                Error::InvalidTransactionResponse
            })?;

        transaction.apply_signature(signature, &signer)?;
        Ok(transaction)
    }

    /// Signs a batch of transactions in one wallet round trip.
    ///
    /// Nothing is sent when any transaction targets another chain, and no
    /// transaction is touched unless every returned signature decodes.
    pub async fn sign_transactions<T: Transaction>(
        &self,
        mut transactions: Vec<T>,
    ) -> Result<Vec<T>> {
        let ctx = self.session_context("sign_transactions")?;

        if let Some(foreign) = transactions
            .iter()
            .find(|t| t.chain_id() != self.chain_id())
        {
            error!(
                "sign_transactions: transaction chain {} differs from session chain {}",
                foreign.chain_id(),
                self.chain_id()
            );
            return Err(Error::RequestDifferentChain);
        }
        if transactions.is_empty() {
            return Ok(transactions);
        }

        let signer = UserAddress::from_bech32(&ctx.address)?;
        let plain = transactions
            .iter()
            .map(|t| t.to_plain_object(&signer))
            .collect::<Result<Vec<_>>>()?;

        let response = ctx
            .client
            .request(self.request_params(
                &ctx.topic,
                Operation::SignTransactions,
                json!({ "transactions": plain }),
            ))
            .await
            .map_err(|e| {
                error!("sign_transactions: {e}");
                Error::TransactionError(e.to_string())
            })?;

        let signatures = response
            .get("signatures")
            .and_then(Value::as_array)
            .filter(|entries| entries.len() == transactions.len())
            .and_then(|entries| {
                entries
                    .iter()
                    .map(|entry| {
                        signature_field(entry)
                            .and_then(|s| Signature::from_hex(&s).ok())
                    })
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| {
                error!("sign_transactions: Wallet Connect could not sign the transactions");
                Error::InvalidTransactionResponse
            })?;

        for (transaction, signature) in transactions.iter_mut().zip(signatures) {
            transaction.apply_signature(signature, &signer)?;
        }
        Ok(transactions)
    }

    /// Forwards an arbitrary request and returns the wallet's `response`.
    pub async fn send_custom_request(
        &self,
        request: RequestArguments,
    ) -> Result<Value> {
        let ctx = self.session_context("send_custom_request")?;

        let response = ctx
            .client
            .request(RequestParams {
                chain_id: chain_reference(self.chain_id()),
                topic: ctx.topic,
                request,
            })
            .await
            .map_err(|e| {
                error!("send_custom_request: {e}");
                Error::InvalidCustomRequestResponse
            })?;

        match response.get("response") {
            Some(value) if !value.is_null() => Ok(value.clone()),
            _ => {
                error!("send_custom_request: Wallet Connect could not send the custom request");
                Err(Error::InvalidCustomRequestResponse)
            }
        }
    }

    /// Checks the session is alive. Transport failures read as `false`.
    pub async fn ping(&self) -> Result<bool> {
        let ctx = self.session_context("ping")?;

        match ctx.client.ping(&ctx.topic).await {
            Ok(()) => Ok(true),
            Err(e) => {
                error!("ping: Wallet Connect ping failed: {e}");
                Ok(false)
            }
        }
    }
}
