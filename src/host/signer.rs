//! Signers the host hands approved requests to.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use std::str::FromStr;

use alloy::network::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{hex, Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as _;
use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::config::ChainConfig;
use crate::protocol::SignerAction;
use crate::rpc::{ErrorCode, RpcError};
use crate::translator::TranslatedRequest;

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "WALLET_BRIDGE_PRIVATE_KEY";

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("account {0} is not managed by this signer")]
    UnknownAccount(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("broadcast failed: {0}")]
    Broadcast(String),

    #[error("wallet error: {0}")]
    Wallet(String),
}

impl From<SignerError> for RpcError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::InvalidParams(message) => {
                RpcError::with_message(ErrorCode::InvalidParams, message)
            }
            SignerError::UnknownAccount(account) => {
                RpcError::unauthorized().with_data(Value::String(account))
            }
            other => RpcError::internal_error(other.to_string()),
        }
    }
}

/// Produces the signed payload for an approved request.
///
/// `chain` is the host's active chain at approval time.
pub trait Signer: Send + Sync + 'static {
    fn accounts(&self) -> Vec<Address>;

    fn sign<'a>(
        &'a self,
        request: &'a TranslatedRequest,
        chain: &'a ChainConfig,
    ) -> BoxFuture<'a, Result<Value, SignerError>>;
}

/// Single-key signer backed by an in-process private key.
#[derive(Debug, Clone)]
pub struct LocalSigner {
    signer: PrivateKeySigner,
}

impl LocalSigner {
    /// Create a signer from a hex-encoded private key (with or without 0x).
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, SignerError> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| SignerError::Wallet(format!("Invalid private key format: {}", e)))?;

        tracing::info!(address = %signer.address(), "Signer initialized");
        Ok(Self { signer })
    }

    /// Load the key from `WALLET_BRIDGE_PRIVATE_KEY`.
    pub fn from_env() -> Result<Self, SignerError> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            SignerError::Wallet(format!("Environment variable {} not set", PRIVATE_KEY_ENV_VAR))
        })?;
        Self::from_private_key(&private_key)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    fn check_account(&self, request: &TranslatedRequest) -> Result<(), SignerError> {
        match request.account() {
            None => Ok(()),
            Some(account) => match Address::from_str(account) {
                Ok(address) if address == self.signer.address() => Ok(()),
                _ => Err(SignerError::UnknownAccount(account.to_string())),
            },
        }
    }

    async fn sign_message(&self, request: &TranslatedRequest) -> Result<Value, SignerError> {
        let message = request
            .params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| SignerError::InvalidParams("expected a message string".into()))?;

        let bytes = message_bytes(message);
        let signature = self
            .signer
            .sign_message(&bytes)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(Value::String(hex::encode_prefixed(signature.as_bytes())))
    }

    async fn sign_digest(&self, request: &TranslatedRequest) -> Result<Value, SignerError> {
        let digest = request
            .params
            .get(1)
            .and_then(Value::as_str)
            .ok_or_else(|| SignerError::InvalidParams("expected a 32-byte digest".into()))?;
        let hash = B256::from_str(digest)
            .map_err(|e| SignerError::InvalidParams(format!("invalid digest: {}", e)))?;

        let signature = self
            .signer
            .sign_hash(&hash)
            .await
            .map_err(|e| SignerError::Signing(e.to_string()))?;
        Ok(Value::String(hex::encode_prefixed(signature.as_bytes())))
    }

    fn transaction(
        &self,
        request: &TranslatedRequest,
        chain: &ChainConfig,
    ) -> Result<TransactionRequest, SignerError> {
        let raw = request
            .params
            .first()
            .cloned()
            .ok_or_else(|| SignerError::InvalidParams("expected a transaction object".into()))?;
        let mut tx: TransactionRequest = serde_json::from_value(raw)
            .map_err(|e| SignerError::InvalidParams(format!("invalid transaction: {}", e)))?;

        if tx.from.is_none() {
            tx.set_from(self.signer.address());
        }
        if tx.chain_id.is_none() {
            tx.set_chain_id(chain.chain_id);
        }
        Ok(tx)
    }

    async fn sign_transaction(
        &self,
        request: &TranslatedRequest,
        chain: &ChainConfig,
    ) -> Result<Value, SignerError> {
        let tx = self.transaction(request, chain)?;
        let wallet = EthereumWallet::new(self.signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| SignerError::InvalidParams(format!("incomplete transaction: {}", e)))?;
        Ok(Value::String(hex::encode_prefixed(envelope.encoded_2718())))
    }

    async fn send_transaction(
        &self,
        request: &TranslatedRequest,
        chain: &ChainConfig,
    ) -> Result<Value, SignerError> {
        let tx = self.transaction(request, chain)?;
        let url: url::Url = chain.rpc_url.parse().map_err(|e| {
            SignerError::Broadcast(format!("Invalid RPC URL '{}': {}", chain.rpc_url, e))
        })?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::new(self.signer.clone()))
            .connect_http(url);
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| SignerError::Broadcast(e.to_string()))?;

        let hash = *pending.tx_hash();
        tracing::info!(tx_hash = %hash, chain_id = chain.chain_id, "Transaction broadcast");
        Ok(Value::String(hash.to_string()))
    }
}

/// `0x`-prefixed hex is signed as raw bytes, anything else as UTF-8 text.
fn message_bytes(message: &str) -> Vec<u8> {
    match message.strip_prefix("0x") {
        Some(_) => hex::decode(message).unwrap_or_else(|_| message.as_bytes().to_vec()),
        None => message.as_bytes().to_vec(),
    }
}

impl Signer for LocalSigner {
    fn accounts(&self) -> Vec<Address> {
        vec![self.signer.address()]
    }

    fn sign<'a>(
        &'a self,
        request: &'a TranslatedRequest,
        chain: &'a ChainConfig,
    ) -> BoxFuture<'a, Result<Value, SignerError>> {
        Box::pin(async move {
            self.check_account(request)?;
            match request.method.action() {
                SignerAction::SignMessage => self.sign_message(request).await,
                SignerAction::SignDigest => self.sign_digest(request).await,
                SignerAction::SignTransaction => self.sign_transaction(request, chain).await,
                SignerAction::SendTransaction => self.send_transaction(request, chain).await,
            }
        })
    }
}
