//! Method names understood by the bridge.
//!
//! Method strings are decoded once, at the boundary, into [`Method`]. Anything
//! the bridge does not know lands in [`Method::Unrecognized`] so downstream
//! matches stay exhaustive.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Reserved liveness check sent by the relay.
pub const HEALTH_CHECK: &str = "wallet_healthCheck";
/// Reserved configuration request sent by the relay on every new port.
pub const GET_CONFIG: &str = "wallet_getConfig";
/// Host → page notification carrying the wallet configuration.
pub const CONFIG_CHANGED: &str = "wallet_configChanged";

pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
pub const REQUEST_PERMISSIONS: &str = "wallet_requestPermissions";
pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
pub const ACCOUNTS: &str = "eth_accounts";
pub const CHAIN_ID: &str = "eth_chainId";

/// Naming convention a signer verb belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodFamily {
    Legacy,
    Native,
}

/// What a signer verb asks the wallet to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerAction {
    /// Sign a prefixed message.
    SignMessage,
    /// Sign a raw 32-byte digest.
    SignDigest,
    SignTransaction,
    SendTransaction,
}

/// The fixed allow-list of signing verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerMethod {
    PersonalSign,
    EthSign,
    EthSignTransaction,
    EthSendTransaction,
    SignMessage,
    Sign,
    SignTransaction,
    SendTransaction,
}

impl SignerMethod {
    pub const ALL: [SignerMethod; 8] = [
        SignerMethod::PersonalSign,
        SignerMethod::EthSign,
        SignerMethod::EthSignTransaction,
        SignerMethod::EthSendTransaction,
        SignerMethod::SignMessage,
        SignerMethod::Sign,
        SignerMethod::SignTransaction,
        SignerMethod::SendTransaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignerMethod::PersonalSign => "personal_sign",
            SignerMethod::EthSign => "eth_sign",
            SignerMethod::EthSignTransaction => "eth_signTransaction",
            SignerMethod::EthSendTransaction => "eth_sendTransaction",
            SignerMethod::SignMessage => "wallet_signMessage",
            SignerMethod::Sign => "wallet_sign",
            SignerMethod::SignTransaction => "wallet_signTransaction",
            SignerMethod::SendTransaction => "wallet_sendTransaction",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn family(&self) -> MethodFamily {
        match self {
            SignerMethod::PersonalSign
            | SignerMethod::EthSign
            | SignerMethod::EthSignTransaction
            | SignerMethod::EthSendTransaction => MethodFamily::Legacy,
            _ => MethodFamily::Native,
        }
    }

    pub fn action(&self) -> SignerAction {
        match self {
            SignerMethod::PersonalSign | SignerMethod::SignMessage => SignerAction::SignMessage,
            SignerMethod::EthSign | SignerMethod::Sign => SignerAction::SignDigest,
            SignerMethod::EthSignTransaction | SignerMethod::SignTransaction => {
                SignerAction::SignTransaction
            }
            SignerMethod::EthSendTransaction | SignerMethod::SendTransaction => {
                SignerAction::SendTransaction
            }
        }
    }

    /// Bare `sign` variants are only accepted when approving.
    pub fn is_translatable(&self) -> bool {
        self.action() != SignerAction::SignDigest
    }

    /// The account a request asks to sign with, if the params name one.
    ///
    /// Message verbs put the address second (`[message, address]`), digest
    /// verbs put it first (`[address, digest]`), transaction verbs carry it in
    /// the `from` field of the first param.
    pub fn account<'a>(&self, params: &'a [Value]) -> Option<&'a str> {
        match self.action() {
            SignerAction::SignMessage => params.get(1).and_then(Value::as_str),
            SignerAction::SignDigest => params.first().and_then(Value::as_str),
            SignerAction::SignTransaction | SignerAction::SendTransaction => params
                .first()
                .and_then(|tx| tx.get("from"))
                .and_then(Value::as_str),
        }
    }
}

impl fmt::Display for SignerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SignerMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SignerMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("not a signer method: {name}")))
    }
}

/// Every method name the bridge distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    HealthCheck,
    GetConfig,
    RequestAccounts,
    RequestPermissions,
    AddChain,
    SwitchChain,
    Accounts,
    ChainId,
    Signer(SignerMethod),
    Unrecognized(String),
}

impl Method {
    pub fn parse(name: &str) -> Self {
        match name {
            HEALTH_CHECK => Method::HealthCheck,
            GET_CONFIG => Method::GetConfig,
            REQUEST_ACCOUNTS => Method::RequestAccounts,
            REQUEST_PERMISSIONS => Method::RequestPermissions,
            ADD_CHAIN => Method::AddChain,
            SWITCH_CHAIN => Method::SwitchChain,
            ACCOUNTS => Method::Accounts,
            CHAIN_ID => Method::ChainId,
            other => match SignerMethod::from_name(other) {
                Some(signer) => Method::Signer(signer),
                None => Method::Unrecognized(other.to_string()),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::HealthCheck => HEALTH_CHECK,
            Method::GetConfig => GET_CONFIG,
            Method::RequestAccounts => REQUEST_ACCOUNTS,
            Method::RequestPermissions => REQUEST_PERMISSIONS,
            Method::AddChain => ADD_CHAIN,
            Method::SwitchChain => SWITCH_CHAIN,
            Method::Accounts => ACCOUNTS,
            Method::ChainId => CHAIN_ID,
            Method::Signer(signer) => signer.as_str(),
            Method::Unrecognized(name) => name,
        }
    }

    /// Methods the relay enriches with page title and favicon.
    pub fn wants_page_metadata(&self) -> bool {
        matches!(
            self,
            Method::RequestAccounts | Method::RequestPermissions | Method::AddChain
        )
    }

    /// Control messages consumed by the bridge itself.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Method::HealthCheck | Method::GetConfig)
    }
}

impl From<&str> for Method {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<SignerMethod> for Method {
    fn from(signer: SignerMethod) -> Self {
        Method::Signer(signer)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Method::parse(&name))
    }
}
