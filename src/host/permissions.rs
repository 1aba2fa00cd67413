//! Per-origin permission records.
//!
//! The host consults a [`PermissionAuthority`] before it parks any signing
//! request. Page metadata never reaches this module.

use std::collections::BTreeMap;
use std::str::FromStr;

use alloy::primitives::Address;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::protocol::Method;

/// What a subject (origin or `session:<topic>`) has been granted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub accounts: Vec<Address>,
    /// Method names the subject may call; `None` allows every method.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
}

impl Grant {
    pub fn accounts(accounts: Vec<Address>) -> Self {
        Self {
            accounts,
            methods: None,
        }
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    fn allows_method(&self, method: &Method) -> bool {
        match &self.methods {
            None => true,
            Some(methods) => methods.iter().any(|m| m == method.as_str()),
        }
    }

    fn allows_account(&self, account: &str) -> bool {
        Address::from_str(account).is_ok_and(|address| self.accounts.contains(&address))
    }
}

pub trait PermissionAuthority: Send + Sync + 'static {
    /// Whether the subject has any grant at all.
    fn is_connected(&self, subject: &str) -> bool;

    /// Accounts exposed to the subject; empty when not connected.
    fn accounts(&self, subject: &str) -> Vec<Address>;

    /// Whether `subject` may call `method`, signing with `account` if named.
    fn permits(&self, subject: &str, method: &Method, account: Option<&str>) -> bool;

    fn grant(&self, subject: &str, grant: Grant);

    /// Returns false when there was nothing to revoke.
    fn revoke(&self, subject: &str) -> bool;

    fn snapshot(&self) -> BTreeMap<String, Grant>;
}

/// In-memory authority keyed by subject.
#[derive(Debug, Default)]
pub struct InMemoryPermissions {
    grants: DashMap<String, Grant>,
}

impl InMemoryPermissions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionAuthority for InMemoryPermissions {
    fn is_connected(&self, subject: &str) -> bool {
        self.grants.contains_key(subject)
    }

    fn accounts(&self, subject: &str) -> Vec<Address> {
        self.grants
            .get(subject)
            .map(|grant| grant.accounts.clone())
            .unwrap_or_default()
    }

    fn permits(&self, subject: &str, method: &Method, account: Option<&str>) -> bool {
        let Some(grant) = self.grants.get(subject) else {
            return false;
        };
        if !grant.allows_method(method) {
            return false;
        }
        account.is_none_or(|account| grant.allows_account(account))
    }

    fn grant(&self, subject: &str, grant: Grant) {
        tracing::info!(
            subject,
            accounts = grant.accounts.len(),
            scoped = grant.methods.is_some(),
            "Permission granted"
        );
        self.grants.insert(subject.to_string(), grant);
    }

    fn revoke(&self, subject: &str) -> bool {
        let removed = self.grants.remove(subject).is_some();
        if removed {
            tracing::info!(subject, "Permission revoked");
        }
        removed
    }

    fn snapshot(&self) -> BTreeMap<String, Grant> {
        self.grants
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SignerMethod;
    use alloy::primitives::address;

    const DAPP: &str = "https://dapp.example";
    const ACCOUNT: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    #[test]
    fn test_not_connected_by_default() {
        let permissions = InMemoryPermissions::new();
        assert!(!permissions.is_connected(DAPP));
        assert!(permissions.accounts(DAPP).is_empty());
        assert!(!permissions.permits(DAPP, &Method::ChainId, None));
    }

    #[test]
    fn test_account_match_ignores_case() {
        let permissions = InMemoryPermissions::new();
        permissions.grant(DAPP, Grant::accounts(vec![ACCOUNT]));

        let send = Method::Signer(SignerMethod::EthSendTransaction);
        assert!(permissions.permits(DAPP, &send, None));
        assert!(permissions.permits(DAPP, &send, Some("0xF39FD6E51AAD88F6F4CE6AB8827279CFFFB92266")));
        assert!(permissions.permits(DAPP, &send, Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")));
        assert!(!permissions.permits(DAPP, &send, Some("0x0000000000000000000000000000000000000001")));
        assert!(!permissions.permits(DAPP, &send, Some("not-an-address")));
    }

    #[test]
    fn test_method_scope() {
        let permissions = InMemoryPermissions::new();
        permissions.grant(
            DAPP,
            Grant::accounts(vec![ACCOUNT]).with_methods(["personal_sign"]),
        );

        assert!(permissions.permits(DAPP, &Method::Signer(SignerMethod::PersonalSign), None));
        assert!(!permissions.permits(DAPP, &Method::Signer(SignerMethod::EthSendTransaction), None));
    }

    #[test]
    fn test_revoke() {
        let permissions = InMemoryPermissions::new();
        permissions.grant(DAPP, Grant::accounts(vec![ACCOUNT]));
        assert_eq!(permissions.snapshot().len(), 1);
        assert!(permissions.revoke(DAPP));
        assert!(!permissions.revoke(DAPP));
        assert!(!permissions.is_connected(DAPP));
    }
}
