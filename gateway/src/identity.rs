//! `AuthResolve` stage support: locating an API key / session /
//! wallet header in the inbound request, and resolving it to a `User` +
//! `AuthMethod` through the `Store` and an external `SessionProvider`.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::context::{AuthMethod, Inbound, User};
use crate::store::{NewUser, Store};

/// Session lookup is an external collaborator; the pipeline only consumes this interface.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve(&self, inbound: &Inbound) -> Option<User>;
}

/// A `SessionProvider` that never finds a session, for deployments without
/// a session layer wired in yet.
pub struct NoSessionProvider;

#[async_trait]
impl SessionProvider for NoSessionProvider {
    async fn resolve(&self, _inbound: &Inbound) -> Option<User> {
        None
    }
}

/// Deterministic one-way transform of an API key (Glossary "Key hash").
/// The same function is used on issuance and validation, so this is a
/// pipeline-owned constant rather than configuration.
pub fn hash_api_key(raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Chain family inferred from a wallet address's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Solana,
    Near,
    Unknown,
}

pub fn infer_chain_family(address: &str) -> ChainFamily {
    if address.starts_with("0x") && address.len() == 42 {
        ChainFamily::Evm
    } else if address.len() == 44 && !address.contains("0x") {
        ChainFamily::Solana
    } else if address.ends_with(".near") || (address.len() == 64 && address.chars().all(|c| c.is_ascii_hexdigit())) {
        ChainFamily::Near
    } else {
        ChainFamily::Unknown
    }
}

fn chain_family_label(family: ChainFamily) -> &'static str {
    match family {
        ChainFamily::Evm => "evm",
        ChainFamily::Solana => "solana",
        ChainFamily::Near => "near",
        ChainFamily::Unknown => "unknown",
    }
}

/// Extracts a caller-presented API key from the inbound request, checking
/// (in order) `X-API-KEY`, `Authorization: Bearer`, the `api_key` query
/// parameter, and a `api_key` field in a parsed JSON body.
pub fn extract_api_key(inbound: &Inbound, parsed_body: Option<&serde_json::Value>) -> Option<String> {
    if let Some(key) = inbound.header("x-api-key") {
        if !key.trim().is_empty() {
            return Some(key.trim().to_string());
        }
    }
    if let Some(auth) = inbound.header("authorization") {
        if let Some(token) = auth.strip_prefix("Bearer ").or_else(|| auth.strip_prefix("bearer ")) {
            if !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
    }
    if let Some(query) = inbound.url.query() {
        for pair in query.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                if k == "api_key" && !v.is_empty() {
                    return percent_decode(v);
                }
            }
        }
    }
    if let Some(body) = parsed_body {
        if let Some(key) = body.get("api_key").and_then(|v| v.as_str()) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
    }
    None
}

fn percent_decode(value: &str) -> Option<String> {
    percent_encoding::percent_decode_str(value)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Resolves the caller's primary wallet: `isPrimary=true`, else the
/// first active wallet, else none.
pub async fn primary_wallet(store: &dyn Store, user_id: &str) -> Option<String> {
    let wallets = store.get_user_wallets(user_id, false).await.ok()?;
    wallets
        .iter()
        .find(|w| w.is_primary)
        .or_else(|| wallets.iter().find(|w| w.is_active))
        .map(|w| w.address.clone())
}

/// Resolves (or creates) a user for a bare wallet address, used by the
/// wallet-header auth path and by auto-sign/payment-authorization paths
/// that learn a `from`/wallet address mid-pipeline.
pub async fn resolve_or_create_by_wallet(store: &dyn Store, address: &str) -> Option<User> {
    if let Some((_, user)) = store.get_wallet_by_address(address).await.ok()? {
        return Some(user);
    }
    if let Some(user) = store.get_user_by_wallet_address(address).await.ok()? {
        return Some(user);
    }
    let family = infer_chain_family(address);
    store
        .create_user(NewUser {
            wallet_address: address.to_string(),
            display_name: None,
            wallet_type: "external".to_string(),
            wallet_provider: None,
            blockchain: chain_family_label(family).to_string(),
        })
        .await
        .ok()
}

/// Runs the full `AuthResolve` priority chain: API key, then
/// session, then wallet header. Failure of any one source is isolated;
/// only `AuthMethod::None` is returned if every source fails.
pub async fn resolve(
    store: &dyn Store,
    sessions: &dyn SessionProvider,
    inbound: &Inbound,
    parsed_body: Option<&serde_json::Value>,
) -> (Option<User>, AuthMethod) {
    if let Some(raw_key) = extract_api_key(inbound, parsed_body) {
        let key_hash = hash_api_key(&raw_key);
        match store.validate_api_key(&key_hash).await {
            Ok(Some(record)) => {
                let mut user = record.user;
                user.wallet_address = primary_wallet(store, &user.id).await;
                return (Some(user), AuthMethod::ApiKey);
            }
            Ok(None) => {}
            Err(err) => vlog::warn!("api key validation failed: {}", err),
        }
    }

    if let Some(user) = sessions.resolve(inbound).await {
        return (Some(user), AuthMethod::Session);
    }

    if let Some(address) = inbound.header("x-wallet-address") {
        if let Some(user) = resolve_or_create_by_wallet(store, address).await {
            return (Some(user), AuthMethod::WalletHeader);
        }
    }

    (None, AuthMethod::None)
}

pub type SharedStore = Arc<dyn Store>;
pub type SharedSessionProvider = Arc<dyn SessionProvider>;
