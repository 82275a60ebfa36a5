//! Data-access capability consumed by the pipeline. The core never talks
//! to a database directly — schema, migrations and the admin surface are
//! out of scope — it only calls this trait, which a real deployment backs
//! with a concrete storage crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::context::{Server, Tool, User};
use crate::errors::StoreError;

#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    pub user: User,
}

#[derive(Debug, Clone)]
pub struct Wallet {
    pub address: String,
    pub is_primary: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct ToolUsageRecord {
    pub tool_id: Option<String>,
    pub user_id: Option<String>,
    pub response_status: String,
    pub execution_time_ms: u64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub request_data: Value,
    pub result: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub tool_id: Option<String>,
    pub user_id: Option<String>,
    pub amount_raw: String,
    pub token_decimals: u8,
    pub currency: String,
    pub network: String,
    pub transaction_hash: Option<String>,
    pub status: String,
    pub signature: String,
    pub payment_data: Value,
}

#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub wallet_address: String,
    pub display_name: Option<String>,
    pub wallet_type: String,
    pub wallet_provider: Option<String>,
    pub blockchain: String,
}

/// Bounded transactional operations the pipeline performs against the
/// persistent store. Each call is a single short transaction; two
/// requests never share one.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_server_by_public_id(&self, public_id: &str) -> Result<Option<Server>, StoreError>;
    async fn list_tools_by_server(&self, server_internal_id: &str) -> Result<Vec<Tool>, StoreError>;
    async fn get_tool_by_id(&self, id: &str) -> Result<Option<Tool>, StoreError>;
    async fn validate_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError>;
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;
    async fn get_user_wallets(&self, user_id: &str, active_only: bool) -> Result<Vec<Wallet>, StoreError>;
    async fn get_wallet_by_address(&self, address: &str) -> Result<Option<(Wallet, User)>, StoreError>;
    async fn get_user_by_wallet_address(&self, address: &str) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
    async fn update_user_last_login(&self, user_id: &str) -> Result<(), StoreError>;
    async fn update_wallet_metadata(&self, wallet_address: &str) -> Result<(), StoreError>;
    async fn migrate_legacy_wallet(&self, user_id: &str) -> Result<(), StoreError>;
    async fn record_tool_usage(&self, usage: ToolUsageRecord) -> Result<(), StoreError>;
    async fn create_payment(&self, payment: PaymentRecord) -> Result<CreatedPayment, StoreError>;
}

/// In-process `Store` used by tests and by the bundled demo binary. Not
/// meant for production use.
#[derive(Default)]
pub struct InMemoryStore {
    servers: Mutex<HashMap<String, Server>>,
    tools: Mutex<HashMap<String, Tool>>,
    api_keys: Mutex<HashMap<String, User>>,
    users: Mutex<HashMap<String, User>>,
    wallets: Mutex<HashMap<String, (Wallet, String)>>,
    usages: Mutex<Vec<ToolUsageRecord>>,
    payments: Mutex<Vec<PaymentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, server: Server) -> Self {
        self.servers
            .lock()
            .unwrap()
            .insert(server.public_id.clone(), server);
        self
    }

    pub fn with_tool(self, tool: Tool) -> Self {
        self.tools.lock().unwrap().insert(tool.id.clone(), tool);
        self
    }

    pub fn with_api_key(self, key_hash: impl Into<String>, user: User) -> Self {
        self.api_keys.lock().unwrap().insert(key_hash.into(), user);
        self
    }

    pub fn recorded_usages(&self) -> Vec<ToolUsageRecord> {
        self.usages.lock().unwrap().clone()
    }

    pub fn recorded_payments(&self) -> Vec<PaymentRecord> {
        self.payments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_server_by_public_id(&self, public_id: &str) -> Result<Option<Server>, StoreError> {
        Ok(self.servers.lock().unwrap().get(public_id).cloned())
    }

    async fn list_tools_by_server(&self, server_internal_id: &str) -> Result<Vec<Tool>, StoreError> {
        Ok(self
            .tools
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.server_internal_id == server_internal_id)
            .cloned()
            .collect())
    }

    async fn get_tool_by_id(&self, id: &str) -> Result<Option<Tool>, StoreError> {
        Ok(self.tools.lock().unwrap().get(id).cloned())
    }

    async fn validate_api_key(&self, key_hash: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self
            .api_keys
            .lock()
            .unwrap()
            .get(key_hash)
            .cloned()
            .map(|user| ApiKeyRecord { user }))
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    async fn get_user_wallets(&self, user_id: &str, active_only: bool) -> Result<Vec<Wallet>, StoreError> {
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .values()
            .filter(|(_, owner)| owner == user_id)
            .map(|(w, _)| w.clone())
            .filter(|w| !active_only || w.is_active)
            .collect())
    }

    async fn get_wallet_by_address(&self, address: &str) -> Result<Option<(Wallet, User)>, StoreError> {
        let wallets = self.wallets.lock().unwrap();
        let Some((wallet, owner_id)) = wallets.get(address) else {
            return Ok(None);
        };
        let user = self.users.lock().unwrap().get(owner_id).cloned();
        Ok(user.map(|u| (wallet.clone(), u)))
    }

    async fn get_user_by_wallet_address(&self, address: &str) -> Result<Option<User>, StoreError> {
        let wallets = self.wallets.lock().unwrap();
        let Some((_, owner_id)) = wallets.get(address) else {
            return Ok(None);
        };
        Ok(self.users.lock().unwrap().get(owner_id).cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let user = User {
            id: id.clone(),
            wallet_address: Some(new_user.wallet_address.clone()),
            email: None,
            display_name: new_user.display_name,
        };
        self.users.lock().unwrap().insert(id.clone(), user.clone());
        self.wallets.lock().unwrap().insert(
            new_user.wallet_address,
            (
                Wallet {
                    address: user.wallet_address.clone().unwrap(),
                    is_primary: true,
                    is_active: true,
                },
                id,
            ),
        );
        Ok(user)
    }

    async fn update_user_last_login(&self, _user_id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn update_wallet_metadata(&self, _wallet_address: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn migrate_legacy_wallet(&self, _user_id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_tool_usage(&self, usage: ToolUsageRecord) -> Result<(), StoreError> {
        self.usages.lock().unwrap().push(usage);
        Ok(())
    }

    async fn create_payment(&self, payment: PaymentRecord) -> Result<CreatedPayment, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.payments.lock().unwrap().push(payment);
        Ok(CreatedPayment { id })
    }
}
