//! Auto-signing capability for managed wallets. The
//! actual signing of payment authorizations by a managed wallet custody
//! service is out of scope; the pipeline only depends on this
//! trait.

use async_trait::async_trait;

use crate::context::User;
use crate::errors::AutoSignerError;
use crate::payment::{AutoSignIntent, AutoSignResult};

#[async_trait]
pub trait AutoSigner: Send + Sync {
    async fn sign(
        &self,
        intent: &AutoSignIntent,
        user: Option<&User>,
    ) -> Result<AutoSignResult, AutoSignerError>;
}

/// An `AutoSigner` that never signs. Useful default for deployments that
/// disable managed-wallet auto-payment.
pub struct DisabledAutoSigner;

#[async_trait]
impl AutoSigner for DisabledAutoSigner {
    async fn sign(
        &self,
        _intent: &AutoSignIntent,
        _user: Option<&User>,
    ) -> Result<AutoSignResult, AutoSignerError> {
        Ok(AutoSignResult {
            success: false,
            signed_payment_header: None,
            wallet_address: None,
            strategy: None,
            error: Some("auto-signing is disabled".to_string()),
        })
    }
}
