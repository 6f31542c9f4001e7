//! Ledger-service wire models.
//!
//! The debit call targets a different base URL than the account service, so
//! it is sent by the session's ledger client rather than through [`crate::Client`].

use super::{Dust, IdempotencyKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONSUME_PATH: &str = "/transactions/consume";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumeRequest {
    pub user_id: Uuid,
    pub amount: Dust,
    pub action: String,
    pub app_id: String,
    pub idempotency_key: IdempotencyKey,
}

impl ConsumeRequest {
    /// Mints a fresh idempotency key for this attempt.
    pub fn new(
        user_id: Uuid,
        amount: Dust,
        action: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            idempotency_key: IdempotencyKey::mint(&user_id),
            user_id,
            amount,
            action: action.into(),
            app_id: app_id.into(),
        }
    }
}
