use super::{Dust, IdempotencyKey};
use crate::macros::setter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};
use uuid::Uuid;

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount: Dust,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "action")]
    pub description: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Consume,
    Purchase,
    Grant,
    Refund,
    #[serde(other)]
    Other,
}

// Requests

#[derive(Default, Debug, Clone, Serialize)]
pub struct ListTransactions {
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u32>,
}

impl ListTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    setter!(opt limit: u32);
    setter!(opt offset: u32);
}

impl Request for ListTransactions {
    type Data = Self;
    type Response = Vec<Transaction>;

    fn endpoint(&self) -> Cow<'_, str> {
        "/transactions".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        if self.limit.is_none() && self.offset.is_none() {
            RequestData::Empty
        } else {
            RequestData::Query(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_transaction_deserializes() {
        let json = r#"{
            "id": "00000000-0000-0000-0000-0000000000aa",
            "user_id": "00000000-0000-0000-0000-000000000001",
            "amount": 5,
            "type": "consume",
            "status": "completed",
            "action": "Generate story - My App",
            "app_id": "app-1",
            "idempotency_key": "k-1",
            "created_at": "2026-01-01T00:00:00Z"
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, Dust::new(5));
        assert_eq!(tx.kind, Some(TransactionKind::Consume));
        assert_eq!(tx.description.as_deref(), Some("Generate story - My App"));
        assert_eq!(tx.idempotency_key.unwrap().as_str(), "k-1");
    }

    #[test]
    fn test_unknown_transaction_kind() {
        let json = r#"{"id": "00000000-0000-0000-0000-0000000000ab", "amount": 1, "type": "bonus"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.kind, Some(TransactionKind::Other));
    }

    #[test]
    fn test_list_query_only_when_paginated() {
        let req = ListTransactions::new();
        assert!(matches!(req.data(), RequestData::Empty));

        let req = ListTransactions::new().limit(20u32);
        assert!(matches!(req.data(), RequestData::Query(_)));
    }
}
