use super::Dust;
use crate::macros::setter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub last4: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

// Requests

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseDust {
    amount: Dust,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_method_id: Option<String>,
}

impl PurchaseDust {
    pub fn new(amount: impl Into<Dust>) -> Self {
        Self {
            amount: amount.into(),
            payment_method_id: None,
        }
    }

    setter!(opt payment_method_id: String);
}

impl Request for PurchaseDust {
    type Data = Self;
    type Response = PurchaseResponse;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/payments/purchase".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}

#[derive(Default, Debug, Clone)]
pub struct ListPaymentMethods;

impl Request for ListPaymentMethods {
    type Data = ();
    type Response = Vec<PaymentMethod>;

    fn endpoint(&self) -> Cow<'_, str> {
        "/payments/methods".into()
    }
}

// Responses

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub new_balance: Option<Dust>,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
