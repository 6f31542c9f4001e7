use super::Dust;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::Request;
use uuid::Uuid;

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub fairyname: String,
    #[serde(default)]
    pub dust_balance: Dust,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// Requests

#[derive(Default, Debug, Clone)]
pub struct GetCurrentUser;

impl Request for GetCurrentUser {
    type Data = ();
    type Response = User;

    fn endpoint(&self) -> Cow<'_, str> {
        "/users/me".into()
    }
}

#[derive(Default, Debug, Clone)]
pub struct GetBalance;

impl Request for GetBalance {
    type Data = ();
    type Response = BalanceResponse;

    fn endpoint(&self) -> Cow<'_, str> {
        "/users/me/balance".into()
    }
}

// Responses

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(alias = "dust_balance")]
    pub balance: Dust,
}
