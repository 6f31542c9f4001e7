use crate::endpoints::{
    Dust,
    auth::{Logout, RefreshToken, RequestCode, VerifyCode},
    payments::{ListPaymentMethods, PurchaseDust},
    transactions::ListTransactions,
    users::{GetBalance, GetCurrentUser},
};

pub struct AuthRepository;

impl AuthRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn request_code(&self, identifier: impl Into<String>) -> RequestCode {
        RequestCode::new(identifier)
    }

    pub fn verify_code(&self, identifier: impl Into<String>, code: impl Into<String>) -> VerifyCode {
        VerifyCode::new(identifier, code)
    }

    pub fn refresh(&self, refresh_token: impl Into<String>) -> RefreshToken {
        RefreshToken::new(refresh_token)
    }

    pub fn logout(&self) -> Logout {
        Logout
    }
}

pub struct UserRepository;

impl UserRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn me(&self) -> GetCurrentUser {
        GetCurrentUser
    }

    pub fn balance(&self) -> GetBalance {
        GetBalance
    }
}

pub struct TransactionRepository;

impl TransactionRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn list(&self) -> ListTransactions {
        ListTransactions::new()
    }
}

pub struct PaymentRepository;

impl PaymentRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn purchase(&self, amount: impl Into<Dust>) -> PurchaseDust {
        PurchaseDust::new(amount)
    }

    pub fn methods(&self) -> ListPaymentMethods {
        ListPaymentMethods
    }
}
