pub mod auth;
pub mod ledger;
pub mod payments;
pub mod transactions;
pub mod users;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

/// Amount of dust, the virtual credit metered per action.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dust(i64);

impl Dust {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// How much is missing to cover `cost`, zero when `self` already covers it.
    pub fn shortfall(&self, cost: Dust) -> Dust {
        Self((cost.0 - self.0).max(0))
    }

    pub fn covers(&self, cost: Dust) -> bool {
        self.0 >= cost.0
    }
}

impl From<i64> for Dust {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Dust> for i64 {
    fn from(value: Dust) -> Self {
        value.0
    }
}

impl std::ops::Add for Dust {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Dust {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl std::ops::SubAssign for Dust {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Display for Dust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of login handle. Classification is a heuristic, not validation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    #[default]
    Email,
    Phone,
}

impl IdentifierType {
    /// Email if the value contains both `@` and `.`, phone otherwise.
    pub fn detect(identifier: &str) -> Self {
        if identifier.contains('@') && identifier.contains('.') {
            IdentifierType::Email
        } else {
            IdentifierType::Phone
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Phone => "Phone",
        }
    }
}

const IDEMPOTENCY_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const IDEMPOTENCY_RANDOM_LEN: usize = 9;

/// Client-minted deduplication token for a single debit attempt.
///
/// Format: `{user_id}-{epoch_millis}-{random}` where `random` is nine base36
/// characters, so two keys minted in the same millisecond still differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn mint(user_id: &Uuid) -> Self {
        Self::mint_at(user_id, chrono::Utc::now().timestamp_millis())
    }

    pub fn mint_at(user_id: &Uuid, epoch_millis: i64) -> Self {
        let mut rng = rand::rng();
        let random: String = (0..IDEMPOTENCY_RANDOM_LEN)
            .map(|_| IDEMPOTENCY_ALPHABET[rng.random_range(0..IDEMPOTENCY_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}-{}-{}", user_id, epoch_millis, random))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
