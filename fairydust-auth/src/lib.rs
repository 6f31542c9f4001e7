// Types shared by the store and the session
pub mod common;

mod client;
mod error;

pub use client::{
    CredentialStore, DustApi, FileStorage, LedgerClient, MemoryStorage, Session, Settings,
    Storage, SKIP_CONFIRMATIONS,
};
pub use common::TokenPair;
pub use error::AuthError;
