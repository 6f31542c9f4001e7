mod api;
mod credential_store;
mod ledger_client;
mod session;
mod settings;
mod storage;
#[cfg(test)]
mod test_server;

pub use api::DustApi;
pub use credential_store::{CredentialStore, SKIP_CONFIRMATIONS};
pub use ledger_client::LedgerClient;
pub use session::Session;
pub use settings::Settings;
pub use storage::{FileStorage, MemoryStorage, Storage};
