pub mod store;
pub use store::{LedgerStore, SyncCommit};
pub mod pg_repo;
pub use pg_repo::PgLedgerStore;

#[cfg(test)]
pub mod memory;
