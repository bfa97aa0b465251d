pub mod pool;
pub mod session_store;

pub use pool::{create_pool, run_migrations};
pub use session_store::{SessionStore, StoreError};
