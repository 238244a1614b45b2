//! Execution layer: connection pool, query facade, transaction guard.

pub mod facade;
pub mod pool;
pub mod transaction;

pub use facade::{Db, ErrorInfo};
pub use pool::{Pool, PoolConfig, PoolRegistry, PooledConnection};
pub use transaction::Transaction;
