/// SQLite connection management and schema setup.
pub mod connection;

/// Row-level operations on the `sys_refindex` table.
pub mod queries;

pub use connection::Database;
