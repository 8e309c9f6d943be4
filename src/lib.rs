pub mod access;
pub mod config;
pub mod db;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod refindex;
pub mod types;
