//! Chat and message persistence on an embedded DuckDB file.

pub mod connection;
pub mod models;
pub mod service;

pub use connection::{get_connection, init_schema, DbPool};
pub use models::{Chat, Message, Role};
pub use service::DbService;
