//! FinSupp backend: HTTP client, wire types and the account mirror.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod forms;
pub mod types;
