pub mod http;
pub mod service;
pub mod sqlite;
pub mod types;

pub use service::{AccountService, Backend};

#[cfg(test)]
pub mod fake;
