// Public API for the server binary, the ballot CLI and integration tests

pub mod abuse;
pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod snapshot;
pub mod state;
pub mod types;
