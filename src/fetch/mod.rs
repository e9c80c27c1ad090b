//! HTTP transport for hosted report stores.

mod auth;
mod basic;
mod client;

pub use auth::ApiKey;
pub use basic::BasicClient;
pub use client::HttpClient;
