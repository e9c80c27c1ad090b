pub mod config;
pub mod fetch;
pub mod level;
pub mod output;
pub mod report;
pub mod service;
pub mod store;
pub mod summary;
