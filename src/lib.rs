pub mod alerting;
pub mod config;
pub mod control;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod store;
pub mod version;
