pub mod indicator;
pub mod models;
pub mod senders;
pub mod service;
