pub mod analysis;
pub mod config;
pub mod error;
pub mod job;
pub mod pose;
pub mod protocol;
pub mod server;
pub mod source;
