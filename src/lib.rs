// Key-value store latency benchmark - library root

pub mod bench;
pub mod command;
pub mod config;
pub mod dataset;
pub mod error;
pub mod transport;
