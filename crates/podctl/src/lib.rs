pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod gpu;
pub mod lifecycle;
pub mod logging;
pub mod provision;
pub mod ssh;
pub mod storage;
