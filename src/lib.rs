pub mod backend;
pub mod bulk;
pub mod cli;
pub mod config;
pub mod serde_utils;
