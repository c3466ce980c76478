// Library for the CLI and tests

pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod render;
pub mod session;
pub mod stream_client;
