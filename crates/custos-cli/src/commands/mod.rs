//! CLI command handlers

pub mod check_call;
pub mod common;
pub mod config;
pub mod policy;
pub mod request;
