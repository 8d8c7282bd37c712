pub mod cli;
pub mod config;
pub mod panel;
pub mod profile;
pub mod provision;
pub mod session;
pub mod version;
pub mod vmess;
