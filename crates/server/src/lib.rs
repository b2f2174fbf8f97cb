//! Runtime wiring for the EchoLab bot: Slack retrieval, candidate extraction,
//! spreadsheet publishing and upload-status reporting.

pub mod bootstrap;
pub mod dropbox;
pub mod health;
pub mod publisher;
pub mod reload;
pub mod retriever;
pub mod service;
pub mod sheets;
pub mod status;
