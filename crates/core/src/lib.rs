//! EchoLab core: domain types and the pure parts of the bots' workflows.
//!
//! - `domain` - messages, candidates, lookups and upload fingerprints
//! - `retrieval` - channel history filtering and row shaping
//! - `upload_status` - fingerprint derivation and per-year backlog estimates
//! - `tidy` - the published spreadsheet table
//! - `outcome` - per-item results for batch steps
//! - `config` - layered configuration (defaults, TOML, env, overrides)

pub mod config;
pub mod domain;
pub mod errors;
pub mod outcome;
pub mod retrieval;
pub mod tidy;
pub mod upload_status;

pub use domain::candidate::{Candidate, ParsedMessage, QualityScore, TidyOrder, TidyRow};
pub use domain::lookup::{Channel, ChannelCount, User};
pub use domain::message::{Attachment, ChatMessage, FileLinks, Message, UnparsedMessage};
pub use domain::upload::{CatalogueEntry, UploadFingerprint, YearStatus};
pub use errors::ApplicationError;
pub use outcome::{BatchReport, ItemNote, ItemOutcome};
