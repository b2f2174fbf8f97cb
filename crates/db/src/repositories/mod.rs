use async_trait::async_trait;
use thiserror::Error;

use echolab_core::domain::candidate::{ParsedMessage, TidyOrder, TidyRow};
use echolab_core::domain::lookup::ChannelCount;
use echolab_core::domain::message::{Message, UnparsedMessage};

pub mod messages;

pub use messages::SqlMessageStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Append-only store for retrieved messages and their extracted candidates.
///
/// Inserts never fail on duplicates: rows colliding on their key are dropped
/// and the returned count only covers rows that were actually written.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn initialize(&self) -> Result<(), RepositoryError>;

    async fn append_messages(&self, rows: &[Message]) -> Result<u64, RepositoryError>;

    /// Stored messages whose timestamp has no parsed row yet.
    async fn unparsed_messages(&self) -> Result<Vec<UnparsedMessage>, RepositoryError>;

    async fn append_parsed(&self, rows: &[ParsedMessage]) -> Result<u64, RepositoryError>;

    async fn tidy_view(&self, order: TidyOrder) -> Result<Vec<TidyRow>, RepositoryError>;

    async fn candidate_counts_by_channel(&self) -> Result<Vec<ChannelCount>, RepositoryError>;
}
