use echolab_core::domain::lookup::{Channel, User};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub channels_inserted: u64,
    pub users_inserted: u64,
}

/// Writes the channel and user lookup rows. Rows that already exist are left
/// untouched, so seeding on every start is safe.
pub async fn seed_lookups(
    pool: &DbPool,
    channels: &[Channel],
    users: &[User],
) -> Result<SeedResult, RepositoryError> {
    let mut tx = pool.begin().await?;
    let mut result = SeedResult::default();

    for channel in channels {
        result.channels_inserted += sqlx::query(
            "INSERT OR IGNORE INTO channels (channel_id, channel_name) VALUES (?, ?)",
        )
        .bind(&channel.channel_id)
        .bind(&channel.channel_name)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for user in users {
        result.users_inserted +=
            sqlx::query("INSERT OR IGNORE INTO users (user_id, user_name) VALUES (?, ?)")
                .bind(&user.user_id)
                .bind(&user.user_name)
                .execute(&mut *tx)
                .await?
                .rows_affected();
    }

    tx.commit().await?;
    Ok(result)
}
