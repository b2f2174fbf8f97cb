use echolab_db::{connect_with_config, migrations, seed_lookups, SeedResult};
use echolab_server::bootstrap::lookup_rows;

use crate::commands::{prepare, CommandResult};

/// Inserts the configured channel and user lookups. Rows already present are
/// left alone, so repeated runs report zero new rows.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let (channels, users) = lookup_rows(&config);

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = seed_lookups(&pool, &channels, &users)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8));
        pool.close().await;
        seeded
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", seed_message(channels.len(), users.len(), seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_message(channels: usize, users: usize, seeded: SeedResult) -> String {
    format!(
        "seeded lookups: {} of {channels} channels and {} of {users} users were new",
        seeded.channels_inserted, seeded.users_inserted
    )
}

#[cfg(test)]
mod tests {
    use echolab_db::SeedResult;

    use super::seed_message;

    #[test]
    fn message_counts_new_rows_against_configured_rows() {
        let message = seed_message(3, 3, SeedResult { channels_inserted: 0, users_inserted: 1 });

        assert_eq!(message, "seeded lookups: 0 of 3 channels and 1 of 3 users were new");
    }
}
