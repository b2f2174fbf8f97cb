use async_trait::async_trait;
use echolab_core::domain::candidate::{Candidate, ParsedMessage, QualityScore, TidyOrder, TidyRow};
use echolab_core::domain::lookup::ChannelCount;
use echolab_core::domain::message::{FileLinks, Message, UnparsedMessage};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::warn;

use super::{MessageStore, RepositoryError};
use crate::{migrations, DbPool};

const TIDY_SELECT: &str = r#"
    SELECT
        pm.name, pm.undergraduate_institution, pm.graduate_institution, pm.program_major,
        pm.advisor, pm.current_workplace, pm.current_project_name, pm.email,
        pm.quality_assessment, pm.overall_summary, c.channel_name, pm.ts,
        m.file_1, m.file_2, m.file_3, m.file_4, m.file_5
    FROM parsed_messages pm
    LEFT JOIN channels c ON pm.channel_id = c.channel_id
    LEFT JOIN messages m ON pm.ts = m.ts AND pm.channel_id = m.channel_id
"#;

pub struct SqlMessageStore {
    pool: DbPool,
}

impl SqlMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl MessageStore for SqlMessageStore {
    async fn initialize(&self) -> Result<(), RepositoryError> {
        migrations::run_pending(&self.pool).await?;
        Ok(())
    }

    async fn append_messages(&self, rows: &[Message]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for message in rows {
            let [file_1, file_2, file_3, file_4, file_5] = message.files.slots();
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO messages (
                    text, upload, user, display_as_bot, type, ts, client_msg_id, team,
                    reply_count, reply_users_count, is_locked, subscribed, channel_id,
                    file_1, file_2, file_3, file_4, file_5
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&message.text)
            .bind(message.upload)
            .bind(message.user.as_deref())
            .bind(message.display_as_bot)
            .bind(message.message_type.as_deref())
            .bind(message.ts)
            .bind(&message.client_msg_id)
            .bind(message.team.as_deref())
            .bind(message.reply_count)
            .bind(message.reply_users_count)
            .bind(message.is_locked)
            .bind(message.subscribed)
            .bind(&message.channel_id)
            .bind(file_1.as_deref())
            .bind(file_2.as_deref())
            .bind(file_3.as_deref())
            .bind(file_4.as_deref())
            .bind(file_5.as_deref())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn unparsed_messages(&self) -> Result<Vec<UnparsedMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT text, channel_id, ts
            FROM messages
            WHERE ts NOT IN (SELECT ts FROM parsed_messages)
            ORDER BY ts ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UnparsedMessage {
                    text: row.try_get::<Option<String>, _>("text")?.unwrap_or_default(),
                    channel_id: row.try_get("channel_id")?,
                    ts: row.try_get("ts")?,
                })
            })
            .collect()
    }

    async fn append_parsed(&self, rows: &[ParsedMessage]) -> Result<u64, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for parsed in rows {
            let candidate = &parsed.candidate;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO parsed_messages (
                    name, undergraduate_institution, graduate_institution, program_major,
                    advisor, current_workplace, current_project_name, email,
                    quality_assessment, overall_summary, channel_id, ts
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(candidate.name.as_deref())
            .bind(candidate.undergraduate_institution.as_deref())
            .bind(candidate.graduate_institution.as_deref())
            .bind(candidate.program_major.as_deref())
            .bind(candidate.advisor.as_deref())
            .bind(candidate.current_workplace.as_deref())
            .bind(candidate.current_project_name.as_deref())
            .bind(candidate.email.as_deref())
            .bind(candidate.quality_assessment.map(|score| score.to_string()))
            .bind(candidate.overall_summary.as_deref())
            .bind(&parsed.channel_id)
            .bind(parsed.ts)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn tidy_view(&self, order: TidyOrder) -> Result<Vec<TidyRow>, RepositoryError> {
        let order_by = match order {
            TidyOrder::Timestamp => "ORDER BY pm.ts ASC",
            TidyOrder::Channel => "ORDER BY c.channel_name ASC, pm.ts ASC",
        };
        let rows = sqlx::query(&format!("{TIDY_SELECT} {order_by}")).fetch_all(&self.pool).await?;

        rows.iter().map(tidy_row_from_row).collect()
    }

    async fn candidate_counts_by_channel(&self) -> Result<Vec<ChannelCount>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "WITH table_group AS ({TIDY_SELECT})
             SELECT channel_name, COUNT(name) AS count
             FROM table_group
             GROUP BY channel_name
             ORDER BY count ASC, channel_name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ChannelCount {
                    channel_name: row.try_get("channel_name")?,
                    count: row.try_get("count")?,
                })
            })
            .collect()
    }
}

fn tidy_row_from_row(row: &SqliteRow) -> Result<TidyRow, RepositoryError> {
    let ts: i64 = row.try_get("ts")?;
    let quality_raw: Option<String> = row.try_get("quality_assessment")?;
    let quality_assessment = match quality_raw.as_deref().and_then(QualityScore::parse_lenient) {
        Some(Ok(score)) => Some(score),
        Some(Err(error)) => {
            warn!(
                event_name = "store.quality.unreadable",
                ts,
                error = %error,
                "stored quality assessment out of range; reading as null"
            );
            None
        }
        None => None,
    };

    let files = FileLinks::from_urls([
        row.try_get::<Option<String>, _>("file_1")?,
        row.try_get::<Option<String>, _>("file_2")?,
        row.try_get::<Option<String>, _>("file_3")?,
        row.try_get::<Option<String>, _>("file_4")?,
        row.try_get::<Option<String>, _>("file_5")?,
    ]);

    Ok(TidyRow {
        candidate: Candidate {
            name: row.try_get("name")?,
            undergraduate_institution: row.try_get("undergraduate_institution")?,
            graduate_institution: row.try_get("graduate_institution")?,
            program_major: row.try_get("program_major")?,
            advisor: row.try_get("advisor")?,
            current_workplace: row.try_get("current_workplace")?,
            current_project_name: row.try_get("current_project_name")?,
            email: row.try_get("email")?,
            quality_assessment,
            overall_summary: row.try_get("overall_summary")?,
        },
        channel_name: row.try_get("channel_name")?,
        ts,
        files,
    })
}

#[cfg(test)]
mod tests {
    use echolab_core::domain::candidate::{Candidate, ParsedMessage, QualityScore, TidyOrder};
    use echolab_core::domain::lookup::{Channel, User};
    use echolab_core::domain::message::{FileLinks, Message};

    use super::{MessageStore, SqlMessageStore};
    use crate::{connect_with_settings, fixtures::seed_lookups};

    type TestResult<T> = Result<T, String>;

    async fn setup_store() -> TestResult<SqlMessageStore> {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .map_err(|error| format!("connect: {error}"))?;
        let store = SqlMessageStore::new(pool);
        store.initialize().await.map_err(|error| format!("initialize: {error}"))?;
        Ok(store)
    }

    fn message(ts: i64, client_msg_id: &str, channel_id: &str) -> Message {
        Message {
            ts,
            client_msg_id: client_msg_id.to_owned(),
            channel_id: channel_id.to_owned(),
            user: Some("U06N7CSQQKZ".to_owned()),
            text: format!("candidate posting {ts}"),
            message_type: Some("message".to_owned()),
            team: None,
            display_as_bot: None,
            upload: Some(false),
            reply_count: None,
            reply_users_count: None,
            is_locked: None,
            subscribed: None,
            files: FileLinks::from_urls([Some(format!("https://files/{ts}"))]),
        }
    }

    fn parsed(ts: i64, channel_id: &str, name: &str) -> ParsedMessage {
        ParsedMessage {
            candidate: Candidate {
                name: Some(name.to_owned()),
                quality_assessment: QualityScore::new(7).ok(),
                ..Candidate::default()
            },
            channel_id: channel_id.to_owned(),
            ts,
        }
    }

    #[tokio::test]
    async fn overlapping_history_adds_no_duplicates() -> TestResult<()> {
        let store = setup_store().await?;

        let first = store
            .append_messages(&[message(100, "a", "C1"), message(200, "b", "C1")])
            .await
            .map_err(|error| error.to_string())?;
        let second = store
            .append_messages(&[message(200, "b", "C1"), message(300, "c", "C1")])
            .await
            .map_err(|error| error.to_string())?;

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        let unparsed = store.unparsed_messages().await.map_err(|error| error.to_string())?;
        assert_eq!(unparsed.iter().map(|row| row.ts).collect::<Vec<_>>(), vec![100, 200, 300]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_client_ids_still_collide() -> TestResult<()> {
        let store = setup_store().await?;

        store.append_messages(&[message(100, "", "C1")]).await.map_err(|error| error.to_string())?;
        let again =
            store.append_messages(&[message(100, "", "C1")]).await.map_err(|error| error.to_string())?;

        assert_eq!(again, 0);
        Ok(())
    }

    #[tokio::test]
    async fn parsed_rows_are_written_exactly_once() -> TestResult<()> {
        let store = setup_store().await?;
        store
            .append_messages(&[message(100, "a", "C1"), message(200, "b", "C1")])
            .await
            .map_err(|error| error.to_string())?;

        let first = store
            .append_parsed(&[parsed(100, "C1", "Ada")])
            .await
            .map_err(|error| error.to_string())?;
        let rerun = store
            .append_parsed(&[parsed(100, "C1", "Ada again")])
            .await
            .map_err(|error| error.to_string())?;

        assert_eq!(first, 1);
        assert_eq!(rerun, 0);
        let unparsed = store.unparsed_messages().await.map_err(|error| error.to_string())?;
        assert_eq!(unparsed.len(), 1);
        assert_eq!(unparsed[0].ts, 200);

        let tidy = store.tidy_view(TidyOrder::Timestamp).await.map_err(|error| error.to_string())?;
        assert_eq!(tidy.len(), 1);
        assert_eq!(tidy[0].candidate.name.as_deref(), Some("Ada"));
        Ok(())
    }

    #[tokio::test]
    async fn tidy_view_keeps_rows_without_channel_lookup() -> TestResult<()> {
        let store = setup_store().await?;
        seed_lookups(
            store.pool(),
            &[Channel { channel_id: "C1".into(), channel_name: "graduate_students".into() }],
            &[User { user_id: "U1".into(), user_name: "Chumi".into() }],
        )
        .await
        .map_err(|error| error.to_string())?;
        store
            .append_messages(&[message(100, "a", "C1"), message(200, "b", "C-UNKNOWN")])
            .await
            .map_err(|error| error.to_string())?;
        store
            .append_parsed(&[parsed(100, "C1", "Ada"), parsed(200, "C-UNKNOWN", "Grace")])
            .await
            .map_err(|error| error.to_string())?;

        let tidy = store.tidy_view(TidyOrder::Timestamp).await.map_err(|error| error.to_string())?;

        assert_eq!(tidy.len(), 2);
        assert_eq!(tidy[0].channel_name.as_deref(), Some("graduate_students"));
        assert_eq!(tidy[0].files.get(0), Some("https://files/100"));
        assert_eq!(tidy[0].candidate.quality_assessment.map(QualityScore::value), Some(7));
        assert_eq!(tidy[1].channel_name, None);
        assert_eq!(tidy[1].candidate.name.as_deref(), Some("Grace"));
        Ok(())
    }

    #[tokio::test]
    async fn candidate_counts_group_by_channel_name() -> TestResult<()> {
        let store = setup_store().await?;
        seed_lookups(
            store.pool(),
            &[
                Channel { channel_id: "C1".into(), channel_name: "graduate_students".into() },
                Channel { channel_id: "C2".into(), channel_name: "visiting_scholars".into() },
            ],
            &[],
        )
        .await
        .map_err(|error| error.to_string())?;
        store
            .append_parsed(&[parsed(1, "C1", "A"), parsed(2, "C1", "B"), parsed(3, "C2", "C")])
            .await
            .map_err(|error| error.to_string())?;

        let counts =
            store.candidate_counts_by_channel().await.map_err(|error| error.to_string())?;

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].channel_name.as_deref(), Some("visiting_scholars"));
        assert_eq!(counts[0].count, 1);
        assert_eq!(counts[1].count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_stored_quality_reads_as_null() -> TestResult<()> {
        let store = setup_store().await?;
        for (ts, name, quality) in [(100, "Ada", "7"), (200, "Grace", "85"), (300, "Edsger", "n/a")] {
            sqlx::query(
                "INSERT INTO parsed_messages (name, quality_assessment, channel_id, ts) VALUES (?, ?, 'C1', ?)",
            )
            .bind(name)
            .bind(quality)
            .bind(ts)
            .execute(store.pool())
            .await
            .map_err(|error| error.to_string())?;
        }

        let tidy = store.tidy_view(TidyOrder::Timestamp).await.map_err(|error| error.to_string())?;

        assert_eq!(tidy.len(), 3);
        assert_eq!(tidy[0].candidate.quality_assessment.map(QualityScore::value), Some(7));
        assert_eq!(tidy[1].candidate.name.as_deref(), Some("Grace"));
        assert_eq!(tidy[1].candidate.quality_assessment, None);
        assert_eq!(tidy[2].candidate.quality_assessment, None);
        Ok(())
    }
}
