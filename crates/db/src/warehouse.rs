//! Read-only queries against the PostgreSQL station catalogue.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use echolab_core::domain::upload::{CatalogueEntry, UploadFingerprint, YearStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("failed to read warehouse credentials `{path}`: {source}")]
    ReadCredentials {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid warehouse credentials: {0}")]
    ParseCredentials(#[from] serde_yaml::Error),
    #[error("warehouse query failed: {0}")]
    Query(#[from] sqlx::Error),
}

#[derive(Deserialize)]
struct RawCredentials {
    user: String,
    pass: String,
    host: String,
    port: u16,
    db: String,
}

/// Connection settings read from a YAML file with `user`, `pass`, `host`,
/// `port` and `db` keys.
#[derive(Clone, Debug)]
pub struct WarehouseCredentials {
    pub user: String,
    pub password: SecretString,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl WarehouseCredentials {
    pub fn from_yaml_str(contents: &str) -> Result<Self, WarehouseError> {
        let raw: RawCredentials = serde_yaml::from_str(contents)?;
        Ok(Self {
            user: raw.user,
            password: SecretString::from(raw.pass),
            host: raw.host,
            port: raw.port,
            database: raw.db,
        })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, WarehouseError> {
        let contents = std::fs::read_to_string(path).map_err(|source| {
            WarehouseError::ReadCredentials { path: path.display().to_string(), source }
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(self.password.expose_secret())
            .database(&self.database)
    }
}

#[async_trait]
pub trait CatalogWarehouse: Send + Sync {
    /// Catalogue rows from `cutoff` onward whose fingerprint is not uploaded yet.
    async fn pending_catalogue(
        &self,
        uploaded: &BTreeSet<UploadFingerprint>,
        cutoff: NaiveDate,
    ) -> Result<Vec<CatalogueEntry>, WarehouseError>;

    /// The precomputed per-year status table.
    async fn status_log(&self) -> Result<Vec<YearStatus>, WarehouseError>;
}

pub struct PgCatalogWarehouse {
    pool: PgPool,
}

impl PgCatalogWarehouse {
    /// Builds a lazy pool; nothing connects until the first query.
    pub fn connect_lazy(credentials: &WarehouseCredentials, timeout_secs: u64) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
            .connect_lazy_with(credentials.connect_options());
        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// One row per crosswalk station record and year. A station whose name,
/// location, service time or state differs between records counts once per
/// variant.
const PENDING_CATALOGUE_SQL: &str = r#"
    SELECT year_query, usaf || wban AS station_id
    FROM noaa_raw_data.crosswalk_counties
    WHERE year_query >= $1
      AND NOT ((usaf || wban || year_query::text) = ANY($2))
    GROUP BY usaf, wban, year_query, name, station_lat, station_lon, service_time, state
    ORDER BY year_query, station_id
"#;

#[async_trait]
impl CatalogWarehouse for PgCatalogWarehouse {
    async fn pending_catalogue(
        &self,
        uploaded: &BTreeSet<UploadFingerprint>,
        cutoff: NaiveDate,
    ) -> Result<Vec<CatalogueEntry>, WarehouseError> {
        let fingerprints: Vec<String> =
            uploaded.iter().map(|fingerprint| fingerprint.as_str().to_owned()).collect();

        let rows = sqlx::query(PENDING_CATALOGUE_SQL)
            .bind(cutoff)
            .bind(&fingerprints)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(catalogue_entry_from_row).collect()
    }

    async fn status_log(&self) -> Result<Vec<YearStatus>, WarehouseError> {
        let rows = sqlx::query(
            r#"
            SELECT year_query, station_id, estimate_time_hr
            FROM noaa_raw_data.upload_status_log
            ORDER BY year_query
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(YearStatus {
                    year_query: row.try_get("year_query")?,
                    station_count: row.try_get("station_id")?,
                    estimate_time_hr: row.try_get("estimate_time_hr")?,
                })
            })
            .collect()
    }
}

fn catalogue_entry_from_row(row: &PgRow) -> Result<CatalogueEntry, WarehouseError> {
    Ok(CatalogueEntry { year_query: row.try_get("year_query")?, station_id: row.try_get("station_id")? })
}
