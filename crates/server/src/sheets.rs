//! Google Sheets output for the candidates table.
//!
//! Authentication is the service-account flow: an RS256-signed JWT assertion
//! is exchanged for a short-lived OAuth access token, which is cached until
//! shortly before it expires. The spreadsheet is located by name through the
//! Drive API and its first worksheet is cleared before the new values land.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const DRIVE_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error(
        "no Google service account key found; set sheets.credentials_path or \
         GOOGLE_APPLICATION_CREDENTIALS, or place one at <config dir>/gspread/service_account.json"
    )]
    MissingCredentials,
    #[error("failed to read service account key `{path}`: {source}")]
    ReadCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("service account key is not valid JSON: {0}")]
    ParseCredentials(#[from] serde_json::Error),
    #[error("failed to sign service account assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Google request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid Google API url: {0}")]
    Url(String),
    #[error("no spreadsheet named `{0}` is shared with the service account")]
    SpreadsheetNotFound(String),
    #[error("spreadsheet `{0}` has no worksheets")]
    NoWorksheet(String),
}

/// Where published rows go. The first worksheet is replaced wholesale.
#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn overwrite_first_worksheet(
        &self,
        spreadsheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<usize, SheetsError>;
}

pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct RawServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json_str(contents: &str) -> Result<Self, SheetsError> {
        let raw: RawServiceAccountKey = serde_json::from_str(contents)?;
        Ok(Self {
            client_email: raw.client_email,
            private_key: raw.private_key.into(),
            token_uri: raw.token_uri,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| SheetsError::ReadCredentials { path: path.to_path_buf(), source })?;
        Self::from_json_str(&contents)
    }
}

/// `GOOGLE_APPLICATION_CREDENTIALS` first, then `<config dir>/gspread/service_account.json`.
pub fn default_credentials_path(
    env_value: Option<OsString>,
    config_dir: Option<PathBuf>,
) -> Option<PathBuf> {
    env_value
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| config_dir.map(|dir| dir.join("gspread").join("service_account.json")))
}

pub fn resolve_credentials_path(explicit: Option<&Path>) -> Result<PathBuf, SheetsError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    default_credentials_path(std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS"), dirs::config_dir())
        .filter(|path| path.exists())
        .ok_or(SheetsError::MissingCredentials)
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: SecretString,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: i64,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    token_url: String,
    drive_base_url: String,
    sheets_base_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheetsClient {
    pub fn new(key: ServiceAccountKey, timeout: Duration) -> Result<Self, SheetsError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let token_url = key.token_uri.clone().unwrap_or_else(|| GOOGLE_TOKEN_URL.to_owned());
        Ok(Self {
            http,
            key,
            token_url,
            drive_base_url: DRIVE_API_BASE_URL.to_owned(),
            sheets_base_url: SHEETS_API_BASE_URL.to_owned(),
            token: Mutex::new(None),
        })
    }

    pub fn from_credentials(explicit: Option<&Path>, timeout: Duration) -> Result<Self, SheetsError> {
        let path = resolve_credentials_path(explicit)?;
        info!(
            event_name = "system.sheets.credentials_resolved",
            path = %path.display(),
            "using google service account key"
        );
        Self::new(ServiceAccountKey::from_file(&path)?, timeout)
    }

    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        drive_base_url: impl Into<String>,
        sheets_base_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.drive_base_url = drive_base_url.into().trim_end_matches('/').to_owned();
        self.sheets_base_url = sheets_base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn signed_assertion(&self) -> Result<String, SheetsError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: SCOPES.to_owned(),
            aud: self.token_url.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.expose_secret().as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn access_token(&self) -> Result<SecretString, SheetsError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| Instant::now() < token.refresh_at) {
            return Ok(token.token.clone());
        }

        let assertion = self.signed_assertion()?;
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let response: TokenResponse = read_json(response).await?;
        debug!(expires_in = response.expires_in, "exchanged service account assertion");

        let token: SecretString = response.access_token.into();
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken { token: token.clone(), refresh_at: Instant::now() + lifetime });
        Ok(token)
    }

    pub async fn find_spreadsheet_id(&self, name: &str) -> Result<String, SheetsError> {
        let token = self.access_token().await?;
        let query = format!(
            "name = '{}' and mimeType = '{SPREADSHEET_MIME_TYPE}' and trashed = false",
            name.replace('\\', "\\\\").replace('\'', "\\'")
        );
        let response = self
            .http
            .get(format!("{}/files", self.drive_base_url))
            .bearer_auth(token.expose_secret())
            .query(&[("q", query.as_str()), ("fields", "files(id,name)"), ("pageSize", "1")])
            .send()
            .await?;
        let list: DriveFileList = read_json(response).await?;

        list.files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| SheetsError::SpreadsheetNotFound(name.to_owned()))
    }

    async fn first_worksheet_title(&self, spreadsheet_id: &str) -> Result<String, SheetsError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.sheets_url(spreadsheet_id, &[])?)
            .bearer_auth(token.expose_secret())
            .query(&[("fields", "sheets.properties(title,index)")])
            .send()
            .await?;
        let metadata: SpreadsheetMetadata = read_json(response).await?;

        metadata
            .sheets
            .into_iter()
            .min_by_key(|sheet| sheet.properties.index)
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| SheetsError::NoWorksheet(spreadsheet_id.to_owned()))
    }

    fn sheets_url(&self, spreadsheet_id: &str, tail: &[&str]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&format!("{}/spreadsheets", self.sheets_base_url))
            .map_err(|error| SheetsError::Url(error.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| SheetsError::Url(self.sheets_base_url.clone()))?
            .push(spreadsheet_id)
            .extend(tail);
        Ok(url)
    }
}

#[async_trait]
impl SpreadsheetSink for GoogleSheetsClient {
    async fn overwrite_first_worksheet(
        &self,
        spreadsheet_name: &str,
        values: &[Vec<String>],
    ) -> Result<usize, SheetsError> {
        let spreadsheet_id = self.find_spreadsheet_id(spreadsheet_name).await?;
        let title = self.first_worksheet_title(&spreadsheet_id).await?;
        let sheet_range = format!("'{}'", title.replace('\'', "''"));
        let clear_range = format!("{sheet_range}:clear");
        let start = format!("{sheet_range}!A1");
        let token = self.access_token().await?;

        let clear = self
            .http
            .post(self.sheets_url(&spreadsheet_id, &["values", clear_range.as_str()])?)
            .bearer_auth(token.expose_secret())
            .json(&json!({}))
            .send()
            .await?;
        ensure_success(clear).await?;

        let update = self
            .http
            .put(self.sheets_url(&spreadsheet_id, &["values", start.as_str()])?)
            .bearer_auth(token.expose_secret())
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": start, "majorDimension": "ROWS", "values": values }))
            .send()
            .await?;
        ensure_success(update).await?;

        info!(
            event_name = "publish.sheets.written",
            spreadsheet = spreadsheet_name,
            worksheet = %title,
            rows = values.len(),
            "overwrote first worksheet"
        );
        Ok(values.len())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SheetsError::Api { status: status.as_u16(), body })
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, SheetsError> {
    Ok(ensure_success(response).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::time::Duration;

    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{
        default_credentials_path, AssertionClaims, GoogleSheetsClient, ServiceAccountKey,
        SheetsError, SpreadsheetSink,
    };

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/test_service_account.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/test_service_account.pub.pem");

    fn client(server: &MockServer) -> GoogleSheetsClient {
        let key = ServiceAccountKey {
            client_email: "bot@echolab.iam.gserviceaccount.com".to_owned(),
            private_key: SecretString::from(PRIVATE_KEY.to_owned()),
            token_uri: None,
        };
        GoogleSheetsClient::new(key, Duration::from_secs(5)).expect("client").with_endpoints(
            format!("{}/token", server.uri()),
            format!("{}/drive/v3", server.uri()),
            format!("{}/v4", server.uri()),
        )
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant-type%3Ajwt-bearer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access_token": "ya29.test", "expires_in": 3600})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn credentials_fall_back_to_gspread_config_dir() {
        assert_eq!(
            default_credentials_path(Some(OsString::from("/keys/sa.json")), Some("/home/u/.config".into())),
            Some(PathBuf::from("/keys/sa.json"))
        );
        assert_eq!(
            default_credentials_path(None, Some(PathBuf::from("/home/u/.config"))),
            Some(PathBuf::from("/home/u/.config/gspread/service_account.json"))
        );
        assert_eq!(default_credentials_path(Some(OsString::new()), None), None);
    }

    #[test]
    fn key_file_parses_google_layout() {
        let key = ServiceAccountKey::from_json_str(
            &json!({
                "type": "service_account",
                "client_email": "bot@echolab.iam.gserviceaccount.com",
                "private_key": PRIVATE_KEY,
                "token_uri": "https://oauth2.googleapis.com/token"
            })
            .to_string(),
        )
        .expect("key");

        assert_eq!(key.client_email, "bot@echolab.iam.gserviceaccount.com");
        assert_eq!(key.token_uri.as_deref(), Some("https://oauth2.googleapis.com/token"));
    }

    #[test]
    fn assertion_is_rs256_signed_for_the_token_endpoint() {
        let server_uri = "http://127.0.0.1:9";
        let key = ServiceAccountKey {
            client_email: "bot@echolab.iam.gserviceaccount.com".to_owned(),
            private_key: SecretString::from(PRIVATE_KEY.to_owned()),
            token_uri: Some(format!("{server_uri}/token")),
        };
        let client = GoogleSheetsClient::new(key, Duration::from_secs(5)).expect("client");

        let assertion = client.signed_assertion().expect("assertion");

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[format!("{server_uri}/token")]);
        let decoded = decode::<AssertionClaims>(
            &assertion,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).expect("public key"),
            &validation,
        )
        .expect("assertion verifies");
        assert_eq!(decoded.claims.iss, "bot@echolab.iam.gserviceaccount.com");
        assert!(decoded.claims.scope.contains("spreadsheets"));
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 3600);
    }

    #[tokio::test]
    async fn overwrite_clears_then_writes_first_worksheet() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"files": [{"id": "sheet-1", "name": "test_candidates"}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    {"properties": {"title": "Archive", "index": 1}},
                    {"properties": {"title": "Sheet1", "index": 0}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/'Sheet1':clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-1/values/'Sheet1'!A1"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_json(json!({
                "range": "'Sheet1'!A1",
                "majorDimension": "ROWS",
                "values": [["name", "ts"], ["Ada", "2024-01-02"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"updatedRows": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let values = vec![
            vec!["name".to_owned(), "ts".to_owned()],
            vec!["Ada".to_owned(), "2024-01-02".to_owned()],
        ];
        let written =
            client(&server).overwrite_first_worksheet("test_candidates", &values).await.expect("write");

        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn unknown_spreadsheet_name_is_reported() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/drive/v3/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
            .mount(&server)
            .await;

        let error = client(&server).overwrite_first_worksheet("missing", &[]).await;

        assert!(matches!(error, Err(SheetsError::SpreadsheetNotFound(ref name)) if name == "missing"));
    }
}
