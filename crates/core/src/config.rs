use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_STATUS_FOLDER: &str = "/noaa/integrated_surface_updated/clean";
pub const DEFAULT_FILES_PER_HOUR: f64 = 150.0;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub dropbox: DropboxConfig,
    pub warehouse: WarehouseConfig,
    pub llm: LlmConfig,
    pub sheets: SheetsConfig,
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub app_token: SecretString,
    pub bot_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct DropboxConfig {
    pub access_token: Option<SecretString>,
    pub folder_path: String,
}

#[derive(Clone, Debug)]
pub struct WarehouseConfig {
    pub credentials_path: PathBuf,
    pub year_cutoff: NaiveDate,
    pub files_per_hour: f64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub examples_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub spreadsheet_name: String,
    pub credentials_path: Option<PathBuf>,
    pub share_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSeed {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub channels: Vec<ChannelSeed>,
    pub users: Vec<UserSeed>,
    pub poster_ids: Vec<String>,
    pub download: bool,
    pub download_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(alias = "openai")]
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub slack_app_token: Option<String>,
    pub slack_bot_token: Option<String>,
    pub dropbox_access_token: Option<String>,
    pub download: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://data/slackbot_messages.db?mode=rwc".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig { app_token: String::new().into(), bot_token: String::new().into() },
            dropbox: DropboxConfig {
                access_token: None,
                folder_path: DEFAULT_STATUS_FOLDER.to_string(),
            },
            warehouse: WarehouseConfig {
                credentials_path: PathBuf::from("db_credentials.yaml"),
                year_cutoff: NaiveDate::from_ymd_opt(2013, 1, 1).unwrap_or_default(),
                files_per_hour: DEFAULT_FILES_PER_HOUR,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: None,
                model: "gpt-3.5-turbo-0125".to_string(),
                timeout_secs: 60,
                max_retries: 2,
                examples_path: PathBuf::from("data/examples.json"),
            },
            sheets: SheetsConfig {
                spreadsheet_name: "test_candidates".to_string(),
                credentials_path: Some(PathBuf::from("creds.json")),
                share_url: None,
            },
            retrieval: RetrievalConfig {
                channels: vec![
                    channel("C06PSDC08AX", "graduate_students"),
                    channel("C06Q5A168DP", "research_assistants"),
                    channel("C06PRB2EX61", "visiting_scholars"),
                ],
                users: vec![
                    user("U06N7CSQQKZ", "Chumi"),
                    user("WBA9HFDCL", "Sam"),
                    user("U023Q2A64BU", "Me"),
                ],
                poster_ids: vec!["U06N7CSQQKZ".to_string(), "WBA9HFDCL".to_string()],
                download: false,
                download_dir: PathBuf::from("data/downloads"),
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn channel(id: &str, name: &str) -> ChannelSeed {
    ChannelSeed { id: id.to_string(), name: name.to_string() }
}

fn user(id: &str, name: &str) -> UserSeed {
    UserSeed { id: id.to_string(), name: name.to_string() }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("echolab.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Base URL the LLM client should talk to, falling back to the provider default.
    pub fn llm_base_url(&self) -> String {
        self.llm
            .base_url
            .clone()
            .unwrap_or_else(|| self.llm.provider.default_base_url().to_string())
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.retrieval.channels.iter().map(|channel| channel.id.clone()).collect()
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(slack) = patch.slack {
            if let Some(app_token) = slack.app_token {
                self.slack.app_token = secret_value(app_token);
            }
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
        }

        if let Some(dropbox) = patch.dropbox {
            if let Some(access_token) = dropbox.access_token {
                self.dropbox.access_token = Some(secret_value(access_token));
            }
            if let Some(folder_path) = dropbox.folder_path {
                self.dropbox.folder_path = folder_path;
            }
        }

        if let Some(warehouse) = patch.warehouse {
            if let Some(credentials_path) = warehouse.credentials_path {
                self.warehouse.credentials_path = credentials_path;
            }
            if let Some(year_cutoff) = warehouse.year_cutoff {
                self.warehouse.year_cutoff = year_cutoff;
            }
            if let Some(files_per_hour) = warehouse.files_per_hour {
                self.warehouse.files_per_hour = files_per_hour;
            }
            if let Some(timeout_secs) = warehouse.timeout_secs {
                self.warehouse.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
            if let Some(examples_path) = llm.examples_path {
                self.llm.examples_path = examples_path;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(spreadsheet_name) = sheets.spreadsheet_name {
                self.sheets.spreadsheet_name = spreadsheet_name;
            }
            if let Some(credentials_path) = sheets.credentials_path {
                self.sheets.credentials_path =
                    (!credentials_path.as_os_str().is_empty()).then_some(credentials_path);
            }
            if let Some(share_url) = sheets.share_url {
                self.sheets.share_url = Some(share_url);
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(channels) = retrieval.channels {
                self.retrieval.channels = channels;
            }
            if let Some(users) = retrieval.users {
                self.retrieval.users = users;
            }
            if let Some(poster_ids) = retrieval.poster_ids {
                self.retrieval.poster_ids = poster_ids;
            }
            if let Some(download) = retrieval.download {
                self.retrieval.download = download;
            }
            if let Some(download_dir) = retrieval.download_dir {
                self.retrieval.download_dir = download_dir;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ECHOLAB_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ECHOLAB_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("ECHOLAB_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ECHOLAB_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ECHOLAB_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ECHOLAB_SLACK_APP_TOKEN") {
            self.slack.app_token = secret_value(value);
        }
        if let Some(value) = read_env("ECHOLAB_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }

        if let Some(value) = read_env("ECHOLAB_DROPBOX_ACCESS_TOKEN") {
            self.dropbox.access_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("ECHOLAB_DROPBOX_FOLDER") {
            self.dropbox.folder_path = value;
        }

        if let Some(value) = read_env("ECHOLAB_WAREHOUSE_CREDENTIALS") {
            self.warehouse.credentials_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("ECHOLAB_WAREHOUSE_YEAR_CUTOFF") {
            self.warehouse.year_cutoff = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "ECHOLAB_WAREHOUSE_YEAR_CUTOFF".to_string(),
                    value: value.clone(),
                })?;
        }

        if let Some(value) = read_env("ECHOLAB_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("ECHOLAB_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ECHOLAB_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("ECHOLAB_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("ECHOLAB_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("ECHOLAB_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ECHOLAB_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("ECHOLAB_LLM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("ECHOLAB_LLM_EXAMPLES_PATH") {
            self.llm.examples_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("ECHOLAB_SHEETS_SPREADSHEET") {
            self.sheets.spreadsheet_name = value;
        }
        if let Some(value) = read_env("ECHOLAB_SHEETS_CREDENTIALS") {
            self.sheets.credentials_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("ECHOLAB_RETRIEVAL_DOWNLOAD") {
            self.retrieval.download = parse_bool("ECHOLAB_RETRIEVAL_DOWNLOAD", &value)?;
        }
        if let Some(value) = read_env("ECHOLAB_RETRIEVAL_DOWNLOAD_DIR") {
            self.retrieval.download_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("ECHOLAB_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ECHOLAB_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("ECHOLAB_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("ECHOLAB_LOGGING_LEVEL").or_else(|| read_env("ECHOLAB_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ECHOLAB_LOGGING_FORMAT").or_else(|| read_env("ECHOLAB_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(slack_app_token) = overrides.slack_app_token {
            self.slack.app_token = secret_value(slack_app_token);
        }
        if let Some(slack_bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(slack_bot_token);
        }
        if let Some(dropbox_access_token) = overrides.dropbox_access_token {
            self.dropbox.access_token = Some(secret_value(dropbox_access_token));
        }
        if let Some(download) = overrides.download {
            self.retrieval.download = download;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_dropbox(&self.dropbox)?;
        validate_warehouse(&self.warehouse)?;
        validate_llm(&self.llm)?;
        validate_sheets(&self.sheets)?;
        validate_retrieval(&self.retrieval)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("echolab.toml"), PathBuf::from("config/echolab.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let app_token = slack.app_token.expose_secret();
    if app_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.app_token is required. Get it from https://api.slack.com/apps > Your App > Basic Information > App-Level Tokens".to_string()
        ));
    }
    if !app_token.starts_with("xapp-") {
        let hint = if app_token.starts_with("xoxb-") {
            " (hint: you may have used the bot token instead of the app token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.app_token must start with `xapp-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_string()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }

    Ok(())
}

fn validate_dropbox(dropbox: &DropboxConfig) -> Result<(), ConfigError> {
    if !dropbox.folder_path.starts_with('/') {
        return Err(ConfigError::Validation(
            "dropbox.folder_path must be an absolute Dropbox path starting with `/`".to_string(),
        ));
    }
    Ok(())
}

fn validate_warehouse(warehouse: &WarehouseConfig) -> Result<(), ConfigError> {
    if !(warehouse.files_per_hour.is_finite() && warehouse.files_per_hour > 0.0) {
        return Err(ConfigError::Validation(
            "warehouse.files_per_hour must be a positive number".to_string(),
        ));
    }

    if warehouse.timeout_secs == 0 || warehouse.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "warehouse.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.provider == LlmProvider::OpenAi {
        let missing =
            llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "llm.api_key is required for the openai provider".to_string(),
            ));
        }
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_retrieval(retrieval: &RetrievalConfig) -> Result<(), ConfigError> {
    if let Some(channel) = retrieval.channels.iter().find(|channel| channel.id.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "retrieval.channels entry `{}` has an empty id",
            channel.name
        )));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    dropbox: Option<DropboxPatch>,
    warehouse: Option<WarehousePatch>,
    llm: Option<LlmPatch>,
    sheets: Option<SheetsPatch>,
    retrieval: Option<RetrievalPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    app_token: Option<String>,
    bot_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DropboxPatch {
    access_token: Option<String>,
    folder_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WarehousePatch {
    credentials_path: Option<PathBuf>,
    year_cutoff: Option<NaiveDate>,
    files_per_hour: Option<f64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    examples_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    spreadsheet_name: Option<String>,
    credentials_path: Option<PathBuf>,
    share_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalPatch {
    channels: Option<Vec<ChannelSeed>>,
    users: Option<Vec<UserSeed>>,
    poster_ids: Option<Vec<String>>,
    download: Option<bool>,
    download_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
