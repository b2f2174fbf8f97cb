use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use echolab_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

/// One effective setting: dotted key, rendered value, overriding env var.
struct Setting {
    key: &'static str,
    value: String,
    env_key: Option<&'static str>,
}

fn setting(key: &'static str, value: impl Into<String>, env_key: &'static str) -> Setting {
    Setting { key, value: value.into(), env_key: Some(env_key) }
}

fn file_only(key: &'static str, value: impl Into<String>) -> Setting {
    Setting { key, value: value.into(), env_key: None }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in effective_settings(&config) {
        let source = field_source(
            entry.key,
            entry.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn effective_settings(config: &AppConfig) -> Vec<Setting> {
    let channels = config
        .retrieval
        .channels
        .iter()
        .map(|channel| format!("{}={}", channel.name, channel.id))
        .collect::<Vec<_>>()
        .join(", ");

    vec![
        setting("database.url", &config.database.url, "ECHOLAB_DATABASE_URL"),
        setting(
            "database.max_connections",
            config.database.max_connections.to_string(),
            "ECHOLAB_DATABASE_MAX_CONNECTIONS",
        ),
        setting(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            "ECHOLAB_DATABASE_TIMEOUT_SECS",
        ),
        setting(
            "slack.app_token",
            redact_token(config.slack.app_token.expose_secret()),
            "ECHOLAB_SLACK_APP_TOKEN",
        ),
        setting(
            "slack.bot_token",
            redact_token(config.slack.bot_token.expose_secret()),
            "ECHOLAB_SLACK_BOT_TOKEN",
        ),
        setting(
            "dropbox.access_token",
            redact_optional(config.dropbox.access_token.as_ref()),
            "ECHOLAB_DROPBOX_ACCESS_TOKEN",
        ),
        setting("dropbox.folder_path", &config.dropbox.folder_path, "ECHOLAB_DROPBOX_FOLDER"),
        setting(
            "warehouse.credentials_path",
            config.warehouse.credentials_path.display().to_string(),
            "ECHOLAB_WAREHOUSE_CREDENTIALS",
        ),
        setting(
            "warehouse.year_cutoff",
            config.warehouse.year_cutoff.to_string(),
            "ECHOLAB_WAREHOUSE_YEAR_CUTOFF",
        ),
        file_only("warehouse.files_per_hour", config.warehouse.files_per_hour.to_string()),
        setting("llm.provider", format!("{:?}", config.llm.provider), "ECHOLAB_LLM_PROVIDER"),
        setting("llm.model", &config.llm.model, "ECHOLAB_LLM_MODEL"),
        setting("llm.base_url", config.llm_base_url(), "ECHOLAB_LLM_BASE_URL"),
        setting(
            "llm.api_key",
            redact_optional(config.llm.api_key.as_ref()),
            "ECHOLAB_LLM_API_KEY",
        ),
        setting(
            "llm.examples_path",
            config.llm.examples_path.display().to_string(),
            "ECHOLAB_LLM_EXAMPLES_PATH",
        ),
        setting(
            "sheets.spreadsheet_name",
            &config.sheets.spreadsheet_name,
            "ECHOLAB_SHEETS_SPREADSHEET",
        ),
        setting(
            "sheets.credentials_path",
            config
                .sheets
                .credentials_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<platform config dir>".to_string()),
            "ECHOLAB_SHEETS_CREDENTIALS",
        ),
        file_only("retrieval.channels", channels),
        file_only("retrieval.poster_ids", config.retrieval.poster_ids.join(", ")),
        setting(
            "retrieval.download",
            config.retrieval.download.to_string(),
            "ECHOLAB_RETRIEVAL_DOWNLOAD",
        ),
        setting(
            "retrieval.download_dir",
            config.retrieval.download_dir.display().to_string(),
            "ECHOLAB_RETRIEVAL_DOWNLOAD_DIR",
        ),
        setting("server.bind_address", &config.server.bind_address, "ECHOLAB_SERVER_BIND_ADDRESS"),
        setting(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            "ECHOLAB_SERVER_HEALTH_CHECK_PORT",
        ),
        setting("logging.level", &config.logging.level, "ECHOLAB_LOGGING_LEVEL"),
        setting("logging.format", format!("{:?}", config.logging.format), "ECHOLAB_LOGGING_FORMAT"),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("echolab.toml"), PathBuf::from("config/echolab.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_optional(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        _ => "<unset>".to_string(),
    }
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, field_source, redact_token};

    #[test]
    fn tokens_keep_only_their_prefix() {
        assert_eq!(redact_token("xoxb-123-456"), "xoxb-***");
        assert_eq!(redact_token("  "), "<empty>");
        assert_eq!(redact_token("opaque"), "<redacted>");
    }

    #[test]
    fn file_source_is_reported_for_nested_keys() {
        let doc: Value = "[retrieval]\ndownload = true\n".parse().expect("toml");

        assert!(contains_path(&doc, "retrieval.download"));
        assert!(!contains_path(&doc, "retrieval.download_dir"));
        assert_eq!(
            field_source("retrieval.download", None, Some(&doc), None),
            "file (config file)"
        );
        assert_eq!(field_source("logging.level", None, Some(&doc), None), "default");
    }
}
