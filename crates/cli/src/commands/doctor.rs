use echolab_agent::load_examples;
use echolab_core::config::{AppConfig, LoadOptions};
use echolab_db::{connect_with_config, WarehouseCredentials};
use echolab_server::sheets::{resolve_credentials_path, ServiceAccountKey};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn from_result(name: &'static str, result: Result<String, String>) -> Self {
        match result {
            Ok(details) => Self { name, status: CheckStatus::Pass, details },
            Err(details) => Self { name, status: CheckStatus::Fail, details },
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: &[&str] = &[
    "slack_token_readiness",
    "database_connectivity",
    "few_shot_examples",
    "sheets_credentials",
    "warehouse_credentials",
    "dropbox_token",
];

pub fn run(json_output: bool) -> String {
    let report = build_report(AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string()));

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "slack_token_readiness",
                status: CheckStatus::Pass,
                details: "app and bot token prefixes validated by config".to_string(),
            });
            checks.push(check_database_connectivity(&config));
            checks.push(DoctorCheck::from_result("few_shot_examples", check_examples(&config)));
            checks.push(DoctorCheck::from_result("sheets_credentials", check_sheets(&config)));
            checks.push(DoctorCheck::from_result("warehouse_credentials", check_warehouse(&config)));
            checks.push(DoctorCheck::from_result("dropbox_token", check_dropbox(&config)));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error,
            });
            checks.extend(DEPENDENT_CHECKS.iter().copied().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    DoctorCheck::from_result(
        "database_connectivity",
        result.map(|()| format!("connected using `{}`", config.database.url)),
    )
}

fn check_examples(config: &AppConfig) -> Result<String, String> {
    let examples = load_examples(&config.llm.examples_path).map_err(|error| error.to_string())?;
    Ok(format!(
        "{} few-shot examples loaded from `{}`",
        examples.len(),
        config.llm.examples_path.display()
    ))
}

fn check_sheets(config: &AppConfig) -> Result<String, String> {
    let path = resolve_credentials_path(config.sheets.credentials_path.as_deref())
        .map_err(|error| error.to_string())?;
    let key = ServiceAccountKey::from_file(&path).map_err(|error| error.to_string())?;
    Ok(format!("service account `{}` from `{}`", key.client_email, path.display()))
}

fn check_warehouse(config: &AppConfig) -> Result<String, String> {
    WarehouseCredentials::from_yaml_file(&config.warehouse.credentials_path)
        .map(|_| format!("credentials parsed from `{}`", config.warehouse.credentials_path.display()))
        .map_err(|error| error.to_string())
}

fn check_dropbox(config: &AppConfig) -> Result<String, String> {
    match &config.dropbox.access_token {
        Some(_) => Ok(format!("token set; listing `{}`", config.dropbox.folder_path)),
        None => Err("dropbox.access_token is not set (ECHOLAB_DROPBOX_ACCESS_TOKEN)".to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{build_report, render_human, CheckStatus};

    #[test]
    fn config_failure_skips_every_dependent_check() {
        let report = build_report(Err("slack.app_token is required".to_string()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks.len(), 7);
        assert!(report.checks[1..].iter().all(|check| check.status == CheckStatus::Skipped));

        let human = render_human(&report);
        assert!(human.contains("- [fail] config_validation: slack.app_token is required"));
        assert!(human.contains("- [skip] dropbox_token"));
    }
}
