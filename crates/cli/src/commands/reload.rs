use std::sync::Arc;

use echolab_server::bootstrap::{build_command_service, open_store, HTTP_TIMEOUT};
use echolab_server::reload::reload_message;
use echolab_slack::web::SlackWebClient;

use crate::commands::{prepare, CommandResult, StepFailure};

/// Runs the retrieve, extract and publish pipeline once, as `/reload` does.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("reload") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_store(&config)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let slack = SlackWebClient::new(config.slack.bot_token.clone(), HTTP_TIMEOUT)
            .map_err(|error| ("slack_client", error.to_string(), 4u8))?;

        let service = build_command_service(&config, pool.clone(), Arc::new(slack));
        let outcome = match service.reload_pipeline() {
            Ok(pipeline) => pipeline
                .run()
                .await
                .map(|report| reload_message(&report).fallback_text)
                .map_err(|error| ("reload_failed", error.to_string(), 6u8)),
            Err(error) => Err(("component_unavailable", error.to_string(), 7u8)),
        };

        pool.close().await;
        outcome
    });

    finish(result)
}

fn finish(result: Result<String, StepFailure>) -> CommandResult {
    match result {
        Ok(message) => CommandResult::success("reload", message),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reload", error_class, message, exit_code)
        }
    }
}
