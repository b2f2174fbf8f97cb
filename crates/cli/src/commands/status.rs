use echolab_core::domain::upload::YearStatus;
use echolab_server::bootstrap::build_status_reporter;
use echolab_slack::blocks::upload_status_table;
use echolab_slack::commands::StatusMode;

use crate::commands::{prepare, CommandResult};

/// Prints the pending-upload table. `log` reads the precomputed status table
/// instead of listing the remote folder.
pub fn run(log: bool) -> CommandResult {
    let (config, runtime) = match prepare("status") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };
    let mode = if log { StatusMode::Log } else { StatusMode::Live };

    // The warehouse pool is created lazily and must be built inside the runtime.
    let result = runtime.block_on(async {
        let reporter = build_status_reporter(&config)
            .map_err(|error| ("component_unavailable", error.to_string(), 7u8))?;
        reporter.report(mode).await.map_err(|error| ("status_failed", error.to_string(), 6u8))
    });

    match result {
        Ok(rows) => CommandResult::success("status", render(&rows)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("status", error_class, message, exit_code)
        }
    }
}

fn render(rows: &[YearStatus]) -> String {
    if rows.is_empty() {
        return "everything is uploaded".to_string();
    }
    upload_status_table(rows)
}
