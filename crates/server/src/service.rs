use std::sync::Arc;

use async_trait::async_trait;
use echolab_core::errors::ApplicationError;
use echolab_db::MessageStore;
use echolab_slack::blocks::{self, MessageTemplate};
use echolab_slack::commands::{CommandContext, CommandRouteError, CommandService, StatusMode};
use tracing::info;

use crate::reload::{reload_message, ReloadPipeline};
use crate::status::StatusReporter;

/// A component that may have failed to build at startup. The failure is kept
/// so the command that needs it can answer with the reason.
pub type Component<T> = Result<T, ApplicationError>;

pub struct EchoLabCommandService {
    store: Arc<dyn MessageStore>,
    reload: Component<ReloadPipeline>,
    status: Component<StatusReporter>,
}

impl EchoLabCommandService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        reload: Component<ReloadPipeline>,
        status: Component<StatusReporter>,
    ) -> Self {
        Self { store, reload, status }
    }

    pub fn reload_pipeline(&self) -> Result<&ReloadPipeline, ApplicationError> {
        self.reload.as_ref().map_err(Clone::clone)
    }

    pub fn status_reporter(&self) -> Result<&StatusReporter, ApplicationError> {
        self.status.as_ref().map_err(Clone::clone)
    }
}

fn route_error(error: ApplicationError) -> CommandRouteError {
    CommandRouteError::Service(error.to_string())
}

#[async_trait]
impl CommandService for EchoLabCommandService {
    async fn summary(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError> {
        let counts = self
            .store
            .candidate_counts_by_channel()
            .await
            .map_err(|error| route_error(ApplicationError::Persistence(error.to_string())))?;
        info!(
            event_name = "command.summary.completed",
            correlation_id = %ctx.correlation_id,
            channels = counts.len(),
            "summarized candidates"
        );
        Ok(blocks::candidate_summary_message(&counts))
    }

    async fn reload(&self, ctx: &CommandContext) -> Result<MessageTemplate, CommandRouteError> {
        let pipeline = self.reload_pipeline().map_err(route_error)?;
        let report = pipeline
            .run()
            .await
            .map_err(|error| route_error(ApplicationError::Integration(error.to_string())))?;
        info!(
            event_name = "command.reload.completed",
            correlation_id = %ctx.correlation_id,
            run_id = %report.run_id,
            "reload finished"
        );
        Ok(reload_message(&report))
    }

    async fn upload_status(
        &self,
        mode: StatusMode,
        ctx: &CommandContext,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let reporter = self.status_reporter().map_err(route_error)?;
        let rows = reporter
            .report(mode)
            .await
            .map_err(|error| route_error(ApplicationError::Integration(error.to_string())))?;
        info!(
            event_name = "command.status.completed",
            correlation_id = %ctx.correlation_id,
            mode = ?mode,
            years = rows.len(),
            "reported upload status"
        );
        Ok(blocks::upload_status_message(mode, &rows))
    }
}
