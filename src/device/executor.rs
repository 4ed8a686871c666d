use super::session::DeviceContext;
use super::telemetry::{spawn_new_data_products_loop, spawn_status_loop};
use crate::dream::{dispatch, Dream};
use crate::error::CommandError;
use crate::protocol::{
    command_id_of, validate, Command, CommandMessage, CommandResponse, CommandResponseMessage,
    RoofStatus, SchemaName, WeatherInfo,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Runs one command line through validate, ACK, execute and report.
///
/// Exactly one INVALID_JSON is written for a rejected command (when it
/// carries a usable id); an accepted one gets ACK followed by one of LAST or
/// COMMAND_FAILED.
pub async fn execute_and_monitor_command(ctx: DeviceContext, line: String) {
    let document: Value = match serde_json::from_str(&line) {
        Ok(document) => document,
        Err(e) => {
            warn!(error = %e, %line, "Discarding line that is not JSON");
            return;
        }
    };

    let message = match parse_command(&document) {
        Ok(message) => message,
        Err(errors) => {
            let command_id = document.get("command_id").and_then(command_id_of);
            warn!(?command_id, ?errors, "Rejecting invalid command");
            if let Some(command_id) = command_id {
                respond(&ctx, command_id, CommandResponse::InvalidJson).await;
            }
            return;
        }
    };

    let command_id = message.command_id;
    let key = message.key;
    respond(&ctx, command_id, CommandResponse::Ack).await;

    let outcome = match Command::from_parts(key, message.parameters) {
        Ok(command) => dispatch(&ctx, command).await,
        Err(source) => Err(CommandError::InvalidParameters { key, source }),
    };

    let response = match outcome {
        Ok(()) => {
            debug!(command_id, %key, "Command done");
            CommandResponse::Last
        }
        Err(e) => {
            warn!(command_id, %key, error = %e, "Command failed");
            CommandResponse::CommandFailed
        }
    };
    respond(&ctx, command_id, response).await;
}

/// Schema check followed by typed decoding.
fn parse_command(document: &Value) -> Result<CommandMessage, Vec<String>> {
    validate(document, SchemaName::Command)?;
    serde_json::from_value(document.clone()).map_err(|e| vec![e.to_string()])
}

async fn respond(ctx: &DeviceContext, command_id: i64, response: CommandResponse) {
    let message = CommandResponseMessage::new(command_id, response);
    if let Err(e) = ctx.writer.write(&message).await {
        debug!(command_id, ?response, error = %e, "Could not send command response");
    }
}

impl DeviceContext {
    /// Moves the roof from `from` through `moving` to `to`.
    ///
    /// The check and the first transition happen under one write lock, so of
    /// two racing commands only one sees the roof in `from`.
    async fn move_roof(
        &self,
        from: RoofStatus,
        moving: RoofStatus,
        to: RoofStatus,
    ) -> Result<(), CommandError> {
        {
            let mut status = self.state.master_server_status.write().await;
            if status.roof_status != from {
                return Err(CommandError::RoofNotInState {
                    expected: from,
                    actual: status.roof_status,
                });
            }
            status.roof_status = moving;
        }
        info!(roof_status = ?moving, "Roof moving");

        tokio::time::sleep(self.config.roof_duration).await;

        self.state.master_server_status.write().await.roof_status = to;
        info!(roof_status = ?to, "Roof done moving");
        Ok(())
    }
}

#[async_trait]
impl Dream for DeviceContext {
    async fn resume(&self) -> Result<(), CommandError> {
        debug!("resume");
        let ctx = self.clone();
        self.state
            .restart_status_task(move || spawn_status_loop(ctx))
            .await;
        Ok(())
    }

    async fn open_roof(&self) -> Result<(), CommandError> {
        debug!("open_roof");
        self.move_roof(RoofStatus::Closed, RoofStatus::Opening, RoofStatus::Open)
            .await
    }

    async fn close_roof(&self) -> Result<(), CommandError> {
        debug!("close_roof");
        self.move_roof(RoofStatus::Open, RoofStatus::Closing, RoofStatus::Closed)
            .await
    }

    async fn stop(&self) -> Result<(), CommandError> {
        debug!("stop");
        tokio::time::sleep(self.config.stop_duration).await;
        self.state.stop_status_task().await;
        Ok(())
    }

    async fn set_ready_for_data(&self, ready: bool) -> Result<(), CommandError> {
        debug!(ready, "set_ready_for_data");
        *self.state.client_ready_for_data.write().await = ready;
        if ready {
            let ctx = self.clone();
            self.state
                .restart_new_data_products_task(move || spawn_new_data_products_loop(ctx))
                .await;
        } else {
            self.state.stop_new_data_products_task().await;
        }
        Ok(())
    }

    async fn set_data_archived(&self) -> Result<(), CommandError> {
        debug!("set_data_archived");
        Ok(())
    }

    async fn set_weather_info(&self, weather_info: Value) -> Result<(), CommandError> {
        debug!(%weather_info, "set_weather_info");
        validate(&weather_info, SchemaName::WeatherInfo)
            .map_err(CommandError::InvalidWeatherInfo)?;
        let weather_info: WeatherInfo = serde_json::from_value(weather_info)
            .map_err(|e| CommandError::InvalidWeatherInfo(vec![e.to_string()]))?;

        *self.state.weather_info.write().await = weather_info;
        Ok(())
    }
}
