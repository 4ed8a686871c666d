use super::session::DeviceContext;
use crate::error::DeviceError;
use crate::protocol::{current_timestamp, validate, NewDataProduct, NewDataProducts, SchemaName};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument};

const DATA_PRODUCT_WORDS: [&str; 6] = ["Zero", "One", "Two", "Three", "Four", "Five"];
const DATA_PRODUCT_LOCATION: &str = "file:///";

/// A periodic producer running on its own task.
#[derive(Debug)]
pub struct TelemetryTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TelemetryTask {
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), DeviceError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let fut = body(cancel.clone());
        let handle = tokio::spawn(
            async move {
                debug!(telemetry = name, "Telemetry loop started");
                match fut.await {
                    Ok(()) => debug!(telemetry = name, "Telemetry loop stopped"),
                    Err(e) => error!(telemetry = name, error = %e, "Telemetry loop failed"),
                }
            }
            .in_current_span(),
        );

        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels the loop and waits for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                error!(telemetry = self.name, error = %e, "Telemetry loop panicked");
            }
        }
    }
}

pub fn spawn_status_loop(ctx: DeviceContext) -> TelemetryTask {
    TelemetryTask::spawn("status", move |cancel| status_loop(ctx, cancel))
}

pub fn spawn_new_data_products_loop(ctx: DeviceContext) -> TelemetryTask {
    TelemetryTask::spawn("new_data_products", move |cancel| {
        new_data_products_loop(ctx, cancel)
    })
}

async fn status_loop(ctx: DeviceContext, cancel: CancellationToken) -> Result<(), DeviceError> {
    loop {
        let status = ctx.state.master_server_status.read().await.clone();
        debug!("Sending status");
        let cancelled =
            send_or_cancelled(&ctx, &status, SchemaName::MasterServerStatus, &cancel).await?;
        if cancelled {
            return Ok(());
        }

        if sleep_or_cancelled(ctx.config.status_interval, &cancel).await {
            return Ok(());
        }
    }
}

async fn new_data_products_loop(
    ctx: DeviceContext,
    cancel: CancellationToken,
) -> Result<(), DeviceError> {
    loop {
        let new_data_products = generate_new_data_products();
        debug!(amount = new_data_products.amount, "Sending new data products");
        let cancelled =
            send_or_cancelled(&ctx, &new_data_products, SchemaName::NewDataProducts, &cancel)
                .await?;
        if cancelled {
            return Ok(());
        }

        if sleep_or_cancelled(ctx.config.new_data_products_interval, &cancel).await {
            return Ok(());
        }
    }
}

/// A batch of one to six products stamped with the current time.
pub fn generate_new_data_products() -> NewDataProducts {
    let count = rand::random_range(1..=DATA_PRODUCT_WORDS.len());
    let timestamp = current_timestamp();
    let metadata = DATA_PRODUCT_WORDS
        .iter()
        .take(count)
        .map(|word| NewDataProduct {
            name: format!("NewDataProduct{word}"),
            location: DATA_PRODUCT_LOCATION.to_string(),
            timestamp,
        })
        .collect();

    NewDataProducts::new(metadata)
}

async fn send_checked<T: Serialize>(
    ctx: &DeviceContext,
    message: &T,
    schema: SchemaName,
) -> Result<(), DeviceError> {
    if ctx.config.validate_telemetry {
        let document = serde_json::to_value(message)?;
        validate(&document, schema).map_err(|errors| DeviceError::InvalidTelemetry {
            schema: schema.as_str(),
            errors,
        })?;
    }
    ctx.writer.write(message).await
}

/// Returns true when cancelled before the message was queued.
async fn send_or_cancelled<T: Serialize>(
    ctx: &DeviceContext,
    message: &T,
    schema: SchemaName,
    cancel: &CancellationToken,
) -> Result<bool, DeviceError> {
    tokio::select! {
        _ = cancel.cancelled() => Ok(true),
        sent = send_checked(ctx, message, schema) => sent.map(|()| false),
    }
}

/// Returns true when cancelled before `period` elapsed.
async fn sleep_or_cancelled(period: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(period) => false,
    }
}
