use super::classifier::read_loop;
use super::MockDreamClient;
use crate::config::Config;
use crate::error::{ClientError, RunError};
use crate::protocol::{CommandKey, CommandResponse, Parameters};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type ReaderTask = JoinHandle<Result<(), ClientError>>;

/// Drives the device through one scripted observing night.
pub struct MockDreamClientRunner {
    config: Config,
    client: Arc<MockDreamClient>,
}

impl MockDreamClientRunner {
    pub fn new(config: Config) -> Self {
        let client = Arc::new(MockDreamClient::new(config.clone()));
        Self { config, client }
    }

    pub fn client(&self) -> &Arc<MockDreamClient> {
        &self.client
    }

    /// resume, open the roof, collect data products, close the roof, stop.
    ///
    /// Returns the number of data products collected.
    pub async fn execute_nominal_run(&self) -> Result<usize, RunError> {
        self.client.connect().await?;

        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(self.client.clone(), cancel.clone()));

        let result = self.run_script(&reader).await;

        cancel.cancel();
        match reader.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Message reader ended with an error"),
            Err(e) => error!(error = %e, "Message reader task failed"),
        }
        if self.client.connected() {
            self.client.disconnect().await?;
        }

        result
    }

    async fn run_script(&self, reader: &ReaderTask) -> Result<usize, RunError> {
        tokio::time::sleep(self.config.settle_interval).await;

        self.run_and_wait(CommandKey::Resume, Parameters::new(), reader)
            .await?;
        self.run_and_wait(CommandKey::OpenRoof, Parameters::new(), reader)
            .await?;
        self.run_and_wait(CommandKey::ReadyForData, ready(true), reader)
            .await?;

        let collected = self.wait_for_data_products(reader).await?;
        info!(collected, "Collected data products");

        self.run_and_wait(CommandKey::ReadyForData, ready(false), reader)
            .await?;
        self.run_and_wait(CommandKey::CloseRoof, Parameters::new(), reader)
            .await?;
        self.run_and_wait(CommandKey::Stop, Parameters::new(), reader)
            .await?;

        Ok(collected)
    }

    async fn run_and_wait(
        &self,
        key: CommandKey,
        parameters: Parameters,
        reader: &ReaderTask,
    ) -> Result<(), RunError> {
        let command_id = self.client.run_command(key, parameters).await?;
        info!(command_id, %key, "Command issued");

        loop {
            match self.client.mirror().command_status(command_id).await {
                Some(CommandResponse::Last) => {
                    info!(command_id, %key, "Command done");
                    return Ok(());
                }
                Some(response @ (CommandResponse::InvalidJson | CommandResponse::CommandFailed)) => {
                    return Err(RunError::CommandRejected {
                        key,
                        command_id,
                        response,
                    });
                }
                Some(CommandResponse::Ack) | None => {}
            }
            if reader.is_finished() {
                return Err(RunError::ReaderStopped);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_for_data_products(&self, reader: &ReaderTask) -> Result<usize, RunError> {
        let target = self.config.run_data_products;
        loop {
            let count = self.client.mirror().new_data_product_count().await;
            if count >= target {
                return Ok(count);
            }
            if reader.is_finished() {
                return Err(RunError::ReaderStopped);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

fn ready(ready: bool) -> Parameters {
    let mut parameters = Parameters::new();
    parameters.insert("ready".to_string(), Value::Bool(ready));
    parameters
}
