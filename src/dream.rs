use crate::error::CommandError;
use crate::protocol::Command;
use async_trait::async_trait;
use serde_json::Value;

/// The operations a DREAM instance accepts from the observatory.
#[async_trait]
pub trait Dream: Send + Sync {
    /// Permit DREAM to resume automated operations.
    async fn resume(&self) -> Result<(), CommandError>;

    /// Open the roof if DREAM has evaluated that it is safe to do so.
    async fn open_roof(&self) -> Result<(), CommandError>;

    async fn close_roof(&self) -> Result<(), CommandError>;

    /// Stop operations.
    async fn stop(&self) -> Result<(), CommandError>;

    /// Whether the observatory is ready to receive data.
    async fn set_ready_for_data(&self, ready: bool) -> Result<(), CommandError>;

    /// A data product has been received and archived.
    ///
    /// Takes no parameters yet; which ones are needed is still undecided.
    async fn set_data_archived(&self) -> Result<(), CommandError>;

    async fn set_weather_info(&self, weather_info: Value) -> Result<(), CommandError>;
}

pub async fn dispatch(dream: &dyn Dream, command: Command) -> Result<(), CommandError> {
    match command {
        Command::Resume => dream.resume().await,
        Command::OpenRoof => dream.open_roof().await,
        Command::CloseRoof => dream.close_roof().await,
        Command::Stop => dream.stop().await,
        Command::ReadyForData { ready } => dream.set_ready_for_data(ready).await,
        Command::DataArchived => dream.set_data_archived().await,
        Command::SetWeatherInfo { weather_info } => dream.set_weather_info(weather_info).await,
    }
}
