use super::telemetry::TelemetryTask;
use crate::protocol::{MasterServerStatus, RoofStatus, WeatherInfo};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// State of the device, shared by the sessions of one server.
///
/// Written only by command handlers; telemetry loops only read it.
#[derive(Debug, Clone)]
pub struct SharedDeviceState {
    pub master_server_status: Arc<RwLock<MasterServerStatus>>,
    pub weather_info: Arc<RwLock<WeatherInfo>>,
    pub client_ready_for_data: Arc<RwLock<bool>>,
    status_task: Arc<Mutex<Option<TelemetryTask>>>,
    new_data_products_task: Arc<Mutex<Option<TelemetryTask>>>,
}

impl SharedDeviceState {
    pub fn new() -> Self {
        Self {
            master_server_status: Arc::new(RwLock::new(MasterServerStatus::default())),
            weather_info: Arc::new(RwLock::new(WeatherInfo::default())),
            client_ready_for_data: Arc::new(RwLock::new(false)),
            status_task: Arc::new(Mutex::new(None)),
            new_data_products_task: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn roof_status(&self) -> RoofStatus {
        self.master_server_status.read().await.roof_status
    }

    pub async fn weather_info(&self) -> WeatherInfo {
        self.weather_info.read().await.clone()
    }

    pub async fn client_ready_for_data(&self) -> bool {
        *self.client_ready_for_data.read().await
    }

    pub async fn status_loop_running(&self) -> bool {
        Self::running(&self.status_task).await
    }

    pub async fn new_data_products_loop_running(&self) -> bool {
        Self::running(&self.new_data_products_task).await
    }

    /// Starts a status loop, stopping the one it replaces first.
    pub(crate) async fn restart_status_task<F>(&self, start: F)
    where
        F: FnOnce() -> TelemetryTask + Send,
    {
        Self::restart(&self.status_task, start).await;
    }

    pub(crate) async fn stop_status_task(&self) {
        Self::stop(&self.status_task).await;
    }

    pub(crate) async fn restart_new_data_products_task<F>(&self, start: F)
    where
        F: FnOnce() -> TelemetryTask + Send,
    {
        Self::restart(&self.new_data_products_task, start).await;
    }

    pub(crate) async fn stop_new_data_products_task(&self) {
        Self::stop(&self.new_data_products_task).await;
    }

    /// Stops both telemetry loops, e.g. when the client goes away.
    pub(crate) async fn stop_telemetry(&self) {
        self.stop_status_task().await;
        self.stop_new_data_products_task().await;
    }

    async fn running(slot: &Mutex<Option<TelemetryTask>>) -> bool {
        slot.lock().await.as_ref().is_some_and(TelemetryTask::is_running)
    }

    async fn restart<F>(slot: &Mutex<Option<TelemetryTask>>, start: F)
    where
        F: FnOnce() -> TelemetryTask + Send,
    {
        Self::stop(slot).await;
        // A concurrent restart may have filled the slot in the meantime.
        let raced = slot.lock().await.replace(start());
        if let Some(raced) = raced {
            raced.stop().await;
        }
    }

    async fn stop(slot: &Mutex<Option<TelemetryTask>>) {
        let previous = slot.lock().await.take();
        if let Some(previous) = previous {
            previous.stop().await;
        }
    }
}

impl Default for SharedDeviceState {
    fn default() -> Self {
        Self::new()
    }
}
