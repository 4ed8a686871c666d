use super::MockDreamClient;
use crate::error::ClientError;
use crate::protocol::{
    CameraServerStatus, CommandKey, CommandMessage, CommandResponse, CommandResponseMessage,
    Device, MasterServerStatus, NewDataProduct, NewDataProducts, Parameters, RoofStatus,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// An inbound message, classified by which keys it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    Status(MasterServerStatus),
    CameraStatus(CameraServerStatus),
    CommandResponse(CommandResponseMessage),
    NewDataProducts(NewDataProducts),
}

impl DeviceMessage {
    pub fn classify(message: Map<String, Value>) -> Result<Self, ClientError> {
        if message.contains_key("device") && message.contains_key("altitude") {
            decode(message).map(DeviceMessage::CameraStatus)
        } else if message.contains_key("device") {
            decode(message).map(DeviceMessage::Status)
        } else if message.contains_key("command_id") {
            decode(message).map(DeviceMessage::CommandResponse)
        } else if message.contains_key("metadata") {
            decode(message).map(DeviceMessage::NewDataProducts)
        } else {
            Err(ClientError::Unclassifiable(Value::Object(message).to_string()))
        }
    }
}

fn decode<T: DeserializeOwned>(message: Map<String, Value>) -> Result<T, ClientError> {
    let message = Value::Object(message);
    serde_json::from_value(message.clone())
        .map_err(|e| ClientError::Unclassifiable(format!("{message} ({e})")))
}

#[derive(Debug, Clone)]
struct IssuedCommand {
    key: CommandKey,
    parameters: Parameters,
}

/// Controller-side mirrors of the device, fed only by inbound messages.
#[derive(Debug, Clone, Default)]
pub struct SharedControllerState {
    pub master_server_status: Arc<RwLock<Option<MasterServerStatus>>>,
    pub roof_status: Arc<RwLock<Option<RoofStatus>>>,
    pub camera_server_status: Arc<RwLock<HashMap<Device, CameraServerStatus>>>,
    pub ready_for_data: Arc<RwLock<bool>>,
    pub command_status: Arc<RwLock<HashMap<i64, CommandResponse>>>,
    /// Every data product received, keyed by arrival order.
    pub new_data_products: Arc<RwLock<BTreeMap<usize, NewDataProduct>>>,
    issued_commands: Arc<RwLock<HashMap<i64, IssuedCommand>>>,
}

impl SharedControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn command_status(&self, command_id: i64) -> Option<CommandResponse> {
        self.command_status.read().await.get(&command_id).copied()
    }

    pub async fn roof_status(&self) -> Option<RoofStatus> {
        *self.roof_status.read().await
    }

    pub async fn camera_server_status(&self, device: Device) -> Option<CameraServerStatus> {
        self.camera_server_status.read().await.get(&device).cloned()
    }

    pub async fn ready_for_data(&self) -> bool {
        *self.ready_for_data.read().await
    }

    pub async fn new_data_product_count(&self) -> usize {
        self.new_data_products.read().await.len()
    }

    pub(crate) async fn record_issued(&self, message: &CommandMessage) {
        self.issued_commands.write().await.insert(
            message.command_id,
            IssuedCommand {
                key: message.key,
                parameters: message.parameters.clone(),
            },
        );
    }

    pub async fn apply(&self, message: DeviceMessage) {
        match message {
            DeviceMessage::Status(status) => {
                *self.roof_status.write().await = Some(status.roof_status);
                *self.master_server_status.write().await = Some(status);
            }
            DeviceMessage::CameraStatus(status) => {
                self.camera_server_status
                    .write()
                    .await
                    .insert(status.device, status);
            }
            DeviceMessage::CommandResponse(response) => {
                self.apply_command_response(response).await;
            }
            DeviceMessage::NewDataProducts(batch) => {
                let mut products = self.new_data_products.write().await;
                for product in batch.metadata {
                    let index = products.len();
                    products.insert(index, product);
                }
                debug!(total = products.len(), "New data products received");
            }
        }
    }

    async fn apply_command_response(&self, response: CommandResponseMessage) {
        let CommandResponseMessage {
            command_id,
            command_response,
        } = response;
        debug!(command_id, ?command_response, "Command response received");

        // Mirrors settle before the status that waiters poll on.
        if command_response == CommandResponse::Last {
            let issued = self.issued_commands.read().await.get(&command_id).cloned();
            if let Some(issued) = issued {
                if issued.key == CommandKey::ReadyForData {
                    if let Some(ready) = issued.parameters.get("ready").and_then(Value::as_bool) {
                        *self.ready_for_data.write().await = ready;
                    }
                }
            }
        }

        self.command_status
            .write()
            .await
            .insert(command_id, command_response);
    }
}

/// Reads and classifies messages until cancelled or a fatal error.
pub async fn read_loop(
    client: Arc<MockDreamClient>,
    cancel: CancellationToken,
) -> Result<(), ClientError> {
    info!("Message reader started");
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Message reader stopped");
                return Ok(());
            }
            message = client.read() => message,
        };

        let message = match message.and_then(DeviceMessage::classify) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Message reader failed");
                return Err(e);
            }
        };
        client.mirror().apply(message).await;
    }
}
