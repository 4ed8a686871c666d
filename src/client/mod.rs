//! The controller end of the protocol.

pub mod classifier;
pub mod runner;

use crate::config::Config;
use crate::error::ClientError;
use crate::index_generator::IndexGenerator;
use crate::protocol::{
    current_timestamp, CommandKey, CommandMessage, Parameters, MAX_LINE_LENGTH,
};
use classifier::SharedControllerState;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info};

type LineReader = FramedRead<OwnedReadHalf, LinesCodec>;
type LineWriter = FramedWrite<OwnedWriteHalf, LinesCodec>;

pub struct MockDreamClient {
    config: Config,
    reader: Mutex<Option<LineReader>>,
    /// Also serializes every outbound write.
    writer: Mutex<Option<LineWriter>>,
    connected: AtomicBool,
    index_generator: Mutex<IndexGenerator>,
    mirror: SharedControllerState,
}

impl MockDreamClient {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
            index_generator: Mutex::new(IndexGenerator::default()),
            mirror: SharedControllerState::new(),
        }
    }

    /// Local view of the device, kept up to date by the message reader.
    pub fn mirror(&self) -> &SharedControllerState {
        &self.mirror
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        if self.connected() {
            return Err(ClientError::AlreadyConnected);
        }

        let address = self.config.device_address.as_str();
        let stream =
            with_timeout(self.config.connect_timeout, TcpStream::connect(address)).await??;
        let (read_half, write_half) = stream.into_split();

        *self.reader.lock().await = Some(FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ));
        *self.writer.lock().await = Some(FramedWrite::new(
            write_half,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ));
        self.connected.store(true, Ordering::SeqCst);
        info!(%address, "Connected to the device");
        Ok(())
    }

    /// Always safe to call.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            with_timeout(
                self.config.connect_timeout,
                SinkExt::<String>::close(&mut writer),
            )
            .await??;
        }
        // A running read loop still holds the reader; it lets go on EOF.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
        info!("Disconnected from the device");
        Ok(())
    }

    /// Reads one JSON object: a command response or telemetry.
    pub async fn read(&self) -> Result<Map<String, Value>, ClientError> {
        if !self.connected() {
            return Err(ClientError::NotConnected);
        }

        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ClientError::NotConnected)?;
        let line = match with_timeout(self.config.read_timeout, reader.next()).await? {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
            None => {
                self.connected.store(false, Ordering::SeqCst);
                return Err(ClientError::ConnectionClosed);
            }
        };
        drop(guard);

        debug!(%line, "Read line");
        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(ClientError::InvalidMessage { line }),
        }
    }

    /// Writes a command and returns its id.
    ///
    /// Does not wait for the response; the message reader records it in
    /// [`SharedControllerState::command_status`].
    pub async fn run_command(
        &self,
        key: CommandKey,
        parameters: Parameters,
    ) -> Result<i64, ClientError> {
        let command_id = self
            .index_generator
            .lock()
            .await
            .next()
            .unwrap_or_default();
        let message = CommandMessage {
            command_id,
            key,
            parameters,
            time_command_sent: current_timestamp(),
        };
        let line = serde_json::to_string(&message).map_err(ClientError::Encode)?;

        self.mirror.record_issued(&message).await;
        with_timeout(self.config.communicate_timeout, self.write_line(line)).await??;
        debug!(command_id, %key, "Command sent");
        Ok(command_id)
    }

    async fn write_line(&self, line: String) -> Result<(), ClientError> {
        let mut guard = self.writer.lock().await;
        if !self.connected() {
            return Err(ClientError::NotConnected);
        }
        let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
        writer.send(line).await?;
        Ok(())
    }
}

async fn with_timeout<F: std::future::Future>(
    limit: Duration,
    fut: F,
) -> Result<F::Output, ClientError> {
    timeout(limit, fut)
        .await
        .map_err(|_| ClientError::Timeout(limit))
}
