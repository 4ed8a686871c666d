use super::executor;
use super::state::SharedDeviceState;
use crate::config::Config;
use crate::error::DeviceError;
use crate::protocol::MAX_LINE_LENGTH;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Lines queued for the socket before writers have to wait.
const OUTBOUND_CAPACITY: usize = 64;

/// Bound on flushing what is left when a session ends.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// The only path to the client's socket.
///
/// Every message becomes one line that the writer task sends whole, so
/// concurrent command tasks and telemetry loops never interleave output.
/// A write waiting on a full queue gives up once the session is cancelled.
#[derive(Debug, Clone)]
pub struct SessionWriter {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
}

impl SessionWriter {
    pub async fn write<T: Serialize>(&self, message: &T) -> Result<(), DeviceError> {
        let line = serde_json::to_string(message)?;
        debug!(%line, "Writing data");
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DeviceError::SessionClosed),
            sent = self.tx.send(line) => sent.map_err(|_| DeviceError::SessionClosed),
        }
    }
}

/// Everything a command handler or telemetry loop needs.
#[derive(Debug, Clone)]
pub struct DeviceContext {
    pub config: Arc<Config>,
    pub state: SharedDeviceState,
    pub writer: SessionWriter,
}

#[derive(Debug)]
pub(crate) struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tears the session down and waits until the socket is closed.
    pub(crate) async fn close(self) {
        debug!(session_id = %self.id, "Closing session");
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(session_id = %self.id, error = %e, "Session task failed");
        }
    }
}

pub(crate) fn spawn_session(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<Config>,
    state: SharedDeviceState,
) -> SessionHandle {
    let id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let span = info_span!("session", session_id = %id, %peer);
    let task = tokio::spawn(run_session(stream, config, state, cancel.clone()).instrument(span));

    SessionHandle { id, cancel, task }
}

async fn run_session(
    stream: TcpStream,
    config: Arc<Config>,
    state: SharedDeviceState,
    cancel: CancellationToken,
) {
    info!("Client connected");
    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let sink = FramedWrite::new(write_half, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer_task = tokio::spawn(write_loop(sink, rx, cancel.clone()).in_current_span());

    let ctx = DeviceContext {
        config,
        state: state.clone(),
        writer: SessionWriter {
            tx,
            cancel: cancel.clone(),
        },
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                debug!(%line, "Read command line");
                tokio::spawn(
                    executor::execute_and_monitor_command(ctx.clone(), line.to_owned())
                        .in_current_span(),
                );
            }
            Some(Err(e)) => {
                error!(error = %e, "Read loop failed. Disconnecting.");
                break;
            }
            None => {
                info!("Client disconnected");
                break;
            }
        }
    }

    // Cancel before stopping telemetry, or a loop blocked on a full queue never ends.
    cancel.cancel();
    state.stop_telemetry().await;
    drop(ctx);
    if let Err(e) = writer_task.await {
        error!(error = %e, "Writer task failed");
    }
    debug!("Session closed");
}

async fn write_loop(
    mut sink: FramedWrite<OwnedWriteHalf, LinesCodec>,
    mut rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let sent = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sink.send(line) => sent,
        };
        if let Err(e) = sent {
            warn!(error = %e, "Failed to write to client");
            break;
        }
    }

    match tokio::time::timeout(CLOSE_TIMEOUT, SinkExt::<String>::close(&mut sink)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Failed to close client stream"),
        Err(_) => debug!("Client is not reading; dropping unsent data"),
    }
}
