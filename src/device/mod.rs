//! The device end of the protocol: a server that models one DREAM instance
//! and serves a single controller at a time.

pub mod executor;
pub mod session;
pub mod state;
pub mod telemetry;

use crate::config::Config;
use crate::error::DeviceError;
use session::{spawn_session, SessionHandle};
use state::SharedDeviceState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type SessionSlot = Arc<Mutex<Option<SessionHandle>>>;

pub struct MockDream {
    state: SharedDeviceState,
    local_addr: SocketAddr,
    session: SessionSlot,
    shutdown: CancellationToken,
    accept_task: JoinHandle<()>,
}

impl MockDream {
    /// Binds `config.listen_address` and starts accepting clients.
    pub async fn start(config: Config) -> Result<Self, DeviceError> {
        let listener = TcpListener::bind(&config.listen_address).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "MockDream listening");

        let state = SharedDeviceState::new();
        let session: SessionSlot = Arc::new(Mutex::new(None));
        let shutdown = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(config),
            state.clone(),
            session.clone(),
            shutdown.clone(),
        ));

        Ok(Self {
            state,
            local_addr,
            session,
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &SharedDeviceState {
        &self.state
    }

    pub async fn connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(SessionHandle::is_active)
    }

    /// Stop sending telemetry and close the client, if any.
    pub async fn disconnect(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Stops accepting clients and closes the current one.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Err(e) = (&mut self.accept_task).await {
            error!(error = %e, "Accept loop failed");
        }
        self.disconnect().await;
        info!(local_addr = %self.local_addr, "MockDream closed");
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: Arc<Config>,
    state: SharedDeviceState,
    session: SessionSlot,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                continue;
            }
        };

        let mut current = session.lock().await;
        if current.as_ref().is_some_and(SessionHandle::is_active) {
            warn!(%peer, "Rejecting client: another client is already connected");
            drop(stream);
            continue;
        }

        *current = Some(spawn_session(stream, peer, config.clone(), state.clone()));
    }
    debug!("Accept loop stopped");
}
