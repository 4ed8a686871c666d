use dream::{Config, MockDream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Standard timeout for anything a test waits on.
pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Timings short enough for tests while keeping their relative order.
pub fn fast_config() -> Config {
    Config {
        listen_address: "127.0.0.1:0".to_string(),
        status_interval: Duration::from_millis(100),
        new_data_products_interval: Duration::from_millis(150),
        roof_duration: Duration::from_millis(300),
        stop_duration: Duration::from_millis(100),
        connect_timeout: Duration::from_secs(2),
        communicate_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_secs(2),
        settle_interval: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        run_data_products: 5,
        ..Config::default()
    }
}

#[allow(dead_code)]
pub struct TestDevice {
    pub dream: MockDream,
    /// Config pointing a controller at this device.
    pub config: Config,
}

impl TestDevice {
    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.dream.local_addr()
    }
}

pub async fn spawn_device() -> TestDevice {
    spawn_device_with(fast_config()).await
}

#[allow(dead_code)]
pub async fn spawn_device_with(config: Config) -> TestDevice {
    let dream = MockDream::start(config.clone())
        .await
        .expect("Failed to start MockDream");
    let config = Config {
        device_address: dream.local_addr().to_string(),
        ..config
    };
    TestDevice { dream, config }
}

/// Polls `condition` until it holds or `TIMEOUT` passes.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// A bare line-oriented client for poking the device directly.
#[allow(dead_code)]
pub struct LineClient {
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
}

#[allow(dead_code)]
impl LineClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to MockDream");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FramedRead::new(read_half, LinesCodec::new()),
            writer: FramedWrite::new(write_half, LinesCodec::new()),
        }
    }

    pub async fn write_line(&mut self, line: &str) {
        self.writer
            .send(line)
            .await
            .expect("Failed to write line");
    }

    pub async fn write(&mut self, value: &Value) {
        self.write_line(&value.to_string()).await;
    }

    pub async fn command(&mut self, command_id: i64, key: &str, parameters: Value) {
        self.write(&serde_json::json!({
            "command_id": command_id,
            "key": key,
            "parameters": parameters,
            "time_command_sent": dream::protocol::current_timestamp(),
        }))
        .await;
    }

    /// Next message, or `None` when nothing arrives within `within`.
    pub async fn try_read(&mut self, within: Duration) -> Option<Value> {
        match tokio::time::timeout(within, self.reader.next()).await {
            Ok(Some(Ok(line))) => {
                Some(serde_json::from_str(&line).expect("Device sent invalid JSON"))
            }
            Ok(Some(Err(e))) => panic!("Failed to read line: {e}"),
            Ok(None) | Err(_) => None,
        }
    }

    pub async fn read(&mut self) -> Value {
        self.try_read(TIMEOUT)
            .await
            .expect("Timed out waiting for a message")
    }

    /// True once the device has closed the connection, skipping anything
    /// still queued before the EOF.
    pub async fn closed_by_peer(&mut self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            match tokio::time::timeout_at(deadline, self.reader.next()).await {
                Ok(Some(Ok(_))) => continue,
                Ok(None) | Ok(Some(Err(_))) => return true,
                Err(_) => return false,
            }
        }
    }

    /// Next command response, skipping telemetry.
    pub async fn read_response(&mut self) -> Value {
        loop {
            let message = self.read().await;
            if message.get("command_response").is_some() {
                return message;
            }
        }
    }

    /// Reads until `predicate` matches, returning everything read.
    pub async fn read_until<P>(&mut self, mut predicate: P) -> Vec<Value>
    where
        P: FnMut(&Value) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let message = self.read().await;
            let done = predicate(&message);
            seen.push(message);
            if done {
                return seen;
            }
        }
    }
}

pub fn response(command_id: i64, code: u8) -> Value {
    serde_json::json!({"command_id": command_id, "command_response": code})
}

#[allow(dead_code)]
pub fn weather_info() -> Value {
    serde_json::json!({
        "temperature": 12.5,
        "humidity": 43.0,
        "wind_speed": 7.25,
        "wind_direction": 181.0,
        "pressure": 85000.0,
        "rain": 0.0,
        "cloudcover": 12.0,
        "safe_observing_conditions": true,
    })
}
