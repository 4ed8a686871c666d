use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Address the device listens on.
    pub listen_address: String,
    /// Address the controller connects to.
    pub device_address: String,
    pub status_interval: Duration,
    pub new_data_products_interval: Duration,
    /// Time the roof takes to open or close.
    pub roof_duration: Duration,
    pub stop_duration: Duration,
    pub connect_timeout: Duration,
    /// Bound on acquiring the write lock and writing one command.
    pub communicate_timeout: Duration,
    pub read_timeout: Duration,
    /// Pause between connecting and the first command of a run.
    pub settle_interval: Duration,
    pub poll_interval: Duration,
    /// Number of data products a run collects before closing up.
    pub run_data_products: usize,
    /// Re-validate outgoing telemetry against its schema.
    pub validate_telemetry: bool,
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: "0.0.0.0:5000".to_string(),
            device_address: "127.0.0.1:5000".to_string(),
            status_interval: Duration::from_secs(5),
            new_data_products_interval: Duration::from_secs(7),
            roof_duration: Duration::from_secs(4),
            stop_duration: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
            communicate_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            settle_interval: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
            run_data_products: 10,
            validate_telemetry: true,
            log_dir: "./logs".to_string(),
        }
    }
}

impl Config {
    /// Reads `DREAM_*` variables, falling back to the defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            listen_address: env::var("DREAM_LISTEN_ADDRESS").unwrap_or(defaults.listen_address),
            device_address: env::var("DREAM_DEVICE_ADDRESS").unwrap_or(defaults.device_address),
            status_interval: millis("DREAM_STATUS_INTERVAL_MS", defaults.status_interval)?,
            new_data_products_interval: millis(
                "DREAM_NEW_DATA_PRODUCTS_INTERVAL_MS",
                defaults.new_data_products_interval,
            )?,
            roof_duration: millis("DREAM_ROOF_DURATION_MS", defaults.roof_duration)?,
            stop_duration: millis("DREAM_STOP_DURATION_MS", defaults.stop_duration)?,
            connect_timeout: millis("DREAM_CONNECT_TIMEOUT_MS", defaults.connect_timeout)?,
            communicate_timeout: millis(
                "DREAM_COMMUNICATE_TIMEOUT_MS",
                defaults.communicate_timeout,
            )?,
            read_timeout: millis("DREAM_READ_TIMEOUT_MS", defaults.read_timeout)?,
            settle_interval: millis("DREAM_SETTLE_INTERVAL_MS", defaults.settle_interval)?,
            poll_interval: millis("DREAM_POLL_INTERVAL_MS", defaults.poll_interval)?,
            run_data_products: parsed("DREAM_RUN_DATA_PRODUCTS", defaults.run_data_products)?,
            validate_telemetry: parsed("DREAM_VALIDATE_TELEMETRY", defaults.validate_telemetry)?,
            log_dir: env::var("DREAM_LOG_DIR").unwrap_or(defaults.log_dir),
        })
    }
}

fn parsed<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

fn millis(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parsed(var, default_ms).map(Duration::from_millis)
}
