use super::enums::{CommandResponse, Device, ErrorCode, RoofStatus, ServerState};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Named parameters of a command, as carried in the `parameters` object.
pub type Parameters = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKey {
    Resume,
    OpenRoof,
    CloseRoof,
    Stop,
    ReadyForData,
    DataArchived,
    SetWeatherInfo,
}

impl CommandKey {
    pub const ALL: [CommandKey; 7] = [
        CommandKey::Resume,
        CommandKey::OpenRoof,
        CommandKey::CloseRoof,
        CommandKey::Stop,
        CommandKey::ReadyForData,
        CommandKey::DataArchived,
        CommandKey::SetWeatherInfo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKey::Resume => "resume",
            CommandKey::OpenRoof => "openRoof",
            CommandKey::CloseRoof => "closeRoof",
            CommandKey::Stop => "stop",
            CommandKey::ReadyForData => "readyForData",
            CommandKey::DataArchived => "dataArchived",
            CommandKey::SetWeatherInfo => "setWeatherInfo",
        }
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads a command id, accepting integral floats such as `1.0`.
///
/// JSON Schema counts those as integers, so they pass the command schema.
pub fn command_id_of(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn deserialize_command_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    command_id_of(&value).ok_or_else(|| D::Error::custom(format!("invalid command_id {value}")))
}

/// A command as sent by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandMessage {
    #[serde(deserialize_with = "deserialize_command_id")]
    pub command_id: i64,
    pub key: CommandKey,
    pub parameters: Parameters,
    pub time_command_sent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandResponseMessage {
    pub command_id: i64,
    pub command_response: CommandResponse,
}

impl CommandResponseMessage {
    pub fn new(command_id: i64, command_response: CommandResponse) -> Self {
        Self {
            command_id,
            command_response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterServerStatus {
    pub device: Device,
    pub state: ServerState,
    /// Last start time, UNIX timestamp [s].
    pub start_time: f64,
    /// Last stop time, UNIX timestamp [s].
    pub stop_time: f64,
    pub error_code: ErrorCode,
    /// Whether a rain sensor is present.
    pub rain_sensor: bool,
    pub roof_status: RoofStatus,
}

impl Default for MasterServerStatus {
    fn default() -> Self {
        Self {
            device: Device::Master,
            state: ServerState::Initializing,
            start_time: 0.0,
            stop_time: 0.0,
            error_code: ErrorCode::Ok,
            rain_sensor: true,
            roof_status: RoofStatus::Closed,
        }
    }
}

/// Status of one of the four camera servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraServerStatus {
    pub device: Device,
    pub state: ServerState,
    pub error_code: ErrorCode,
    /// [deg]
    pub altitude: f64,
    /// [deg]
    pub azimuth: f64,
    /// UNIX timestamp of the last exposure [s].
    pub last_exposure_time_stamp: f64,
    /// [s]
    pub exposure_time: f64,
}

impl CameraServerStatus {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            state: ServerState::Initializing,
            error_code: ErrorCode::Ok,
            altitude: 0.0,
            azimuth: 0.0,
            last_exposure_time_stamp: 0.0,
            exposure_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherInfo {
    /// [ºC]
    pub temperature: f64,
    /// [%]
    pub humidity: f64,
    /// [m/s]
    pub wind_speed: f64,
    /// [º azimuth]
    pub wind_direction: f64,
    /// [Pa]
    pub pressure: f64,
    /// [mm]
    pub rain: f64,
    /// [%]
    pub cloudcover: f64,
    pub safe_observing_conditions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDataProduct {
    pub name: String,
    pub location: String,
    /// UNIX timestamp [s].
    pub timestamp: f64,
}

/// A batch announcing data products that are ready to be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDataProducts {
    pub amount: usize,
    pub metadata: Vec<NewDataProduct>,
}

impl NewDataProducts {
    pub fn new(metadata: Vec<NewDataProduct>) -> Self {
        Self {
            amount: metadata.len(),
            metadata,
        }
    }
}

/// A command with its parameters decoded for the command kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Resume,
    OpenRoof,
    CloseRoof,
    Stop,
    ReadyForData { ready: bool },
    DataArchived,
    SetWeatherInfo { weather_info: Value },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParameters {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadyForDataParameters {
    ready: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WeatherInfoParameters {
    weather_info: Value,
}

fn without_parameters(parameters: Value, command: Command) -> Result<Command, serde_json::Error> {
    serde_json::from_value::<NoParameters>(parameters).map(|_| command)
}

impl Command {
    /// Decodes `parameters` into the argument list of the `key` command.
    pub fn from_parts(key: CommandKey, parameters: Parameters) -> Result<Self, serde_json::Error> {
        let parameters = Value::Object(parameters);
        match key {
            CommandKey::Resume => without_parameters(parameters, Command::Resume),
            CommandKey::OpenRoof => without_parameters(parameters, Command::OpenRoof),
            CommandKey::CloseRoof => without_parameters(parameters, Command::CloseRoof),
            CommandKey::Stop => without_parameters(parameters, Command::Stop),
            CommandKey::ReadyForData => serde_json::from_value::<ReadyForDataParameters>(parameters)
                .map(|p| Command::ReadyForData { ready: p.ready }),
            CommandKey::DataArchived => without_parameters(parameters, Command::DataArchived),
            CommandKey::SetWeatherInfo => {
                serde_json::from_value::<WeatherInfoParameters>(parameters).map(|p| {
                    Command::SetWeatherInfo {
                        weather_info: p.weather_info,
                    }
                })
            }
        }
    }

    pub fn key(&self) -> CommandKey {
        match self {
            Command::Resume => CommandKey::Resume,
            Command::OpenRoof => CommandKey::OpenRoof,
            Command::CloseRoof => CommandKey::CloseRoof,
            Command::Stop => CommandKey::Stop,
            Command::ReadyForData { .. } => CommandKey::ReadyForData,
            Command::DataArchived => CommandKey::DataArchived,
            Command::SetWeatherInfo { .. } => CommandKey::SetWeatherInfo,
        }
    }
}
