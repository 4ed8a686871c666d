//! JSON schemas for the message shapes exchanged with the device.

use serde_json::{json, Value};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaName {
    Command,
    MasterServerStatus,
    CameraServerStatus,
    WeatherInfo,
    NewDataProducts,
}

impl SchemaName {
    /// Every schema, in declaration order.
    pub const ALL: [SchemaName; 5] = [
        SchemaName::Command,
        SchemaName::MasterServerStatus,
        SchemaName::CameraServerStatus,
        SchemaName::WeatherInfo,
        SchemaName::NewDataProducts,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaName::Command => "command",
            SchemaName::MasterServerStatus => "master_server_status",
            SchemaName::CameraServerStatus => "camera_server_status",
            SchemaName::WeatherInfo => "weather_info",
            SchemaName::NewDataProducts => "new_data_products",
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static COMMAND: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": "Schema for a command sent to the device",
        "type": "object",
        "properties": {
            "command_id": {"type": "integer", "minimum": 1},
            "key": {
                "enum": [
                    "resume",
                    "openRoof",
                    "closeRoof",
                    "stop",
                    "readyForData",
                    "dataArchived",
                    "setWeatherInfo"
                ]
            },
            "parameters": {"type": "object"},
            "time_command_sent": {"type": "number"}
        },
        "required": ["command_id", "key", "parameters", "time_command_sent"],
        "additionalProperties": false
    })
});

static MASTER_SERVER_STATUS: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": "Schema for the master server status",
        "type": "object",
        "properties": {
            "device": {"type": "integer", "minimum": 1, "maximum": 6},
            "state": {"type": "integer", "minimum": 1, "maximum": 9},
            "start_time": {"type": "number"},
            "stop_time": {"type": "number"},
            "error_code": {"enum": [1]},
            "rain_sensor": {"type": "boolean"},
            "roof_status": {"type": "integer", "minimum": 1, "maximum": 4}
        },
        "required": [
            "device",
            "state",
            "start_time",
            "stop_time",
            "error_code",
            "rain_sensor",
            "roof_status"
        ],
        "additionalProperties": false
    })
});

static CAMERA_SERVER_STATUS: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": "Schema for a camera server status",
        "type": "object",
        "properties": {
            "device": {"type": "integer", "minimum": 2, "maximum": 6},
            "state": {"type": "integer", "minimum": 1, "maximum": 9},
            "error_code": {"enum": [1]},
            "altitude": {"type": "number"},
            "azimuth": {"type": "number"},
            "last_exposure_time_stamp": {"type": "number"},
            "exposure_time": {"type": "number"}
        },
        "required": [
            "device",
            "state",
            "error_code",
            "altitude",
            "azimuth",
            "last_exposure_time_stamp",
            "exposure_time"
        ],
        "additionalProperties": false
    })
});

static WEATHER_INFO: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": "Schema for the weather info",
        "type": "object",
        "properties": {
            "temperature": {"type": "number"},
            "humidity": {"type": "number"},
            "wind_speed": {"type": "number"},
            "wind_direction": {"type": "number"},
            "pressure": {"type": "number"},
            "rain": {"type": "number"},
            "cloudcover": {"type": "number"},
            "safe_observing_conditions": {"type": "boolean"}
        },
        "required": [
            "temperature",
            "humidity",
            "wind_speed",
            "wind_direction",
            "pressure",
            "rain",
            "cloudcover",
            "safe_observing_conditions"
        ],
        "additionalProperties": false
    })
});

static NEW_DATA_PRODUCTS: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "description": "Schema for new data products",
        "type": "object",
        "properties": {
            "amount": {"type": "integer", "minimum": 1},
            "metadata": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "location": {"type": "string"},
                        "timestamp": {"type": "number"}
                    },
                    "required": ["name", "location", "timestamp"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["amount", "metadata"],
        "additionalProperties": false
    })
});

pub fn schema(name: SchemaName) -> &'static Value {
    match name {
        SchemaName::Command => &*COMMAND,
        SchemaName::MasterServerStatus => &*MASTER_SERVER_STATUS,
        SchemaName::CameraServerStatus => &*CAMERA_SERVER_STATUS,
        SchemaName::WeatherInfo => &*WEATHER_INFO,
        SchemaName::NewDataProducts => &*NEW_DATA_PRODUCTS,
    }
}

type Compiled = Result<jsonschema::Validator, String>;

/// One validator per schema, indexed by `SchemaName` discriminant.
static VALIDATORS: LazyLock<[Compiled; 5]> = LazyLock::new(|| {
    SchemaName::ALL.map(|name| {
        jsonschema::draft7::new(schema(name))
            .map_err(|e| format!("schema {name} does not compile: {e}"))
    })
});

/// Validates `document` against the named schema.
///
/// Returns every validation error message on failure.
pub fn validate(document: &Value, name: SchemaName) -> Result<(), Vec<String>> {
    let validator = VALIDATORS[name as usize]
        .as_ref()
        .map_err(|e| vec![e.clone()])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
