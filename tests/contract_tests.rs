use async_trait::async_trait;
use dream::device::telemetry::generate_new_data_products;
use dream::dream::dispatch;
use dream::error::CommandError;
use dream::protocol::schema::schema;
use dream::protocol::{
    command_id_of, current_timestamp, validate, CameraServerStatus, Command, CommandKey,
    CommandMessage, CommandResponse, CommandResponseMessage, Device, ErrorCode,
    MasterServerStatus, Parameters, RoofStatus, SchemaName, ServerState, WeatherInfo,
};
use dream::Dream;
use serde_json::{json, Value};
use std::sync::Mutex;

fn parameters(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

// ----------------------------------------------------------------------------
// Enumerations travel as integers
// ----------------------------------------------------------------------------

#[test]
fn test_enum_wire_values() {
    assert_eq!(json!(CommandResponse::Ack), json!(1));
    assert_eq!(json!(CommandResponse::Last), json!(2));
    assert_eq!(json!(CommandResponse::InvalidJson), json!(3));
    assert_eq!(json!(CommandResponse::CommandFailed), json!(4));

    assert_eq!(json!(RoofStatus::Closed), json!(1));
    assert_eq!(json!(RoofStatus::Open), json!(2));
    assert_eq!(json!(RoofStatus::Opening), json!(3));
    assert_eq!(json!(RoofStatus::Closing), json!(4));

    assert_eq!(json!(ServerState::Initializing), json!(1));
    assert_eq!(json!(ServerState::ShuttingDown), json!(9));
    assert_eq!(json!(ErrorCode::Ok), json!(1));
    assert_eq!(json!(Device::Master), json!(1));
    assert_eq!(json!(Device::Zenith), json!(6));
}

#[test]
fn test_enum_rejects_unknown_value() {
    assert!(serde_json::from_value::<RoofStatus>(json!(0)).is_err());
    assert!(serde_json::from_value::<RoofStatus>(json!(5)).is_err());
    assert!(serde_json::from_value::<CommandResponse>(json!("ACK")).is_err());
    assert_eq!(
        serde_json::from_value::<ServerState>(json!(7)).unwrap(),
        ServerState::Observing
    );
}

#[test]
fn test_only_ack_is_not_terminal() {
    assert!(!CommandResponse::Ack.is_terminal());
    assert!(CommandResponse::Last.is_terminal());
    assert!(CommandResponse::InvalidJson.is_terminal());
    assert!(CommandResponse::CommandFailed.is_terminal());
}

// ----------------------------------------------------------------------------
// Message shapes
// ----------------------------------------------------------------------------

#[test]
fn test_command_message_shape() {
    let message = CommandMessage {
        command_id: 3,
        key: CommandKey::ReadyForData,
        parameters: parameters(json!({"ready": true})),
        time_command_sent: 1_700_000_000.5,
    };
    let encoded = serde_json::to_value(&message).unwrap();

    assert_eq!(
        encoded,
        json!({
            "command_id": 3,
            "key": "readyForData",
            "parameters": {"ready": true},
            "time_command_sent": 1_700_000_000.5,
        })
    );
    assert!(validate(&encoded, SchemaName::Command).is_ok());
}

#[test]
fn test_command_message_accepts_integral_float_id() {
    let decoded: CommandMessage = serde_json::from_value(json!({
        "command_id": 7.0,
        "key": "stop",
        "parameters": {},
        "time_command_sent": 0.0,
    }))
    .unwrap();
    assert_eq!(decoded.command_id, 7);

    let fractional = serde_json::from_value::<CommandMessage>(json!({
        "command_id": 7.5,
        "key": "stop",
        "parameters": {},
        "time_command_sent": 0.0,
    }));
    assert!(fractional.is_err());
}

#[test]
fn test_command_id_of() {
    assert_eq!(command_id_of(&json!(4)), Some(4));
    assert_eq!(command_id_of(&json!(4.0)), Some(4));
    assert_eq!(command_id_of(&json!(4.25)), None);
    assert_eq!(command_id_of(&json!(1e300)), None);
    assert_eq!(command_id_of(&json!("4")), None);
}

#[test]
fn test_command_keys_are_camel_case() {
    let keys: Vec<Value> = CommandKey::ALL.iter().map(|key| json!(key)).collect();
    assert_eq!(
        keys,
        vec![
            json!("resume"),
            json!("openRoof"),
            json!("closeRoof"),
            json!("stop"),
            json!("readyForData"),
            json!("dataArchived"),
            json!("setWeatherInfo"),
        ]
    );
    for key in CommandKey::ALL {
        assert_eq!(json!(key), json!(key.as_str()));
        assert_eq!(key.to_string(), key.as_str());
    }
}

#[test]
fn test_command_response_shape() {
    let response = CommandResponseMessage::new(12, CommandResponse::Last);
    assert_eq!(
        serde_json::to_value(response).unwrap(),
        json!({"command_id": 12, "command_response": 2})
    );
}

#[test]
fn test_default_status_matches_schema() {
    let status = serde_json::to_value(MasterServerStatus::default()).unwrap();
    assert_eq!(
        status,
        json!({
            "device": 1,
            "state": 1,
            "start_time": 0.0,
            "stop_time": 0.0,
            "error_code": 1,
            "rain_sensor": true,
            "roof_status": 1,
        })
    );
    assert!(validate(&status, SchemaName::MasterServerStatus).is_ok());
}

#[test]
fn test_camera_status_matches_schema() {
    let status = serde_json::to_value(CameraServerStatus::new(Device::North)).unwrap();
    assert_eq!(
        status,
        json!({
            "device": 2,
            "state": 1,
            "error_code": 1,
            "altitude": 0.0,
            "azimuth": 0.0,
            "last_exposure_time_stamp": 0.0,
            "exposure_time": 0.0,
        })
    );
    assert!(validate(&status, SchemaName::CameraServerStatus).is_ok());

    let zenith = serde_json::to_value(CameraServerStatus::new(Device::Zenith)).unwrap();
    assert!(validate(&zenith, SchemaName::CameraServerStatus).is_ok());

    let master = serde_json::to_value(CameraServerStatus::new(Device::Master)).unwrap();
    assert!(validate(&master, SchemaName::CameraServerStatus).is_err());
    assert!(validate(&status, SchemaName::MasterServerStatus).is_err());
}

#[test]
fn test_default_weather_info_matches_schema() {
    let weather = serde_json::to_value(WeatherInfo::default()).unwrap();
    assert_eq!(weather["safe_observing_conditions"], json!(false));
    assert!(validate(&weather, SchemaName::WeatherInfo).is_ok());
}

#[test]
fn test_generated_data_products() {
    for _ in 0..50 {
        let batch = generate_new_data_products();
        assert!((1..=6).contains(&batch.amount));
        assert_eq!(batch.amount, batch.metadata.len());
        assert_eq!(batch.metadata[0].name, "NewDataProductZero");
        assert!(batch.metadata.iter().all(|p| p.location == "file:///"));

        let encoded = serde_json::to_value(&batch).unwrap();
        assert!(validate(&encoded, SchemaName::NewDataProducts).is_ok());
    }
}

#[test]
fn test_new_data_product_names_follow_position() {
    let batch = loop {
        let batch = generate_new_data_products();
        if batch.amount == 6 {
            break batch;
        }
    };
    let names: Vec<&str> = batch.metadata.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "NewDataProductZero",
            "NewDataProductOne",
            "NewDataProductTwo",
            "NewDataProductThree",
            "NewDataProductFour",
            "NewDataProductFive",
        ]
    );
}

// ----------------------------------------------------------------------------
// Schema registry
// ----------------------------------------------------------------------------

#[test]
fn test_every_schema_compiles() {
    for name in SchemaName::ALL {
        assert!(
            jsonschema::draft7::new(schema(name)).is_ok(),
            "schema {name} should compile"
        );
    }
}

#[test]
fn test_repeated_validation_gives_the_same_answer() {
    let weather = serde_json::to_value(WeatherInfo::default()).unwrap();
    for _ in 0..100 {
        assert!(validate(&weather, SchemaName::WeatherInfo).is_ok());
        assert!(validate(&json!({}), SchemaName::WeatherInfo).is_err());
    }
}

#[test]
fn test_command_schema_rejects_malformed_commands() {
    let valid = json!({
        "command_id": 1,
        "key": "resume",
        "parameters": {},
        "time_command_sent": current_timestamp(),
    });
    assert!(validate(&valid, SchemaName::Command).is_ok());

    for field in ["command_id", "key", "parameters", "time_command_sent"] {
        let mut missing = valid.clone();
        missing.as_object_mut().unwrap().remove(field);
        assert!(
            validate(&missing, SchemaName::Command).is_err(),
            "command without {field} should be rejected"
        );
    }

    let mut unknown_key = valid.clone();
    unknown_key["key"] = json!("makeCoffee");
    assert!(validate(&unknown_key, SchemaName::Command).is_err());

    let mut extra = valid.clone();
    extra["priority"] = json!(1);
    assert!(validate(&extra, SchemaName::Command).is_err());

    let mut zero_id = valid.clone();
    zero_id["command_id"] = json!(0);
    assert!(validate(&zero_id, SchemaName::Command).is_err());

    let mut string_id = valid;
    string_id["command_id"] = json!("1");
    assert!(validate(&string_id, SchemaName::Command).is_err());
}

#[test]
fn test_weather_schema_collects_every_error() {
    let errors = validate(
        &json!({"temperature": "warm", "humidity": "damp"}),
        SchemaName::WeatherInfo,
    )
    .unwrap_err();
    assert!(errors.len() >= 3, "expected several errors, got {errors:?}");
}

#[test]
fn test_status_schema_rejects_unknown_roof_status() {
    let mut status = serde_json::to_value(MasterServerStatus::default()).unwrap();
    status["roof_status"] = json!(5);
    assert!(validate(&status, SchemaName::MasterServerStatus).is_err());
}

// ----------------------------------------------------------------------------
// Command decoding
// ----------------------------------------------------------------------------

#[test]
fn test_from_parts_decodes_parameters() {
    assert_eq!(
        Command::from_parts(CommandKey::Resume, Parameters::new()).unwrap(),
        Command::Resume
    );
    assert_eq!(
        Command::from_parts(CommandKey::ReadyForData, parameters(json!({"ready": false})))
            .unwrap(),
        Command::ReadyForData { ready: false }
    );

    let weather = json!({"temperature": 1.0});
    assert_eq!(
        Command::from_parts(
            CommandKey::SetWeatherInfo,
            parameters(json!({"weather_info": weather.clone()}))
        )
        .unwrap(),
        Command::SetWeatherInfo {
            weather_info: weather
        }
    );

    for key in CommandKey::ALL {
        let command = match key {
            CommandKey::ReadyForData => {
                Command::from_parts(key, parameters(json!({"ready": true})))
            }
            CommandKey::SetWeatherInfo => {
                Command::from_parts(key, parameters(json!({"weather_info": {}})))
            }
            _ => Command::from_parts(key, Parameters::new()),
        };
        assert_eq!(command.unwrap().key(), key);
    }
}

#[test]
fn test_from_parts_rejects_mismatched_parameters() {
    assert!(Command::from_parts(CommandKey::ReadyForData, Parameters::new()).is_err());
    assert!(
        Command::from_parts(CommandKey::ReadyForData, parameters(json!({"ready": 1}))).is_err()
    );
    assert!(Command::from_parts(CommandKey::Stop, parameters(json!({"now": true}))).is_err());
    assert!(Command::from_parts(
        CommandKey::ReadyForData,
        parameters(json!({"ready": true, "soon": true}))
    )
    .is_err());
}

// ----------------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------------

#[derive(Default)]
struct RecordingDream {
    calls: Mutex<Vec<String>>,
}

impl RecordingDream {
    fn record(&self, call: impl Into<String>) -> Result<(), CommandError> {
        self.calls.lock().unwrap().push(call.into());
        Ok(())
    }
}

#[async_trait]
impl Dream for RecordingDream {
    async fn resume(&self) -> Result<(), CommandError> {
        self.record("resume")
    }

    async fn open_roof(&self) -> Result<(), CommandError> {
        Err(CommandError::RoofNotInState {
            expected: RoofStatus::Closed,
            actual: RoofStatus::Open,
        })
    }

    async fn close_roof(&self) -> Result<(), CommandError> {
        self.record("close_roof")
    }

    async fn stop(&self) -> Result<(), CommandError> {
        self.record("stop")
    }

    async fn set_ready_for_data(&self, ready: bool) -> Result<(), CommandError> {
        self.record(format!("set_ready_for_data({ready})"))
    }

    async fn set_data_archived(&self) -> Result<(), CommandError> {
        self.record("set_data_archived")
    }

    async fn set_weather_info(&self, weather_info: Value) -> Result<(), CommandError> {
        self.record(format!("set_weather_info({weather_info})"))
    }
}

#[tokio::test]
async fn test_dispatch_routes_each_command() {
    let dream = RecordingDream::default();

    for command in [
        Command::Resume,
        Command::CloseRoof,
        Command::Stop,
        Command::ReadyForData { ready: true },
        Command::DataArchived,
        Command::SetWeatherInfo {
            weather_info: json!({"rain": 0.0}),
        },
    ] {
        dispatch(&dream, command).await.unwrap();
    }
    assert!(matches!(
        dispatch(&dream, Command::OpenRoof).await,
        Err(CommandError::RoofNotInState { .. })
    ));

    assert_eq!(
        *dream.calls.lock().unwrap(),
        vec![
            "resume",
            "close_roof",
            "stop",
            "set_ready_for_data(true)",
            "set_data_archived",
            "set_weather_info({\"rain\":0.0})",
        ]
    );
}
