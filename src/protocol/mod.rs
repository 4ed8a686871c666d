pub mod enums;
pub mod messages;
pub mod schema;

pub use enums::{CommandResponse, Device, ErrorCode, RoofStatus, ServerState};
pub use messages::{
    command_id_of, CameraServerStatus, Command, CommandKey, CommandMessage,
    CommandResponseMessage, MasterServerStatus, NewDataProduct, NewDataProducts, Parameters,
    WeatherInfo,
};
pub use schema::{validate, SchemaName};

/// Upper bound on the length of a single protocol line.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Current time as UNIX seconds.
pub fn current_timestamp() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}
