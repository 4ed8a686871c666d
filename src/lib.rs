pub mod client;
pub mod config;
pub mod device;
pub mod dream;
pub mod error;
pub mod index_generator;
pub mod logging;
pub mod protocol;

pub use client::classifier::{read_loop, DeviceMessage, SharedControllerState};
pub use client::runner::MockDreamClientRunner;
pub use client::MockDreamClient;
pub use config::Config;
pub use device::state::SharedDeviceState;
pub use device::MockDream;
pub use dream::Dream;
pub use index_generator::IndexGenerator;
