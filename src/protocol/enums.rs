use serde::{Deserialize, Serialize};

/// Declares a fieldless enum that travels on the wire as its 1-based integer
/// discriminant.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u8", try_from = "u8")]
        pub enum $name {
            $($variant = $value),+
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = String;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(format!("{other} is not a valid {}", stringify!($name))),
                }
            }
        }
    };
}

wire_enum! {
    /// The state the device server can be in.
    ServerState {
        Initializing = 1,
        Hibernating = 2,
        CoolingDown = 3,
        Calibrating = 4,
        Ready = 5,
        Open = 6,
        Observing = 7,
        Maintenance = 8,
        ShuttingDown = 9,
    }
}

wire_enum! {
    ErrorCode {
        Ok = 1,
    }
}

wire_enum! {
    /// Response code sent back for a command.
    CommandResponse {
        Ack = 1,
        Last = 2,
        InvalidJson = 3,
        CommandFailed = 4,
    }
}

wire_enum! {
    RoofStatus {
        Closed = 1,
        Open = 2,
        Opening = 3,
        Closing = 4,
    }
}

wire_enum! {
    /// The server a status message originates from.
    Device {
        Master = 1,
        North = 2,
        East = 3,
        South = 4,
        West = 5,
        Zenith = 6,
    }
}

impl CommandResponse {
    /// True for the responses after which no further response follows.
    pub fn is_terminal(self) -> bool {
        !matches!(self, CommandResponse::Ack)
    }
}
