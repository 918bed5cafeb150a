use crate::error::ErrorKind;

/// Progress of a play request as seen by whoever started it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchState {
    /// Runtime and client build are being prepared.
    Preparing { version: String },
    Playing { version: String },
    Exited { code: i32 },
    Failed { kind: ErrorKind, message: String },
}
