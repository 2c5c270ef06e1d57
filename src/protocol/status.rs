use std::fmt;

use serde::{Deserialize, Serialize};

/// Status codes carried in the `st` field of every acknowledgement.
///
/// The integer values are part of the wire protocol and never change.
/// `NetworkError` is only ever produced locally, for transport failures and
/// for operations attempted without a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum StatusCode {
    Unknown,
    Ok,
    Failed,
    MalformedPacket,
    ServerError,
    InvalidToken,
    NotAllowed,
    ClientOffline,
    NetworkError,
    InvalidPacket,
    InvalidChannel,
}

impl StatusCode {
    pub const fn code(self) -> i64 {
        match self {
            StatusCode::Unknown => -1,
            StatusCode::Ok => 1,
            StatusCode::Failed => 0,
            StatusCode::MalformedPacket => 3,
            StatusCode::ServerError => 5,
            StatusCode::InvalidToken => 6,
            StatusCode::NotAllowed => 7,
            StatusCode::ClientOffline => 8,
            StatusCode::NetworkError => 9,
            StatusCode::InvalidPacket => 10,
            StatusCode::InvalidChannel => 11,
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl From<i64> for StatusCode {
    fn from(code: i64) -> Self {
        match code {
            1 => StatusCode::Ok,
            0 => StatusCode::Failed,
            3 => StatusCode::MalformedPacket,
            5 => StatusCode::ServerError,
            6 => StatusCode::InvalidToken,
            7 => StatusCode::NotAllowed,
            8 => StatusCode::ClientOffline,
            9 => StatusCode::NetworkError,
            10 => StatusCode::InvalidPacket,
            11 => StatusCode::InvalidChannel,
            _ => StatusCode::Unknown,
        }
    }
}

impl From<StatusCode> for i64 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.code())
    }
}
