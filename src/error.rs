//! Our error types for the laser driver board.

use thiserror::Error;

use crate::register::{LaserChannel, Register};

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Failures which are decided by the register catalog alone, no hardware involved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("Unknown register {0:?}")]
    UnknownRegister(String),
    #[error("Value {value} exceeds the {bits}-bit range of {register}")]
    OutOfRange {
        register: Register,
        value: i64,
        bits: u8,
    },
    #[error("Invalid laser channel {0}, expected 1 or 2")]
    InvalidChannel(u8),
}

/// Error type for operations against the driver board. `E` is the transport's own error.
#[derive(Error, Debug)]
pub enum Error<E: core::fmt::Debug> {
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error("Transport error: {0:?}")]
    Transport(E),
    #[error("Unable to read {register} after {attempts} attempts")]
    TransportReadError { register: Register, attempts: u8 },
    #[error("Laser {channel} over-current condition persists")]
    OverCurrentFault { channel: LaserChannel },
    #[error("Laser {channel} output reads {measured_dbm:.2} dBm with the laser barely enabled")]
    OutputNotDark { channel: LaserChannel, measured_dbm: f64 },
    #[error("Laser {channel} current limit did not read back after the power cycle")]
    CurrentLimitUnverified { channel: LaserChannel },
    #[error("Laser {channel} did not reach target power before PLR {plr}")]
    PlrLimitExceeded { channel: LaserChannel, plr: u8 },
    #[error("No debug cable connected")]
    NoTransport,
    #[error("No optical power meter connected")]
    NoPowerMeter,
    #[error("Power meter error: {0}")]
    PowerMeter(String),
    #[error("Operator declined: {0}")]
    OperatorDeclined(&'static str),
    #[error("Constant current (ACC) lasers are not supported")]
    UnsupportedLaserType,
    #[error("Invalid laser unit info: {0}")]
    InvalidUnitInfo(&'static str),
    #[error("Invalid APC settings: {0}")]
    InvalidSettings(&'static str),
}

/// Errors raised while loading or creating the default register image file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error("Unsupported config file version {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid APC settings: {0}")]
    InvalidSettings(&'static str),
}

/// Errors from the line based serial links (debug cable, power meter).
#[derive(Error, Debug)]
pub enum CableError<I: embedded_io::Error> {
    #[error("Serial communication error")]
    Serial(I),
    #[error("Response did not fit in the receive buffer")]
    BufferFull,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Command rejected by instrument")]
    Rejected,
}
