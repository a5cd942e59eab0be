use log::{debug, info, warn};

use crate::{
    codec::{self, EncodedCommand},
    config::LaserDriverConfig,
    error::{Error, Result},
    register::{ChannelRegister, LaserChannel, Register, State},
    status::{self, BoardStatus},
    transport::{Readback, Transport},
};

/// Value reported by [`LaserDriver::read_named`] for names that are not in the catalog.
pub const UNREADABLE: i64 = -9999;

/// Re-reads after the first failed register read.
pub const READ_RETRIES: u8 = 5;

/// Above this maximum laser current the high current range scaling is used.
pub const HIGH_RANGE_THRESHOLD_MA: f64 = 115.0;
/// Datasheet calibration, high current range: register counts per mA = 245 / 980.
const HIGH_RANGE_SCALE: f64 = 245.0 / 980.0;
/// Datasheet calibration, low current range: register counts per mA = 245 / 110.25.
const LOW_RANGE_SCALE: f64 = 245.0 / 110.25;

/// Current range selector values written to the `IRANGE` register.
///
/// The mode value for the high range is `1` and for the low range `0`. The older tooling disagreed
/// with itself on this, the convention used here still needs confirmation against the datasheet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum CurrentRange {
    Low = 0,
    High = 1,
}

/// Result of a current limit calculation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CurrentLimit {
    /// Value written to the `ILIM` register.
    pub ilimit: u32,
    pub range: CurrentRange,
}

impl CurrentLimit {
    /// Pick the range and scale the laser's maximum current (mA) into register counts.
    pub fn for_max_current(max_current_ma: f64) -> Self {
        if max_current_ma > HIGH_RANGE_THRESHOLD_MA {
            Self {
                ilimit: (HIGH_RANGE_SCALE * max_current_ma).floor() as u32,
                range: CurrentRange::High,
            }
        } else {
            Self {
                ilimit: (LOW_RANGE_SCALE * max_current_ma).floor() as u32,
                range: CurrentRange::Low,
            }
        }
    }
}

/// The driver board's register API.
///
/// Binds one debug cable transport. Operations fail with [`Error::NoTransport`] until one is bound.
/// Nothing here reads back after a write, use [`crate::verify`] for that.
pub struct LaserDriver<T: Transport> {
    transport: Option<T>,
}

impl<T: Transport> LaserDriver<T> {
    /// Create a driver bound to a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// Create a driver with no transport yet.
    pub fn unbound() -> Self {
        Self { transport: None }
    }

    /// Bind a transport, replacing any bound before.
    pub fn bind(&mut self, transport: T) {
        self.transport = Some(transport);
    }

    /// `true` once a transport is bound. Register operations need one.
    pub fn is_bound(&self) -> bool {
        self.transport.is_some()
    }

    /// Hand the transport back, leaving the driver unbound.
    pub fn release(&mut self) -> Option<T> {
        self.transport.take()
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    fn transport(&mut self) -> Result<&mut T, T::Error> {
        self.transport.as_mut().ok_or(Error::NoTransport)
    }

    fn write_command(&mut self, command: EncodedCommand) -> Result<(), T::Error> {
        let hex = command.hex();
        debug!(
            "{} <- {} ({})",
            command.hardware,
            hex,
            command.register.name()
        );
        self.transport()?
            .write_register(command.hardware, &hex)
            .map_err(Error::Transport)
    }

    /// Encode and write one register.
    pub fn write_register(&mut self, register: Register, value: u32) -> Result<(), T::Error> {
        let command = codec::encode(register, value as i64)?;
        self.write_command(command)
    }

    /// Write the default image register by register, then save both channels.
    ///
    /// Returns what was written, in write order. The board only applies saved values after a
    /// power cycle.
    pub fn reset_to_default(
        &mut self,
        image: &LaserDriverConfig,
    ) -> Result<Vec<(Register, u32)>, T::Error> {
        // Fail before touching the board if there is nothing to write to.
        self.transport()?;
        let entries = image.entries();
        for &(register, value) in &entries {
            let command = codec::encode(register, value as i64)?;
            info!(
                "Writing {register} : {value} | {} : {}",
                command.hardware,
                command.hex()
            );
            self.write_command(command)?;
        }
        self.save_values(LaserChannel::One)?;
        self.save_values(LaserChannel::Two)?;
        Ok(entries)
    }

    /// Turn a laser on or off.
    pub fn set_laser_state(
        &mut self,
        channel: LaserChannel,
        state: impl Into<State>,
    ) -> Result<(), T::Error> {
        let state = state.into();
        info!("Laser {channel} state -> {state:?}");
        self.write_register(channel.register(ChannelRegister::State), state as u32)
    }

    /// Set the laser power setpoint, 0-255.
    pub fn set_laser_power(&mut self, channel: LaserChannel, power: u8) -> Result<(), T::Error> {
        info!("Laser {channel} power -> {power}");
        self.write_register(channel.register(ChannelRegister::Power), power as u32)
    }

    /// Set the power level register, 0-255.
    pub fn set_plr(&mut self, channel: LaserChannel, plr: u8) -> Result<(), T::Error> {
        info!("Laser {channel} PLR -> {plr}");
        self.write_register(channel.register(ChannelRegister::Plr), plr as u32)
    }

    /// Derive and write the current limit and range from the laser's maximum current, then save.
    pub fn set_current_limit(
        &mut self,
        channel: LaserChannel,
        max_current_ma: f64,
    ) -> Result<CurrentLimit, T::Error> {
        let limit = CurrentLimit::for_max_current(max_current_ma);
        info!(
            "Laser {channel} max current {max_current_ma:.2} mA -> ILIM {} ({:?} range)",
            limit.ilimit, limit.range
        );
        self.write_register(channel.register(ChannelRegister::ILim), limit.ilimit)?;
        self.write_register(
            channel.register(ChannelRegister::IRange),
            limit.range as u32,
        )?;
        self.save_values(channel)?;
        Ok(limit)
    }

    /// Commit the channel's registers to the chip's persistent store.
    pub fn save_values(&mut self, channel: LaserChannel) -> Result<(), T::Error> {
        debug!("Saving laser {channel} registers");
        self.write_register(
            channel.register(ChannelRegister::Save),
            channel.index() as u32,
        )
    }

    /// Read and decode a register, retrying while the cable reports read errors.
    pub fn read_register(&mut self, register: Register) -> Result<u32, T::Error> {
        let hardware = register.entry().hardware;
        let transport = self.transport()?;
        let mut response = transport
            .read_register(hardware)
            .map_err(Error::Transport)?;
        let mut retries = 0;
        while response == Readback::ReadError && retries < READ_RETRIES {
            retries += 1;
            debug!("Read error on {register}, retry {retries}");
            response = transport
                .read_register(hardware)
                .map_err(Error::Transport)?;
        }
        match response {
            Readback::Value(raw) => Ok(codec::decode(register, raw)),
            Readback::ReadError => {
                warn!("Unable to read {register} ({hardware})");
                Err(Error::TransportReadError {
                    register,
                    attempts: retries + 1,
                })
            }
        }
    }

    /// Read a register by symbolic name. Unknown names give [`UNREADABLE`] instead of an error.
    pub fn read_named(&mut self, name: &str) -> Result<i64, T::Error> {
        match Register::from_name(name) {
            Ok(register) => Ok(self.read_register(register)? as i64),
            Err(_) => {
                warn!("{name} is not a known register");
                Ok(UNREADABLE)
            }
        }
    }

    /// Fresh read of the board status register.
    pub fn get_board_status(&mut self) -> Result<BoardStatus, T::Error> {
        let raw = self.read_register(Register::LaserStatus)?;
        let status = status::decode_status(raw);
        debug!("Board status {status}");
        Ok(status)
    }
}
