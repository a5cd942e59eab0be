//! Optical power meter collaborator.

use core::fmt::Write;

use log::{debug, info};

use crate::{error::CableError, line::LineLink};

/// What the APC ramp needs from an optical power meter.
pub trait PowerMeter {
    type Error: core::fmt::Debug;

    /// Select the zero based detector channel.
    fn set_channel(&mut self, index: u8) -> Result<(), Self::Error>;

    fn set_wavelength(&mut self, nm: f64) -> Result<(), Self::Error>;

    /// Optical power in dBm.
    fn read_power(&mut self) -> Result<f64, Self::Error>;
}

impl<M: PowerMeter + ?Sized> PowerMeter for &mut M {
    type Error = M::Error;

    fn set_channel(&mut self, index: u8) -> Result<(), Self::Error> {
        (**self).set_channel(index)
    }

    fn set_wavelength(&mut self, nm: f64) -> Result<(), Self::Error> {
        (**self).set_wavelength(nm)
    }

    fn read_power(&mut self) -> Result<f64, Self::Error> {
        (**self).read_power()
    }
}

/// A SCPI style power meter on a serial line (`PM:Power?` and friends).
///
/// Units are switched to dBm when the meter is opened.
pub struct ScpiPowerMeter<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    link: LineLink<S, L>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> ScpiPowerMeter<S, L> {
    pub fn open(interface: S) -> Result<Self, CableError<S::Error>> {
        let mut meter = Self {
            link: LineLink::new(interface),
        };
        meter.link.send("PM:Units 1")?;
        info!("Power meter opened, units set to dBm");
        Ok(meter)
    }

    pub fn release(self) -> S {
        self.link.release()
    }

    fn send_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), CableError<S::Error>> {
        let mut command: heapless::String<32> = heapless::String::new();
        command.write_fmt(args).map_err(|_| CableError::BufferFull)?;
        debug!("power meter <- {command}");
        self.link.send(&command)
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> PowerMeter
    for ScpiPowerMeter<S, L>
{
    type Error = CableError<S::Error>;

    fn set_channel(&mut self, index: u8) -> Result<(), Self::Error> {
        self.send_fmt(format_args!("PM:Chan {}", index))
    }

    fn set_wavelength(&mut self, nm: f64) -> Result<(), Self::Error> {
        self.send_fmt(format_args!("PM:Lambda {:.2}", nm))
    }

    fn read_power(&mut self) -> Result<f64, Self::Error> {
        let response = self.link.query("PM:Power?")?;
        let trimmed = response.as_str();
        if trimmed.contains("ERR") || trimmed.contains("OVER") || trimmed.contains("UNDER") {
            return Err(CableError::Rejected);
        }
        trimmed
            .parse::<f64>()
            .map_err(|_| CableError::InvalidResponse)
    }
}

/// Convert milliwatts to dBm.
pub fn mw_to_dbm(power_mw: f64) -> f64 {
    10.0 * power_mw.log10()
}
