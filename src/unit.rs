//! Datasheet values of the laser being configured, as entered by the operator.

use crate::{meter::mw_to_dbm, register::LaserChannel};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LaserType {
    /// Constant power, regulated by the PLR.
    #[default]
    Apc,
    /// Constant current.
    Acc,
}

impl core::fmt::Display for LaserType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Apc => f.write_str("Constant Power (APC)"),
            Self::Acc => f.write_str("Constant Current (ACC)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaserUnitInfo {
    pub laser_sn: String,
    pub unit_sn: String,
    pub wavelength_nm: f64,
    pub operating_current_ma: f64,
    pub max_current_ma: f64,
    /// Nominal optical power, mW.
    pub power_mw: f64,
    pub channel: LaserChannel,
    /// Power meter input the laser is patched to, 1 based as labelled on the meter.
    pub meter_channel: u8,
    pub laser_type: LaserType,
}

impl Default for LaserUnitInfo {
    fn default() -> Self {
        Self {
            laser_sn: "12345".into(),
            unit_sn: "12345".into(),
            wavelength_nm: 1550.0,
            operating_current_ma: 1.0,
            max_current_ma: 1.0,
            power_mw: 1.0,
            channel: LaserChannel::One,
            meter_channel: 1,
            laser_type: LaserType::Apc,
        }
    }
}

impl LaserUnitInfo {
    /// Nominal optical power in dBm.
    pub fn power_dbm(&self) -> f64 {
        mw_to_dbm(self.power_mw)
    }

    /// Reject values the ramp can't work with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.power_mw > 0.0) {
            return Err("nominal power must be above 0 mW");
        }
        if !(self.max_current_ma > 0.0) {
            return Err("maximum current must be above 0 mA");
        }
        if !(self.wavelength_nm > 0.0) {
            return Err("wavelength must be above 0 nm");
        }
        if self.meter_channel == 0 {
            return Err("power meter channels start at 1");
        }
        Ok(())
    }
}

impl core::fmt::Display for LaserUnitInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "Laser Configuration Info:")?;
        writeln!(f, "  SN: {}", self.laser_sn)?;
        writeln!(f, "  Wavelength: {:.2} nm", self.wavelength_nm)?;
        writeln!(f, "  Operating Current: {:.2} mA", self.operating_current_ma)?;
        writeln!(f, "  Max Current: {:.2} mA", self.max_current_ma)?;
        writeln!(
            f,
            "  Nominal Power: {:.2} mW ({:.2} dBm)",
            self.power_mw,
            self.power_dbm()
        )?;
        writeln!(f, "  Channel: {}", self.channel)?;
        writeln!(f, "  Power Meter Channel: {}", self.meter_channel)?;
        write!(f, "  Type: {}", self.laser_type)
    }
}
