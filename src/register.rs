//! This module is used to define the registers of the IC-HT laser driver chip.
//!
//! Every symbolic command the rest of the crate can issue is a variant of [`Register`]. The
//! catalog entry for a register ([`RegisterEntry`]) tells us which hardware register it lives in,
//! which channel field of that register it occupies, and how wide the field is.

use core::str::FromStr;

use strum_macros::{EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::error::RegisterError;

/// Hardware registers as addressed by the debug cable.
///
/// Most of these pack both laser channels side by side, see [`crate::codec::decode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr)]
pub enum HardwareRegister {
    /// __R/W__ - TEC target voltage. 16 bits per channel.
    #[strum(serialize = "src.hp.vtec")]
    Vtec,
    /// __R/W__ - Shared regulator delay compensation (RDCO).
    #[strum(serialize = "src.hp.dco")]
    Dco,
    /// __R/W__ - Power level register.
    #[strum(serialize = "src.hp.plr")]
    Plr,
    /// __R/W__ - Operating mode.
    /// * `0` - APC.
    #[strum(serialize = "src.hp.mode")]
    Mode,
    /// __R/W__ - Current range selector.
    #[strum(serialize = "src.hp.irange")]
    IRange,
    /// __R/W__ - Current limit.
    #[strum(serialize = "src.hp.ilim")]
    ILim,
    /// __R/W__ - Regulator delay compensation.
    #[strum(serialize = "src.hp.regcomp")]
    RegComp,
    /// __R/W__ - Offset compensation.
    #[strum(serialize = "src.hp.offsetcomp")]
    OffsetComp,
    /// __R/W__ - Channel 1 enable. Already channel scoped.
    #[strum(serialize = "src.state[0]")]
    State0,
    /// __R/W__ - Channel 2 enable. Already channel scoped.
    #[strum(serialize = "src.state[1]")]
    State1,
    /// __R/W__ - Channel 1 power setpoint. Already channel scoped.
    #[strum(serialize = "src.power[0]")]
    Power0,
    /// __R/W__ - Channel 2 power setpoint. Already channel scoped.
    #[strum(serialize = "src.power[1]")]
    Power1,
    /// __W__ - Save/burn trigger. Value written is the zero based channel index.
    #[strum(serialize = "src.hp.save")]
    Save,
    /// __R__ - Composite board status word. See [`crate::status`].
    #[strum(serialize = "src.hp.stat")]
    Stat,
}

impl HardwareRegister {
    /// The register identifier as the debug cable expects it.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// `true` for registers that already hold a single channel's value and are never shifted.
    pub fn is_channel_scoped(&self) -> bool {
        matches!(
            self,
            Self::State0 | Self::State1 | Self::Power0 | Self::Power1
        )
    }
}

impl core::fmt::Display for HardwareRegister {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a symbolic register lives in hardware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterEntry {
    pub hardware: HardwareRegister,
    /// Zero based channel field within the hardware register. `0` for global registers.
    pub channel: u8,
    /// Width of one channel's value field.
    pub value_bits: u8,
}

impl RegisterEntry {
    const fn new(hardware: HardwareRegister, channel: u8, value_bits: u8) -> Self {
        Self {
            hardware,
            channel,
            value_bits,
        }
    }

    /// Largest value that fits in the field.
    pub const fn max_value(&self) -> u32 {
        (1u32 << self.value_bits) - 1
    }
}

/// The register catalog.
///
/// Names match the keys used in the default configuration file, e.g. `LASER1_PLR`.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, EnumCount, EnumString,
    IntoStaticStr,
)]
pub enum Register {
    #[strum(serialize = "LASER1_TEC")]
    Laser1Tec,
    #[strum(serialize = "LASER2_TEC")]
    Laser2Tec,
    #[strum(serialize = "RDCO")]
    Rdco,
    #[strum(serialize = "LASER1_PLR")]
    Laser1Plr,
    #[strum(serialize = "LASER2_PLR")]
    Laser2Plr,
    #[strum(serialize = "LASER1_MODE")]
    Laser1Mode,
    #[strum(serialize = "LASER2_MODE")]
    Laser2Mode,
    #[strum(serialize = "LASER1_IRANGE")]
    Laser1IRange,
    #[strum(serialize = "LASER2_IRANGE")]
    Laser2IRange,
    #[strum(serialize = "LASER1_ILIM")]
    Laser1ILim,
    #[strum(serialize = "LASER2_ILIM")]
    Laser2ILim,
    #[strum(serialize = "LASER1_REG_DELAY_COMP")]
    Laser1RegDelayComp,
    #[strum(serialize = "LASER2_REG_DELAY_COMP")]
    Laser2RegDelayComp,
    #[strum(serialize = "LASER1_OFFSET_COMP")]
    Laser1OffsetComp,
    #[strum(serialize = "LASER2_OFFSET_COMP")]
    Laser2OffsetComp,
    #[strum(serialize = "LASER1_STATE")]
    Laser1State,
    #[strum(serialize = "LASER2_STATE")]
    Laser2State,
    #[strum(serialize = "LASER1_POW")]
    Laser1Pow,
    #[strum(serialize = "LASER2_POW")]
    Laser2Pow,
    #[strum(serialize = "LASER1_SAVE")]
    Laser1Save,
    #[strum(serialize = "LASER2_SAVE")]
    Laser2Save,
    /// Composite status word, decoded by [`crate::status::decode_status`].
    #[strum(serialize = "LASER_STATUS")]
    LaserStatus,
}

impl Register {
    /// Catalog lookup.
    pub const fn entry(&self) -> RegisterEntry {
        use HardwareRegister as H;
        use Register as R;
        match self {
            R::Laser1Tec => RegisterEntry::new(H::Vtec, 0, 16),
            R::Laser2Tec => RegisterEntry::new(H::Vtec, 1, 16),
            R::Rdco => RegisterEntry::new(H::Dco, 0, 8),
            R::Laser1Plr => RegisterEntry::new(H::Plr, 0, 8),
            R::Laser2Plr => RegisterEntry::new(H::Plr, 1, 8),
            R::Laser1Mode => RegisterEntry::new(H::Mode, 0, 8),
            R::Laser2Mode => RegisterEntry::new(H::Mode, 1, 8),
            R::Laser1IRange => RegisterEntry::new(H::IRange, 0, 8),
            R::Laser2IRange => RegisterEntry::new(H::IRange, 1, 8),
            R::Laser1ILim => RegisterEntry::new(H::ILim, 0, 8),
            R::Laser2ILim => RegisterEntry::new(H::ILim, 1, 8),
            R::Laser1RegDelayComp => RegisterEntry::new(H::RegComp, 0, 8),
            R::Laser2RegDelayComp => RegisterEntry::new(H::RegComp, 1, 8),
            R::Laser1OffsetComp => RegisterEntry::new(H::OffsetComp, 0, 8),
            R::Laser2OffsetComp => RegisterEntry::new(H::OffsetComp, 1, 8),
            R::Laser1State => RegisterEntry::new(H::State0, 0, 8),
            R::Laser2State => RegisterEntry::new(H::State1, 1, 8),
            R::Laser1Pow => RegisterEntry::new(H::Power0, 0, 8),
            R::Laser2Pow => RegisterEntry::new(H::Power1, 1, 8),
            R::Laser1Save => RegisterEntry::new(H::Save, 0, 8),
            R::Laser2Save => RegisterEntry::new(H::Save, 1, 8),
            R::LaserStatus => RegisterEntry::new(H::Stat, 0, 16),
        }
    }

    /// The symbolic name, e.g. `"LASER1_PLR"`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Look up a register by symbolic name.
    pub fn from_name(name: &str) -> Result<Self, RegisterError> {
        Register::from_str(name).map_err(|_| RegisterError::UnknownRegister(name.into()))
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// The two laser channels of the driver board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumIter, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LaserChannel {
    /// Laser 1, channel index 0.
    One,
    /// Laser 2, channel index 1.
    Two,
}

impl LaserChannel {
    /// Zero based channel index, as written to the save register.
    pub const fn index(&self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// One based channel number, as printed on the board.
    pub const fn number(&self) -> u8 {
        self.index() + 1
    }

    /// Resolve the per-channel catalog entry for a kind of register.
    pub const fn register(&self, kind: ChannelRegister) -> Register {
        use ChannelRegister as C;
        use Register as R;
        match (kind, self) {
            (C::Tec, Self::One) => R::Laser1Tec,
            (C::Tec, Self::Two) => R::Laser2Tec,
            (C::Plr, Self::One) => R::Laser1Plr,
            (C::Plr, Self::Two) => R::Laser2Plr,
            (C::Mode, Self::One) => R::Laser1Mode,
            (C::Mode, Self::Two) => R::Laser2Mode,
            (C::IRange, Self::One) => R::Laser1IRange,
            (C::IRange, Self::Two) => R::Laser2IRange,
            (C::ILim, Self::One) => R::Laser1ILim,
            (C::ILim, Self::Two) => R::Laser2ILim,
            (C::RegDelayComp, Self::One) => R::Laser1RegDelayComp,
            (C::RegDelayComp, Self::Two) => R::Laser2RegDelayComp,
            (C::OffsetComp, Self::One) => R::Laser1OffsetComp,
            (C::OffsetComp, Self::Two) => R::Laser2OffsetComp,
            (C::State, Self::One) => R::Laser1State,
            (C::State, Self::Two) => R::Laser2State,
            (C::Power, Self::One) => R::Laser1Pow,
            (C::Power, Self::Two) => R::Laser2Pow,
            (C::Save, Self::One) => R::Laser1Save,
            (C::Save, Self::Two) => R::Laser2Save,
        }
    }
}

impl TryFrom<u8> for LaserChannel {
    type Error = RegisterError;

    /// Accepts the one based channel number.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(RegisterError::InvalidChannel(other)),
        }
    }
}

impl From<LaserChannel> for u8 {
    fn from(value: LaserChannel) -> Self {
        value.number()
    }
}

impl core::fmt::Display for LaserChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Kinds of register which exist once per channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelRegister {
    Tec,
    Plr,
    Mode,
    IRange,
    ILim,
    RegDelayComp,
    OffsetComp,
    State,
    Power,
    Save,
}

/// Laser on/off, as written to the `src.state[n]` registers.
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Off = 0x00,
    On = 0x01,
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        matches!(value, State::On)
    }
}
