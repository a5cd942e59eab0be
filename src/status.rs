//! Decoding of the 16-bit board status register (`LASER_STATUS`).
//!
//! The status word is never cached. Hardware flips these bits on its own, so every
//! [`crate::driver::LaserDriver::get_board_status`] call decodes a fresh read.

use std::collections::BTreeMap;

use modular_bitfield::prelude::*;
use strum::IntoEnumIterator;
use strum_macros::{EnumCount, EnumIter, IntoStaticStr};

use crate::register::LaserChannel;

/// Named bits of the status word, in bit order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, EnumCount, IntoStaticStr)]
#[repr(u8)]
pub enum StatusFlag {
    #[strum(serialize = "LASER1_STATE")]
    Laser1State = 0,
    #[strum(serialize = "LASER1_MON")]
    Laser1Mon = 1,
    /// Laser 1 LDK saturation.
    #[strum(serialize = "LASER1_LDKSAT")]
    Laser1LdkSat = 2,
    #[strum(serialize = "UNUSED")]
    Unused = 3,
    #[strum(serialize = "LASER2_STATE")]
    Laser2State = 4,
    #[strum(serialize = "LASER2_MON")]
    Laser2Mon = 5,
    /// Laser 2 LDK saturation.
    #[strum(serialize = "LASER2_LDKSAT")]
    Laser2LdkSat = 6,
    #[strum(serialize = "UNUSED_2")]
    Unused2 = 7,
    /// RAM initialisation in progress.
    #[strum(serialize = "INITRAM")]
    InitRam = 8,
    /// Supply fault.
    #[strum(serialize = "PDOVDD")]
    PdOvdd = 9,
    #[strum(serialize = "MEMERR")]
    MemErr = 10,
    /// Over temperature.
    #[strum(serialize = "OVT")]
    Ovt = 11,
    #[strum(serialize = "LASER2_OVC")]
    Laser2Ovc = 12,
    #[strum(serialize = "LASER1_OVC")]
    Laser1Ovc = 13,
    #[strum(serialize = "OSCERR")]
    OscErr = 14,
    /// Configuration timeout.
    #[strum(serialize = "CFGTIMO")]
    CfgTimo = 15,
}

impl StatusFlag {
    /// Bit offset within the status word.
    pub const fn offset(&self) -> u8 {
        *self as u8
    }

    /// Flag name as listed in the status table, e.g. `LASER1_OVC`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The over-current flag belonging to a channel.
    pub const fn overcurrent(channel: LaserChannel) -> Self {
        match channel {
            LaserChannel::One => Self::Laser1Ovc,
            LaserChannel::Two => Self::Laser2Ovc,
        }
    }
}

/// Typed view of the status word, bit 0 first.
#[bitfield(bits = 16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord {
    pub laser1_state: bool,
    pub laser1_mon: bool,
    pub laser1_ldksat: bool,
    pub unused: bool,
    pub laser2_state: bool,
    pub laser2_mon: bool,
    pub laser2_ldksat: bool,
    pub unused_2: bool,
    pub init_ram: bool,
    pub pd_ovdd: bool,
    pub mem_err: bool,
    pub ovt: bool,
    pub laser2_ovc: bool,
    pub laser1_ovc: bool,
    pub osc_err: bool,
    pub cfg_timo: bool,
}

/// One decoded read of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStatus {
    raw: u16,
    word: StatusWord,
}

/// Decode a raw status read-back. Bits above 15 are ignored.
pub fn decode_status(raw_status: u32) -> BoardStatus {
    let raw = (raw_status & 0xFFFF) as u16;
    BoardStatus {
        raw,
        word: StatusWord::from_bytes(raw.to_le_bytes()),
    }
}

impl BoardStatus {
    /// The masked 16-bit status word.
    pub fn raw(&self) -> u16 {
        self.raw
    }

    /// The status word as a bitfield, one accessor per flag.
    pub fn word(&self) -> StatusWord {
        self.word
    }

    /// Whether one flag of the table is asserted.
    pub fn is_set(&self, flag: StatusFlag) -> bool {
        (self.raw >> flag.offset()) & 1 != 0
    }

    /// Whether the channel's over-current flag is asserted.
    pub fn overcurrent(&self, channel: LaserChannel) -> bool {
        match channel {
            LaserChannel::One => self.word.laser1_ovc(),
            LaserChannel::Two => self.word.laser2_ovc(),
        }
    }

    /// Whether the channel reports itself as enabled.
    pub fn laser_on(&self, channel: LaserChannel) -> bool {
        match channel {
            LaserChannel::One => self.word.laser1_state(),
            LaserChannel::Two => self.word.laser2_state(),
        }
    }

    /// Any board level fault (supply, memory, temperature, oscillator, config timeout).
    pub fn board_fault(&self) -> bool {
        self.word.pd_ovdd()
            || self.word.mem_err()
            || self.word.ovt()
            || self.word.osc_err()
            || self.word.cfg_timo()
    }

    /// Every flag with its value, in bit order.
    pub fn flags(&self) -> impl Iterator<Item = (StatusFlag, bool)> + '_ {
        StatusFlag::iter().map(|flag| (flag, self.is_set(flag)))
    }

    /// Flags currently asserted.
    pub fn active(&self) -> impl Iterator<Item = StatusFlag> + '_ {
        self.flags().filter(|(_, set)| *set).map(|(flag, _)| flag)
    }

    /// Flag name to value, for reports.
    pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
        self.flags().map(|(flag, set)| (flag.name(), set)).collect()
    }
}

impl core::fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:04X} [", self.raw)?;
        for (i, flag) in self.active().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(flag.name())?;
        }
        f.write_str("]")
    }
}
