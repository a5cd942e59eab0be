//! Packing of register values into debug cable command words, and unpacking of read-backs.
//!
//! A single hardware register usually carries both channels' fields next to each other. The
//! command word written to it is `(channel << value_bits) | value`, rendered as `0x` followed by
//! five upper case hex digits.

use core::fmt::Write;

use crate::{
    error::RegisterError,
    register::{HardwareRegister, Register},
};

/// Width of the hex string written to the debug cable, `0x` + 5 digits.
pub const HEX_WORD_LEN: usize = 7;

/// A command ready to be handed to a [`crate::transport::Transport`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodedCommand {
    pub register: Register,
    pub hardware: HardwareRegister,
    pub word: u32,
}

impl EncodedCommand {
    /// The packed word in transport format, e.g. `0x00132`.
    pub fn hex(&self) -> heapless::String<HEX_WORD_LEN> {
        let mut out = heapless::String::new();
        // Channel is at most 1 and fields at most 16 bits wide, so 5 digits always fit.
        let _ = write!(out, "0x{:05X}", self.word);
        out
    }
}

/// Validate `value` against the register's field width and pack it.
pub fn encode(register: Register, value: i64) -> Result<EncodedCommand, RegisterError> {
    let entry = register.entry();
    if value < 0 || value > entry.max_value() as i64 {
        return Err(RegisterError::OutOfRange {
            register,
            value,
            bits: entry.value_bits,
        });
    }
    let word = ((entry.channel as u32) << entry.value_bits) | value as u32;
    Ok(EncodedCommand {
        register,
        hardware: entry.hardware,
        word,
    })
}

/// Same as [`encode`], looking the register up by symbolic name.
pub fn encode_named(name: &str, value: i64) -> Result<EncodedCommand, RegisterError> {
    encode(Register::from_name(name)?, value)
}

/// Extract the register's own channel field from a raw hardware read-back.
pub fn decode(register: Register, raw: u32) -> u32 {
    let entry = register.entry();
    let mask = entry.max_value();
    // Scoped registers read back only their own value, never shifted. The mask drops the channel
    // prefix that was part of the written word.
    if entry.hardware.is_channel_scoped() || entry.channel == 0 {
        raw & mask
    } else {
        (raw >> entry.value_bits) & mask
    }
}
