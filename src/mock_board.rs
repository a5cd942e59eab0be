//! A simulated driver board for unit tests, one level above [`crate::mock_serial`].
//!
//! Implements [`Transport`] directly so driver, guard, ramp and verification tests don't have to
//! script cable text. Clones share one board, which lets a test keep a handle while the driver
//! owns another. [`SimMeter`] reads optical power off the same board.

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

use strum::IntoEnumIterator;

use crate::{
    meter::PowerMeter,
    register::{ChannelRegister, HardwareRegister, LaserChannel, Register},
    session::{Operator, Settle},
    transport::{Readback, Transport},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBoardError {
    /// Write word was not `0x` + 5 hex digits.
    MalformedWord(String),
}

#[derive(Default)]
struct BoardState {
    registers: BTreeMap<HardwareRegister, u32>,
    writes: Vec<(HardwareRegister, String)>,
    reads: BTreeMap<HardwareRegister, usize>,
    failing_reads: BTreeMap<HardwareRegister, usize>,
    status_script: VecDeque<u32>,
}

#[derive(Clone, Default)]
pub struct MockBoard {
    state: Rc<RefCell<BoardState>>,
}

/// Width of one channel's field in a hardware register.
fn field_bits(hardware: HardwareRegister) -> u8 {
    Register::iter()
        .map(|register| register.entry())
        .find(|entry| entry.hardware == hardware)
        .map(|entry| entry.value_bits)
        .unwrap_or(8)
}

fn merge_field(current: u32, hardware: HardwareRegister, word: u32) -> u32 {
    if hardware.is_channel_scoped() {
        return word;
    }
    let bits = field_bits(hardware) as u32;
    let mask = (1u32 << bits) - 1;
    let channel = word >> bits;
    let shift = channel * bits;
    (current & !(mask << shift)) | ((word & mask) << shift)
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw hardware register word.
    pub fn poke(&self, hardware: HardwareRegister, raw: u32) {
        self.state.borrow_mut().registers.insert(hardware, raw);
    }

    pub fn peek(&self, hardware: HardwareRegister) -> u32 {
        self.state
            .borrow()
            .registers
            .get(&hardware)
            .copied()
            .unwrap_or(0)
    }

    /// Overwrite one logical register's field, as if the board lost or changed it.
    pub fn set_value(&self, register: Register, value: u32) {
        let entry = register.entry();
        let word = ((entry.channel as u32) << entry.value_bits) | (value & entry.max_value());
        let mut state = self.state.borrow_mut();
        let current = state.registers.get(&entry.hardware).copied().unwrap_or(0);
        state
            .registers
            .insert(entry.hardware, merge_field(current, entry.hardware, word));
    }

    /// Status words returned by successive status reads. Once used up, the poked value is read.
    pub fn script_status(&self, words: impl IntoIterator<Item = u32>) {
        self.state.borrow_mut().status_script.extend(words);
    }

    /// The next `count` reads of `hardware` answer with a read error.
    pub fn fail_reads(&self, hardware: HardwareRegister, count: usize) {
        self.state
            .borrow_mut()
            .failing_reads
            .insert(hardware, count);
    }

    pub fn writes(&self) -> Vec<(HardwareRegister, String)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }

    /// Writes to one hardware register, decoded to words.
    pub fn words_written(&self, hardware: HardwareRegister) -> Vec<u32> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(register, _)| *register == hardware)
            .filter_map(|(_, word)| u32::from_str_radix(&word[2..], 16).ok())
            .collect()
    }

    pub fn read_count(&self, hardware: HardwareRegister) -> usize {
        self.state
            .borrow()
            .reads
            .get(&hardware)
            .copied()
            .unwrap_or(0)
    }

    pub fn plr(&self, channel: LaserChannel) -> u8 {
        let raw = self.peek(HardwareRegister::Plr);
        ((raw >> (8 * channel.index() as u32)) & 0xFF) as u8
    }

    pub fn laser_on(&self, channel: LaserChannel) -> bool {
        let state = channel
            .register(ChannelRegister::State)
            .entry()
            .hardware;
        self.peek(state) & 0xFF != 0
    }

    /// A meter watching `channel`, reading `curve(plr)` dBm while the laser is on.
    pub fn meter(&self, channel: LaserChannel, curve: impl Fn(u8) -> f64 + 'static) -> SimMeter {
        SimMeter {
            board: self.clone(),
            channel,
            curve: Box::new(curve),
            dark_dbm: -60.0,
            readings: Rc::new(RefCell::new(Vec::new())),
            selected: None,
            wavelength: None,
        }
    }
}

impl Transport for MockBoard {
    type Error = MockBoardError;

    fn write_register(
        &mut self,
        register: HardwareRegister,
        word: &str,
    ) -> Result<(), Self::Error> {
        let value = word
            .strip_prefix("0x")
            .filter(|digits| digits.len() == 5)
            .and_then(|digits| u32::from_str_radix(digits, 16).ok())
            .ok_or_else(|| MockBoardError::MalformedWord(word.to_string()))?;

        let mut state = self.state.borrow_mut();
        state.writes.push((register, word.to_string()));
        if register != HardwareRegister::Save {
            let current = state.registers.get(&register).copied().unwrap_or(0);
            state
                .registers
                .insert(register, merge_field(current, register, value));
        }
        Ok(())
    }

    fn read_register(&mut self, register: HardwareRegister) -> Result<Readback, Self::Error> {
        let mut state = self.state.borrow_mut();
        *state.reads.entry(register).or_default() += 1;

        if let Some(remaining) = state.failing_reads.get_mut(&register) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(Readback::ReadError);
            }
        }

        if register == HardwareRegister::Stat {
            if let Some(word) = state.status_script.pop_front() {
                return Ok(Readback::Value(word));
            }
        }
        Ok(Readback::Value(
            state.registers.get(&register).copied().unwrap_or(0),
        ))
    }
}

/// Optical power meter simulated from the board's PLR.
pub struct SimMeter {
    board: MockBoard,
    channel: LaserChannel,
    curve: Box<dyn Fn(u8) -> f64>,
    dark_dbm: f64,
    readings: Rc<RefCell<Vec<f64>>>,
    pub selected: Option<u8>,
    pub wavelength: Option<f64>,
}

impl SimMeter {
    /// Every value returned by `read_power`, shared with clones of the handle.
    pub fn readings(&self) -> Rc<RefCell<Vec<f64>>> {
        self.readings.clone()
    }
}

impl PowerMeter for SimMeter {
    type Error = core::convert::Infallible;

    fn set_channel(&mut self, index: u8) -> Result<(), Self::Error> {
        self.selected = Some(index);
        Ok(())
    }

    fn set_wavelength(&mut self, nm: f64) -> Result<(), Self::Error> {
        self.wavelength = Some(nm);
        Ok(())
    }

    fn read_power(&mut self) -> Result<f64, Self::Error> {
        let power = if self.board.laser_on(self.channel) {
            (self.curve)(self.board.plr(self.channel))
        } else {
            self.dark_dbm
        };
        self.readings.borrow_mut().push(power);
        Ok(power)
    }
}

/// Settle delays are recorded, not waited for.
#[derive(Debug, Default)]
pub struct RecordingSettle {
    pub waits: Vec<u32>,
}

impl Settle for RecordingSettle {
    fn settle(&mut self, duration: fugit::MillisDurationU32) {
        self.waits.push(duration.to_millis());
    }
}

/// Answers prompts from a script and runs an action on each, e.g. to corrupt the board during a
/// power cycle. Unscripted prompts are declined.
#[derive(Default)]
pub struct ScriptedOperator {
    answers: VecDeque<bool>,
    on_prompt: Option<Box<dyn FnMut()>>,
    pub prompts: Vec<String>,
}

impl ScriptedOperator {
    pub fn answering(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn on_prompt(mut self, action: impl FnMut() + 'static) -> Self {
        self.on_prompt = Some(Box::new(action));
        self
    }
}

impl Operator for ScriptedOperator {
    fn confirm(&mut self, prompt: &str) -> bool {
        self.prompts.push(prompt.to_string());
        if let Some(action) = self.on_prompt.as_mut() {
            action();
        }
        self.answers.pop_front().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_register_fields_are_merged() {
        let mut board = MockBoard::new();
        board.write_register(HardwareRegister::Plr, "0x00032").unwrap();
        board.write_register(HardwareRegister::Plr, "0x00140").unwrap();
        assert_eq!(board.peek(HardwareRegister::Plr), 0x4032);
        assert_eq!(board.plr(LaserChannel::One), 0x32);
        assert_eq!(board.plr(LaserChannel::Two), 0x40);

        board.set_value(Register::Laser1Plr, 7);
        assert_eq!(board.peek(HardwareRegister::Plr), 0x4007);
    }

    #[test]
    fn malformed_words_are_refused() {
        let mut board = MockBoard::new();
        assert!(board.write_register(HardwareRegister::Plr, "32").is_err());
        assert!(board.writes().is_empty());
    }

    #[test]
    fn meter_follows_plr_and_state() {
        let mut board = MockBoard::new();
        let mut meter = board.meter(LaserChannel::One, |plr| plr as f64 / 10.0);
        assert_eq!(meter.read_power().unwrap(), -60.0);

        board.write_register(HardwareRegister::State0, "0x00001").unwrap();
        board.write_register(HardwareRegister::Plr, "0x00064").unwrap();
        assert_eq!(meter.read_power().unwrap(), 10.0);
        assert_eq!(*meter.readings().borrow(), vec![-60.0, 10.0]);
    }
}
