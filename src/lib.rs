//! This crate configures and validates the two channel high power laser driver board used in
//! manufacturing test.
//!
//! It talks to the board through the debug cable's register CLI (`wr`/`rd` over serial) and to an
//! optical power meter over SCPI, both on top of [`embedded_io`] so any serial implementation can
//! be plugged in. The two procedures it provides are:
//! * Board initialization: write the default register image, save it, have the operator power
//!   cycle the board and read every register back ([`verify`]).
//! * APC laser configuration: set the current limit from the laser's datasheet, bring the laser
//!   up in stages while watching for over-current, then step the PLR until the meter reads the
//!   nominal power plus margin ([`ramp`]).
//!
//! Only constant power (APC) lasers are supported.
//!
//! The debug cable serial port should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
mod line;
pub mod meter;
pub mod ramp;
pub mod register;
pub mod session;
pub mod status;
pub mod transport;
pub mod unit;
pub mod verify;

#[cfg(test)]
mod mock_board;
#[cfg(test)]
mod mock_serial;
