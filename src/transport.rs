//! The debug cable link to the driver board.
//!
//! The register API only needs [`Transport`]. [`DebugCable`] implements it over any
//! [`embedded_io`] serial interface using the cable's text protocol:
//!
//! * `wr <register> <hex word>` is answered with `OK`.
//! * `rd <register>` is answered with the decimal register value, or `Error reading register`.

use core::fmt::Write;

use log::trace;

use crate::{error::CableError, line::LineLink, register::HardwareRegister};

/// What the cable answers when it could not read a register.
pub const READ_ERROR_RESPONSE: &str = "Error reading register";

/// Result of a register read at the transport level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Readback {
    Value(u32),
    /// The cable reported a read failure. Worth retrying.
    ReadError,
}

/// Register-level access to the driver board.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Write a packed hex word (see [`crate::codec::EncodedCommand::hex`]) to a hardware register.
    fn write_register(&mut self, register: HardwareRegister, word: &str)
    -> Result<(), Self::Error>;

    fn read_register(&mut self, register: HardwareRegister) -> Result<Readback, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn write_register(
        &mut self,
        register: HardwareRegister,
        word: &str,
    ) -> Result<(), Self::Error> {
        (**self).write_register(register, word)
    }

    fn read_register(&mut self, register: HardwareRegister) -> Result<Readback, Self::Error> {
        (**self).read_register(register)
    }
}

/// Debug cable speaking the CLI text protocol over a serial interface.
pub struct DebugCable<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    link: LineLink<S, L>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> DebugCable<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            link: LineLink::new(interface),
        }
    }

    pub fn release(self) -> S {
        self.link.release()
    }

    #[cfg(test)]
    pub(crate) fn link(&self) -> &LineLink<S, L> {
        &self.link
    }
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> Transport for DebugCable<S, L> {
    type Error = CableError<S::Error>;

    fn write_register(
        &mut self,
        register: HardwareRegister,
        word: &str,
    ) -> Result<(), Self::Error> {
        let mut command: heapless::String<48> = heapless::String::new();
        write!(command, "wr {} {}", register, word).map_err(|_| CableError::BufferFull)?;
        let response = self.link.query(&command)?;
        trace!("{command} -> {response}");
        if response.as_str() == "OK" {
            Ok(())
        } else {
            Err(CableError::Rejected)
        }
    }

    fn read_register(&mut self, register: HardwareRegister) -> Result<Readback, Self::Error> {
        let mut command: heapless::String<32> = heapless::String::new();
        write!(command, "rd {}", register).map_err(|_| CableError::BufferFull)?;
        let response = self.link.query(&command)?;
        trace!("{command} -> {response}");
        if response.as_str() == READ_ERROR_RESPONSE {
            return Ok(Readback::ReadError);
        }
        response
            .parse::<u32>()
            .map(Readback::Value)
            .map_err(|_| CableError::InvalidResponse)
    }
}
