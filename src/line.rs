//! CR/LF framed request/response over any [`embedded_io`] serial interface.
//!
//! Both the debug cable and the optical power meter speak a plain text protocol: we write one
//! command line and read one response line back.

use embedded_io::Error;

use crate::error::CableError;

/// Wraps a serial interface. `L` is the capacity of the receive buffer.
pub struct LineLink<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    interface: S,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> LineLink<S, L> {
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    /// Give the serial interface back.
    pub fn release(self) -> S {
        self.interface
    }

    #[cfg(test)]
    pub(crate) fn interface(&self) -> &S {
        &self.interface
    }

    #[cfg(test)]
    pub(crate) fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    /// Write a command, terminated with `\r\n`.
    pub fn send(&mut self, command: &str) -> Result<(), CableError<S::Error>> {
        self.interface
            .write_all(command.as_bytes())
            .map_err(CableError::Serial)?;
        self.interface
            .write_all(b"\r\n")
            .map_err(CableError::Serial)?;
        self.interface.flush().map_err(CableError::Serial)
    }

    /// Write a command and return the trimmed response line.
    pub fn query(&mut self, command: &str) -> Result<heapless::String<L>, CableError<S::Error>> {
        self.send(command)?;
        self.read_line()
    }

    /// Read until `\n`. A timeout after some data has arrived also ends the line.
    pub fn read_line(&mut self) -> Result<heapless::String<L>, CableError<S::Error>> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        // One byte at a time so nothing past the newline is consumed.
        let mut temp_buf = [0u8; 1];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => break,
                Ok(_) => {
                    if temp_buf[0] == b'\n' {
                        break;
                    }
                    buff.push(temp_buf[0])
                        .map_err(|_| CableError::BufferFull)?;
                }
                Err(e) => {
                    if matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    ) && !buff.is_empty()
                    {
                        break;
                    }
                    return Err(CableError::Serial(e));
                }
            }
        }

        let text = core::str::from_utf8(&buff).map_err(|_| CableError::InvalidResponse)?;
        let mut line = heapless::String::new();
        line.push_str(text.trim())
            .map_err(|_| CableError::BufferFull)?;
        Ok(line)
    }
}
