//! We use this mocking module in unit tests to emulate the serial side of the debug cable and the
//! power meter.

/// Emulates a serial port. Responses are preloaded, writes are captured.
pub struct MockSerial {
    /// Everything written to the port.
    write_buffer: heapless::Vec<u8, 1024>,
    /// Pre-configured response data to be read.
    read_buffer: heapless::Vec<u8, 1024>,
    read_position: usize,
    should_error_on_write: bool,
    should_error_on_read: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MockSerialError {
    /// Simulated timeout error
    #[error("Timeout")]
    Timeout,
    /// Simulated buffer overflow
    #[error("BufferOverflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("SimulatedError")]
    SimulatedError,
    /// Would block - no data available
    #[error("WouldBlock")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let available = &self.read_buffer[self.read_position..];
        let bytes_to_read = core::cmp::min(buf.len(), available.len());
        buf[..bytes_to_read].copy_from_slice(&available[..bytes_to_read]);
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Replace the data that will be returned by `read()`.
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Queue one response line, `\r\n` terminated, behind any already queued.
    pub fn push_response(&mut self, line: &str) -> Result<(), MockSerialError> {
        self.read_buffer
            .extend_from_slice(line.as_bytes())
            .and_then(|_| self.read_buffer.extend_from_slice(b"\r\n"))
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Written data split into command lines.
    pub fn written_lines(&self) -> Vec<&str> {
        core::str::from_utf8(&self.write_buffer)
            .unwrap_or_default()
            .split_terminator("\r\n")
            .collect()
    }

    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn captures_writes() {
        let mut mock = MockSerial::new();
        mock.write_all(b"wr src.hp.plr 0x00032\r\n").unwrap();
        mock.write_all(b"rd src.hp.plr\r\n").unwrap();
        assert_eq!(
            mock.written_lines(),
            vec!["wr src.hp.plr 0x00032", "rd src.hp.plr"]
        );

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn write_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 1100];
        assert!(matches!(
            mock.write(&large_data),
            Err(MockSerialError::BufferOverflow)
        ));
    }

    #[test]
    fn queued_responses_read_in_order() {
        let mut mock = MockSerial::new();
        mock.push_response("OK").unwrap();
        mock.push_response("50").unwrap();

        let mut buffer = [0u8; 16];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"OK\r\n50\r\n");
        assert!(matches!(
            mock.read(&mut buffer),
            Err(MockSerialError::WouldBlock)
        ));
    }

    #[test]
    fn set_read_data_clears_previous() {
        let mut mock = MockSerial::new();
        mock.push_response("first").unwrap();
        mock.set_read_data(b"second").unwrap();

        let mut buffer = [0u8; 10];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"second");
    }

    #[test]
    fn error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        assert!(mock.written_data().is_empty());

        mock.set_read_data(b"data").unwrap();
        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        assert!(mock.read(&mut buffer).is_err());
        mock.set_read_error(false);
        assert_eq!(mock.read(&mut buffer).unwrap(), 4);
    }

    #[test]
    fn error_kinds() {
        assert!(matches!(
            MockSerialError::Timeout.kind(),
            embedded_io::ErrorKind::TimedOut
        ));
        assert!(matches!(
            MockSerialError::WouldBlock.kind(),
            embedded_io::ErrorKind::Other
        ));
    }
}
