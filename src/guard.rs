//! Debounced over-current check.
//!
//! The over-current flags often blip while a laser is being enabled and clear on the next read.
//! Only a fault that is present on every read of the window counts.

use log::{debug, warn};

use crate::{
    driver::LaserDriver,
    error::Result,
    register::LaserChannel,
    transport::Transport,
};

/// Status reads per check unless configured otherwise.
pub const DEFAULT_OVERCURRENT_RETRIES: u8 = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OvercurrentGuard {
    retry_count: u8,
}

impl Default for OvercurrentGuard {
    fn default() -> Self {
        Self::new(DEFAULT_OVERCURRENT_RETRIES)
    }
}

impl OvercurrentGuard {
    /// A guard reading the status register at most `retry_count` times per check (at least once).
    pub fn new(retry_count: u8) -> Self {
        Self {
            retry_count: retry_count.max(1),
        }
    }

    /// Status reads per check.
    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// `true` when the channel's over-current flag is set on every read.
    ///
    /// Each read is a fresh status read. A status register that can't be read at all is an
    /// error, the caller decides whether that counts as a fault.
    pub fn check_overcurrent<T: Transport>(
        &self,
        driver: &mut LaserDriver<T>,
        channel: LaserChannel,
    ) -> Result<bool, T::Error> {
        for attempt in 1..=self.retry_count {
            let status = driver.get_board_status()?;
            if !status.overcurrent(channel) {
                if attempt > 1 {
                    debug!("Laser {channel} over-current cleared on read {attempt}");
                }
                return Ok(false);
            }
            debug!(
                "Laser {channel} over-current on read {attempt}/{} ({status})",
                self.retry_count
            );
        }
        warn!(
            "Laser {channel} over-current persisted over {} reads",
            self.retry_count
        );
        Ok(true)
    }
}

/// One-off check with an explicit retry count.
pub fn check_overcurrent<T: Transport>(
    driver: &mut LaserDriver<T>,
    channel: LaserChannel,
    retry_count: u8,
) -> Result<bool, T::Error> {
    OvercurrentGuard::new(retry_count).check_overcurrent(driver, channel)
}
