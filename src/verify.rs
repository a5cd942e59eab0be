//! Board initialization and read-back verification.

use log::{error, info, warn};

use crate::{
    config::LaserDriverConfig,
    driver::{LaserDriver, UNREADABLE},
    error::{Error, Result},
    register::Register,
    session::Operator,
    transport::Transport,
};

pub const POWER_CYCLE_PROMPT: &str =
    "Defaults written and saved. Power cycle the driver board, then confirm to verify";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterCheck {
    pub register: Register,
    pub expected: u32,
    /// `None` if the register could not be read back.
    pub actual: Option<u32>,
}

impl RegisterCheck {
    pub fn passed(&self) -> bool {
        self.actual == Some(self.expected)
    }
}

impl core::fmt::Display for RegisterCheck {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let actual = self.actual.map_or(UNREADABLE, i64::from);
        write!(
            f,
            "{}! {} expected {} read {}",
            if self.passed() { "PASS" } else { "FAIL" },
            self.register,
            self.expected,
            actual
        )
    }
}

/// Per-register results of a verification run, in the order they were checked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationReport {
    pub checks: Vec<RegisterCheck>,
}

impl VerificationReport {
    /// `true` if every register read back exactly as expected.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(RegisterCheck::passed)
    }

    /// Checks that did not read back as expected.
    pub fn failures(&self) -> impl Iterator<Item = &RegisterCheck> + '_ {
        self.checks.iter().filter(|check| !check.passed())
    }

    /// The check for one register, if it was part of the run.
    pub fn check(&self, register: Register) -> Option<&RegisterCheck> {
        self.checks.iter().find(|check| check.register == register)
    }
}

/// Read back every expected register and compare for exact equality.
///
/// A register that stays unreadable after the driver's retries is a FAIL, not an error. Any
/// other transport failure aborts the run.
pub fn verify_board_values<T: Transport>(
    driver: &mut LaserDriver<T>,
    expected: &[(Register, u32)],
) -> Result<VerificationReport, T::Error> {
    let mut report = VerificationReport::default();
    for &(register, value) in expected {
        let actual = match driver.read_register(register) {
            Ok(actual) => Some(actual),
            Err(Error::TransportReadError { .. }) => None,
            Err(err) => return Err(err),
        };
        let check = RegisterCheck {
            register,
            expected: value,
            actual,
        };
        if check.passed() {
            info!("{check}");
        } else {
            warn!("{check}");
        }
        report.checks.push(check);
    }

    let failed = report.failures().count();
    if failed == 0 {
        info!("All {} registers verified", report.checks.len());
    } else {
        error!(
            "{failed} of {} registers failed verification",
            report.checks.len()
        );
    }
    Ok(report)
}

/// Write the default image, have the operator power cycle the board, then verify it.
pub fn initialize_board<T: Transport, O: Operator + ?Sized>(
    driver: &mut LaserDriver<T>,
    image: &LaserDriverConfig,
    operator: &mut O,
) -> Result<VerificationReport, T::Error> {
    info!("Resetting driver board to defaults");
    let written = driver.reset_to_default(image)?;
    if !operator.confirm(POWER_CYCLE_PROMPT) {
        warn!("Power cycle not confirmed, skipping verification");
        return Err(Error::OperatorDeclined("power cycle"));
    }
    verify_board_values(driver, &written)
}
