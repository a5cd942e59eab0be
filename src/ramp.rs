//! APC power ramp.
//!
//! Brings one channel of an automatic power control laser up to its nominal optical power:
//!
//! ```text
//! IDLE -> CURRENT_LIMIT_SET -> STAGED_POWER_ON -> PLR_RAMPING -> NOMINAL_REACHED
//!                                     |                |      -> LIMIT_EXCEEDED
//!                                     +----------------+---------> FAULT_ABORT
//! ```
//!
//! The current limit only takes effect once saved and the board power cycled. The operator is asked
//! to do that while the carrier board is connected, and the limit is read back before the laser
//! may turn on. Every write that changes the laser's output is followed by a settle delay before
//! the next status or meter read. A persistent over-current forces the laser off. Running out of PLR
//! range does not, the laser is left as last commanded and the operator has to step in.

use fugit::MillisDurationU32;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::{
    driver::{CurrentLimit, LaserDriver},
    error::{Error, Result},
    guard::{DEFAULT_OVERCURRENT_RETRIES, OvercurrentGuard},
    meter::PowerMeter,
    register::{ChannelRegister, LaserChannel, State},
    session::{Operator, Settle},
    transport::Transport,
    verify::verify_board_values,
};

pub const CARRIER_POWER_CYCLE_PROMPT: &str = "Current limit saved. Power off the board, connect the \
     laser carrier board, power on and check the TEC LED is green, then confirm";

/// Tunables of the ramp, stored in the `apc` section of the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApcSettings {
    /// Added to the nominal power to get the ramp target, dB.
    pub power_margin_db: f64,
    /// Highest PLR the ramp may write.
    pub max_plr: u8,
    /// Power setpoints used to bring the laser up, in order.
    pub power_level_steps: Vec<u8>,
    pub power_on_settle_ms: u32,
    pub plr_settle_ms: u32,
    pub overcurrent_retries: u8,
    /// The meter must read at or below this with the laser at its first power step, dBm.
    pub dark_threshold_dbm: f64,
}

impl ApcSettings {
    pub fn validate(&self) -> core::result::Result<(), &'static str> {
        if self.power_level_steps.is_empty() {
            return Err("at least one power level step is required");
        }
        Ok(())
    }
}

impl Default for ApcSettings {
    fn default() -> Self {
        Self {
            power_margin_db: 0.5,
            max_plr: 255,
            power_level_steps: vec![1, 100, 255],
            power_on_settle_ms: 1000,
            plr_settle_ms: 1000,
            overcurrent_retries: DEFAULT_OVERCURRENT_RETRIES,
            dark_threshold_dbm: 0.0,
        }
    }
}

/// Everything one ramp needs to know about the laser it is tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ApcRampContext {
    pub channel: LaserChannel,
    /// Datasheet maximum drive current, mA. Sets the current limit register.
    pub max_current_ma: f64,
    /// Nominal optical output power, dBm.
    pub nominal_power_dbm: f64,
    pub settings: ApcSettings,
}

impl ApcRampContext {
    pub fn new(
        channel: LaserChannel,
        max_current_ma: f64,
        nominal_power_dbm: f64,
        settings: ApcSettings,
    ) -> Self {
        Self {
            channel,
            max_current_ma,
            nominal_power_dbm,
            settings,
        }
    }

    /// Power the ramp stops at, dBm.
    pub fn target_power_dbm(&self) -> f64 {
        self.nominal_power_dbm + self.settings.power_margin_db
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RampState {
    Idle,
    CurrentLimitSet,
    StagedPowerOn,
    PlrRamping,
    NominalReached,
    FaultAbort,
    LimitExceeded,
}

impl core::fmt::Display for RampState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.into())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FaultReason {
    /// The channel's over-current flag stayed set.
    OverCurrent,
    /// The status register could not be read during an over-current check.
    StatusUnreadable,
    /// `ILIM` or `IRANGE` read back different from what was written, or not at all.
    CurrentLimitUnverified,
    /// Light on the meter with the laser at its lowest power step.
    OutputNotDark { measured_dbm: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RampOutcome {
    NominalReached { plr: u8, power_dbm: f64 },
    LimitExceeded { plr: u8, power_dbm: f64 },
    FaultAbort { reason: FaultReason, state: RampState },
}

impl RampOutcome {
    pub fn state(&self) -> RampState {
        match self {
            Self::NominalReached { .. } => RampState::NominalReached,
            Self::LimitExceeded { .. } => RampState::LimitExceeded,
            Self::FaultAbort { .. } => RampState::FaultAbort,
        }
    }
}

/// One step of the ramp, in the order they were taken.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RampStep {
    PowerOn { power: u8 },
    Plr { plr: u8, power_dbm: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RampReport {
    pub channel: LaserChannel,
    pub target_power_dbm: f64,
    pub current_limit: Option<CurrentLimit>,
    /// Every state entered, starting with `IDLE`.
    pub transitions: Vec<RampState>,
    pub steps: Vec<RampStep>,
    pub outcome: RampOutcome,
}

impl RampReport {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, RampOutcome::NominalReached { .. })
    }

    /// Number of PLR increments written.
    pub fn plr_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, RampStep::Plr { .. }))
            .count()
    }

    /// `Ok` only if nominal power was reached.
    pub fn into_result<E: core::fmt::Debug>(self) -> Result<Self, E> {
        match self.outcome {
            RampOutcome::NominalReached { .. } => Ok(self),
            RampOutcome::LimitExceeded { plr, .. } => Err(Error::PlrLimitExceeded {
                channel: self.channel,
                plr,
            }),
            RampOutcome::FaultAbort {
                reason: FaultReason::OutputNotDark { measured_dbm },
                ..
            } => Err(Error::OutputNotDark {
                channel: self.channel,
                measured_dbm,
            }),
            RampOutcome::FaultAbort {
                reason: FaultReason::CurrentLimitUnverified,
                ..
            } => Err(Error::CurrentLimitUnverified {
                channel: self.channel,
            }),
            RampOutcome::FaultAbort { .. } => Err(Error::OverCurrentFault {
                channel: self.channel,
            }),
        }
    }
}

impl core::fmt::Display for RampReport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Laser {} ", self.channel)?;
        match self.outcome {
            RampOutcome::NominalReached { plr, power_dbm } => write!(
                f,
                "PASS: {power_dbm:.2} dBm at PLR {plr} (target {:.2} dBm)",
                self.target_power_dbm
            ),
            RampOutcome::LimitExceeded { plr, power_dbm } => write!(
                f,
                "FAIL: PLR limit {plr} reached at {power_dbm:.2} dBm (target {:.2} dBm)",
                self.target_power_dbm
            ),
            RampOutcome::FaultAbort { reason, state } => {
                write!(f, "FAIL: aborted during {state}: ")?;
                match reason {
                    FaultReason::OverCurrent => f.write_str("over-current"),
                    FaultReason::StatusUnreadable => f.write_str("status register unreadable"),
                    FaultReason::CurrentLimitUnverified => {
                        f.write_str("current limit not verified after power cycle")
                    }
                    FaultReason::OutputNotDark { measured_dbm } => {
                        write!(f, "output not dark ({measured_dbm:.2} dBm)")
                    }
                }
            }
        }
    }
}

/// The ramp controller. Owns its context for the length of one run.
pub struct ApcRamp {
    context: ApcRampContext,
    guard: OvercurrentGuard,
    state: RampState,
    transitions: Vec<RampState>,
    steps: Vec<RampStep>,
    current_limit: Option<CurrentLimit>,
}

impl ApcRamp {
    pub fn new(context: ApcRampContext) -> Self {
        let guard = OvercurrentGuard::new(context.settings.overcurrent_retries);
        Self {
            context,
            guard,
            state: RampState::Idle,
            transitions: vec![RampState::Idle],
            steps: Vec::new(),
            current_limit: None,
        }
    }

    /// Run the ramp to a terminal state.
    ///
    /// Faults and the PLR limit are outcomes in the report, not errors. An error means the
    /// board or meter stopped answering, in which case the laser is switched off on a best
    /// effort basis before the error is returned. Invalid settings are refused before anything
    /// is written.
    pub fn run<T, M, Z, O>(
        mut self,
        driver: &mut LaserDriver<T>,
        meter: &mut M,
        settle: &mut Z,
        operator: &mut O,
    ) -> Result<RampReport, T::Error>
    where
        T: Transport,
        M: PowerMeter,
        Z: Settle,
        O: Operator + ?Sized,
    {
        self.context
            .settings
            .validate()
            .map_err(Error::InvalidSettings)?;
        let channel = self.context.channel;
        info!(
            "Laser {channel}: APC ramp to {:.2} dBm, max current {:.2} mA, {} status reads per over-current check",
            self.context.target_power_dbm(),
            self.context.max_current_ma,
            self.guard.retry_count()
        );
        match self.sequence(driver, meter, settle, operator) {
            Ok(outcome) => {
                let report = RampReport {
                    channel,
                    target_power_dbm: self.context.target_power_dbm(),
                    current_limit: self.current_limit,
                    transitions: self.transitions,
                    steps: self.steps,
                    outcome,
                };
                info!("{report}");
                Ok(report)
            }
            Err(err) => {
                error!("Laser {channel}: ramp failed in {}: {err}", self.state);
                if let Err(off) = driver.set_laser_state(channel, State::Off) {
                    error!("Laser {channel}: could not switch off after failure: {off}");
                }
                Err(err)
            }
        }
    }

    fn enter(&mut self, state: RampState) {
        debug!(
            "Laser {}: {} -> {}",
            self.context.channel, self.state, state
        );
        self.state = state;
        self.transitions.push(state);
    }

    fn sequence<T, M, Z, O>(
        &mut self,
        driver: &mut LaserDriver<T>,
        meter: &mut M,
        settle: &mut Z,
        operator: &mut O,
    ) -> Result<RampOutcome, T::Error>
    where
        T: Transport,
        M: PowerMeter,
        Z: Settle,
        O: Operator + ?Sized,
    {
        let channel = self.context.channel;
        let settings = self.context.settings.clone();
        let power_on_settle = MillisDurationU32::millis(settings.power_on_settle_ms);
        let plr_settle = MillisDurationU32::millis(settings.plr_settle_ms);

        let limit = driver.set_current_limit(channel, self.context.max_current_ma)?;
        self.current_limit = Some(limit);
        self.enter(RampState::CurrentLimitSet);

        if !operator.confirm(CARRIER_POWER_CYCLE_PROMPT) {
            warn!("Laser {channel}: power cycle not confirmed");
            return Err(Error::OperatorDeclined("power cycle"));
        }
        let expected = [
            (channel.register(ChannelRegister::ILim), limit.ilimit),
            (channel.register(ChannelRegister::IRange), limit.range as u32),
        ];
        if !verify_board_values(driver, &expected)?.passed() {
            error!("Laser {channel}: unsafe to turn the laser on");
            return self.abort(driver, FaultReason::CurrentLimitUnverified, false);
        }

        self.enter(RampState::StagedPowerOn);
        for (index, &power) in settings.power_level_steps.iter().enumerate() {
            driver.set_laser_power(channel, power)?;
            driver.set_laser_state(channel, State::On)?;
            settle.settle(power_on_settle);
            self.steps.push(RampStep::PowerOn { power });

            if let Some(reason) = self.overcurrent(driver)? {
                return self.abort(driver, reason, false);
            }
            if index == 0 {
                let measured_dbm = measure::<T::Error, _>(meter)?;
                if measured_dbm > settings.dark_threshold_dbm {
                    warn!(
                        "Laser {channel}: {measured_dbm:.2} dBm at power {power}, expected at most {:.2} dBm",
                        settings.dark_threshold_dbm
                    );
                    return self.abort(driver, FaultReason::OutputNotDark { measured_dbm }, true);
                }
            }
        }

        self.enter(RampState::PlrRamping);
        let target = self.context.target_power_dbm();
        let mut power_dbm = measure::<T::Error, _>(meter)?;
        let mut plr = driver.read_register(channel.register(ChannelRegister::Plr))? as u8;
        info!("Laser {channel}: starting at PLR {plr}, {power_dbm:.2} dBm");

        while power_dbm < target {
            if plr >= settings.max_plr {
                self.enter(RampState::LimitExceeded);
                warn!(
                    "Laser {channel}: PLR limit {} reached at {power_dbm:.2} dBm, target {target:.2} dBm",
                    settings.max_plr
                );
                return Ok(RampOutcome::LimitExceeded { plr, power_dbm });
            }
            plr += 1;
            driver.set_plr(channel, plr)?;
            driver.set_laser_state(channel, State::On)?;
            settle.settle(plr_settle);

            if let Some(reason) = self.overcurrent(driver)? {
                return self.abort(driver, reason, false);
            }
            driver.save_values(channel)?;
            power_dbm = measure::<T::Error, _>(meter)?;
            debug!("Laser {channel}: PLR {plr} -> {power_dbm:.2} dBm");
            self.steps.push(RampStep::Plr { plr, power_dbm });
        }

        self.enter(RampState::NominalReached);
        info!("Laser {channel}: {power_dbm:.2} dBm at PLR {plr}");
        driver.set_laser_state(channel, State::Off)?;
        driver.save_values(channel)?;
        Ok(RampOutcome::NominalReached { plr, power_dbm })
    }

    /// `Some` if the ramp has to stop for this channel's over-current state.
    fn overcurrent<T: Transport>(
        &self,
        driver: &mut LaserDriver<T>,
    ) -> Result<Option<FaultReason>, T::Error> {
        match self.guard.check_overcurrent(driver, self.context.channel) {
            Ok(true) => Ok(Some(FaultReason::OverCurrent)),
            Ok(false) => Ok(None),
            Err(Error::TransportReadError { .. }) => Ok(Some(FaultReason::StatusUnreadable)),
            Err(err) => Err(err),
        }
    }

    fn abort<T: Transport>(
        &mut self,
        driver: &mut LaserDriver<T>,
        reason: FaultReason,
        save: bool,
    ) -> Result<RampOutcome, T::Error> {
        let channel = self.context.channel;
        let state = self.state;
        error!("Laser {channel}: {reason:?} during {state}, forcing laser off");
        driver.set_laser_state(channel, State::Off)?;
        if save {
            driver.save_values(channel)?;
        }
        self.enter(RampState::FaultAbort);
        Ok(RampOutcome::FaultAbort { reason, state })
    }
}

fn measure<E: core::fmt::Debug, M: PowerMeter>(meter: &mut M) -> Result<f64, E> {
    meter.read_power().map_err(|err| {
        error!("Power meter read failed: {err:?}");
        Error::PowerMeter(format!("{err:?}"))
    })
}
