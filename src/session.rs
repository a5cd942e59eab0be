//! One operator session at the test station.
//!
//! Instruments are resolved once when the session opens and handed back when it closes. The
//! driver, guard and ramp never look instruments up themselves, they are passed in.

use fugit::MillisDurationU32;
use log::{info, warn};

use crate::{
    config::LaserDriverConfig,
    driver::LaserDriver,
    error::{Error, Result},
    meter::PowerMeter,
    ramp::{ApcRamp, ApcRampContext, ApcSettings, RampReport},
    transport::Transport,
    unit::{LaserType, LaserUnitInfo},
    verify::{self, VerificationReport},
};

/// Blocking prompts for physical actions at the station.
pub trait Operator {
    /// Ask the operator to do something and confirm. `false` means they declined.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<O: Operator + ?Sized> Operator for &mut O {
    fn confirm(&mut self, prompt: &str) -> bool {
        (**self).confirm(prompt)
    }
}

/// Wait for the board and laser to settle after a change.
pub trait Settle {
    fn settle(&mut self, duration: MillisDurationU32);
}

impl<Z: Settle + ?Sized> Settle for &mut Z {
    fn settle(&mut self, duration: MillisDurationU32) {
        (**self).settle(duration)
    }
}

/// Settles by sleeping the current thread.
#[derive(Debug, Copy, Clone, Default)]
pub struct ThreadSleep;

impl Settle for ThreadSleep {
    fn settle(&mut self, duration: MillisDurationU32) {
        std::thread::sleep(std::time::Duration::from_millis(duration.to_millis() as u64));
    }
}

/// Connects the station's instruments. Called once per session.
pub trait InstrumentResolver {
    type Cable: Transport;
    type Meter: PowerMeter;

    /// `None` if no debug cable could be connected.
    fn debug_cable(&mut self) -> Option<Self::Cable>;

    /// `None` if no power meter could be connected.
    fn power_meter(&mut self) -> Option<Self::Meter>;
}

pub struct Session<T: Transport, M: PowerMeter, Z: Settle = ThreadSleep> {
    driver: LaserDriver<T>,
    meter: Option<M>,
    settle: Z,
}

impl<T: Transport, M: PowerMeter, Z: Settle> Session<T, M, Z> {
    /// Resolve the instruments and start a session. Missing instruments are reported when an
    /// operation needs them.
    pub fn open<R>(resolver: &mut R, settle: Z) -> Self
    where
        R: InstrumentResolver<Cable = T, Meter = M>,
    {
        let cable = resolver.debug_cable();
        if cable.is_none() {
            warn!("No debug cable connected");
        }
        let meter = resolver.power_meter();
        if meter.is_none() {
            warn!("No power meter connected");
        }
        Self::with_instruments(cable, meter, settle)
    }

    pub fn with_instruments(cable: Option<T>, meter: Option<M>, settle: Z) -> Self {
        let driver = match cable {
            Some(cable) => LaserDriver::new(cable),
            None => LaserDriver::unbound(),
        };
        Self {
            driver,
            meter,
            settle,
        }
    }

    /// `false` if no power meter was resolved when the session opened.
    pub fn has_power_meter(&self) -> bool {
        self.meter.is_some()
    }

    /// End the session, handing the instruments back.
    pub fn close(mut self) -> (Option<T>, Option<M>) {
        info!("Closing session");
        (self.driver.release(), self.meter.take())
    }

    /// Write the default image, wait for a power cycle and verify the board.
    pub fn initialize_board<O: Operator + ?Sized>(
        &mut self,
        image: &LaserDriverConfig,
        operator: &mut O,
    ) -> Result<VerificationReport, T::Error> {
        verify::initialize_board(&mut self.driver, image, operator)
    }

    /// Tune an APC laser to its nominal power plus margin.
    ///
    /// The operator confirms the meter connection first, then the power cycle after the current
    /// limit is saved.
    pub fn configure_laser_apc<O: Operator + ?Sized>(
        &mut self,
        unit: &LaserUnitInfo,
        settings: &ApcSettings,
        operator: &mut O,
    ) -> Result<RampReport, T::Error> {
        if unit.laser_type == LaserType::Acc {
            return Err(Error::UnsupportedLaserType);
        }
        unit.validate().map_err(Error::InvalidUnitInfo)?;
        if !self.driver.is_bound() {
            return Err(Error::NoTransport);
        }
        let meter = self.meter.as_mut().ok_or(Error::NoPowerMeter)?;

        let prompt = format!(
            "Connect laser {} output to power meter channel {}",
            unit.channel, unit.meter_channel
        );
        if !operator.confirm(&prompt) {
            return Err(Error::OperatorDeclined("power meter connection"));
        }
        meter
            .set_channel(unit.meter_channel - 1)
            .and_then(|_| meter.set_wavelength(unit.wavelength_nm))
            .map_err(|err| Error::PowerMeter(format!("{err:?}")))?;
        info!(
            "Power meter channel {} at {:.2} nm",
            unit.meter_channel, unit.wavelength_nm
        );

        let context = ApcRampContext::new(
            unit.channel,
            unit.max_current_ma,
            unit.power_dbm(),
            settings.clone(),
        );
        ApcRamp::new(context).run(&mut self.driver, meter, &mut self.settle, operator)
    }
}
