//! Operator tool for the laser driver test station.
//!
//! Usage: `hp_laser_config [config file]`. The default register image is read from the config
//! file (`Default_Config.json` unless given), which is created with built-in defaults if missing.

use std::env;

use hp_laser_config::{
    config::{DEFAULT_CONFIG_FILE, StationConfig},
    meter::ScpiPowerMeter,
    ramp::RampState,
    register::LaserChannel,
    session::{InstrumentResolver, Operator, Session, ThreadSleep},
    transport::DebugCable,
    unit::{LaserType, LaserUnitInfo},
};
use inquire::{Confirm, CustomType, Select, Text};
use log::{error, info};
use serialport::SerialPort;

const CABLE_BAUD_RATE: u32 = 115200;
const METER_BAUD_RATE: u32 = 115200;
// The cable answers register reads slowly, a generous time out is required.
const SERIAL_TIMEOUT_MS: u64 = 500;
const LINE_LEN: usize = 64;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

type Cable = DebugCable<PortWrapper, LINE_LEN>;
type Meter = ScpiPowerMeter<PortWrapper, LINE_LEN>;

/// Asks the operator which serial port each instrument is on.
struct PortSelect;

const SKIP: &str = "(not connected)";

impl PortSelect {
    fn open(&self, instrument: &str, baud_rate: u32) -> Option<PortWrapper> {
        let mut names: Vec<String> = match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(err) => {
                error!("Failed to enumerate serial ports: {err}");
                Vec::new()
            }
        };
        names.push(SKIP.to_string());

        let name = Select::new(&format!("Select the {instrument} port:"), names)
            .prompt()
            .ok()?;
        if name == SKIP {
            return None;
        }
        match serialport::new(&name, baud_rate)
            .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
        {
            Ok(port) => {
                info!("{instrument} on {name}");
                Some(PortWrapper(port))
            }
            Err(err) => {
                error!("Failed to open {name}: {err}");
                None
            }
        }
    }
}

impl InstrumentResolver for PortSelect {
    type Cable = Cable;
    type Meter = Meter;

    fn debug_cable(&mut self) -> Option<Cable> {
        self.open("debug cable", CABLE_BAUD_RATE).map(DebugCable::new)
    }

    fn power_meter(&mut self) -> Option<Meter> {
        let port = self.open("power meter", METER_BAUD_RATE)?;
        match ScpiPowerMeter::open(port) {
            Ok(meter) => Some(meter),
            Err(err) => {
                error!("Power meter did not accept setup: {err}");
                None
            }
        }
    }
}

struct Console;

impl Operator for Console {
    fn confirm(&mut self, prompt: &str) -> bool {
        Confirm::new(prompt)
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    }
}

fn prompt_number(message: &str, default: f64) -> Option<f64> {
    CustomType::<f64>::new(message)
        .with_default(default)
        .with_error_message("Please enter a number")
        .prompt()
        .ok()
}

fn prompt_unit_info() -> Option<LaserUnitInfo> {
    let defaults = LaserUnitInfo::default();
    let laser_sn = Text::new("Laser serial number (from the datasheet):")
        .prompt()
        .ok()?;
    let unit_sn = Text::new("Unit serial number:").prompt().ok()?;
    let wavelength_nm = prompt_number("Laser wavelength (nm):", defaults.wavelength_nm)?;
    let operating_current_ma = prompt_number("Nominal operating current (mA):", 1.0)?;
    let max_current_ma = prompt_number("Maximum current (mA):", 1.0)?;
    let power_mw = prompt_number("Nominal power (mW):", 1.0)?;
    let channel = Select::new("Laser channel:", vec![LaserChannel::One, LaserChannel::Two])
        .prompt()
        .ok()?;
    let meter_channel = CustomType::<u8>::new("Power meter channel:")
        .with_default(1)
        .prompt()
        .ok()?;
    let laser_type = Select::new("Laser type:", vec![LaserType::Apc, LaserType::Acc])
        .prompt()
        .ok()?;

    let unit = LaserUnitInfo {
        laser_sn,
        unit_sn,
        wavelength_nm,
        operating_current_ma,
        max_current_ma,
        power_mw,
        channel,
        meter_channel,
        laser_type,
    };
    println!("\n{unit}\n");
    Confirm::new("Are these values correct?")
        .with_default(true)
        .prompt()
        .ok()
        .filter(|correct| *correct)
        .map(|_| unit)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = match StationConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Unable to load {config_path}: {err}");
            std::process::exit(1);
        }
    };
    info!("Loaded register defaults from {config_path}");

    let mut session = Session::open(&mut PortSelect, ThreadSleep);
    let mut operator = Console;

    const INITIALIZE: &str = "Initialize Driver Board";
    const CONFIGURE: &str = "Configure Laser";
    const EXIT: &str = "Exit";

    loop {
        let choice = match Select::new("Main menu:", vec![INITIALIZE, CONFIGURE, EXIT]).prompt() {
            Ok(choice) => choice,
            Err(_) => break,
        };
        match choice {
            INITIALIZE => match session.initialize_board(&config.image, &mut operator) {
                Ok(report) => {
                    for check in &report.checks {
                        println!("{check}");
                    }
                    if report.passed() {
                        println!("Driver board verified: PASS");
                    } else {
                        println!("Driver board verification: FAIL");
                    }
                }
                Err(err) => error!("Board initialization failed: {err}"),
            },
            CONFIGURE => {
                if !session.has_power_meter() {
                    error!("No power meter connected, restart with the meter attached");
                    continue;
                }
                let Some(unit) = prompt_unit_info() else {
                    continue;
                };
                match session.configure_laser_apc(&unit, &config.apc, &mut operator) {
                    Ok(report) => {
                        for step in &report.steps {
                            println!("{step:?}");
                        }
                        let path: Vec<String> =
                            report.transitions.iter().map(ToString::to_string).collect();
                        println!("{}", path.join(" -> "));
                        println!("{report}");
                        if report.outcome.state() != RampState::NominalReached {
                            println!("Contact engineering before retrying this laser");
                        }
                    }
                    Err(err) => error!("Laser configuration failed: {err}"),
                }
            }
            _ => break,
        }
    }

    session.close();
    info!("Done");
}
