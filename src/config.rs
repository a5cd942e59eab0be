//! Default register image of the driver board and its JSON file.
//!
//! The file is `{"version": 1, "registers": {"LASER1_TEC": 2200, ...}, "apc": {...}}`. Files from
//! the older tool are a flat `{"LASER1_TEC": 2200, ...}` map and are still accepted.

use std::{collections::BTreeMap, fs, path::Path};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    codec,
    error::{ConfigError, RegisterError},
    ramp::ApcSettings,
    register::{ChannelRegister, LaserChannel, Register},
};

/// Current file format version.
pub const CONFIG_VERSION: u32 = 1;

/// Default file name, looked up next to the operator tool.
pub const DEFAULT_CONFIG_FILE: &str = "Default_Config.json";

/// Per-channel default register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserChannelConfig {
    pub tec: u16,
    pub plr: u8,
    pub mode: u8,
    pub irange: u8,
    pub ilim: u8,
    pub power: u8,
    pub state: u8,
    pub reg_delay_comp: u8,
    pub offset_comp: u8,
}

impl Default for LaserChannelConfig {
    fn default() -> Self {
        Self {
            tec: 2200,
            plr: 50,
            mode: 0,
            irange: 1,
            ilim: 50,
            power: 0,
            state: 0,
            reg_delay_comp: 7,
            offset_comp: 1,
        }
    }
}

impl LaserChannelConfig {
    /// Default value for one kind of channel register. `None` for the save trigger.
    pub fn get(&self, kind: ChannelRegister) -> Option<u32> {
        use ChannelRegister as C;
        Some(match kind {
            C::Tec => self.tec as u32,
            C::Plr => self.plr as u32,
            C::Mode => self.mode as u32,
            C::IRange => self.irange as u32,
            C::ILim => self.ilim as u32,
            C::Power => self.power as u32,
            C::State => self.state as u32,
            C::RegDelayComp => self.reg_delay_comp as u32,
            C::OffsetComp => self.offset_comp as u32,
            C::Save => return None,
        })
    }

    /// Store a value already checked against the register width. Returns `false` for the save
    /// trigger, which has no default.
    fn store(&mut self, kind: ChannelRegister, value: u32) -> bool {
        use ChannelRegister as C;
        match kind {
            C::Tec => self.tec = value as u16,
            C::Plr => self.plr = value as u8,
            C::Mode => self.mode = value as u8,
            C::IRange => self.irange = value as u8,
            C::ILim => self.ilim = value as u8,
            C::Power => self.power = value as u8,
            C::State => self.state = value as u8,
            C::RegDelayComp => self.reg_delay_comp = value as u8,
            C::OffsetComp => self.offset_comp = value as u8,
            C::Save => return false,
        }
        true
    }
}

/// The full default image: both channels plus the shared RDCO value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaserDriverConfig {
    pub laser1: LaserChannelConfig,
    pub laser2: LaserChannelConfig,
    pub rdco: u8,
}

impl Default for LaserDriverConfig {
    fn default() -> Self {
        Self {
            laser1: LaserChannelConfig::default(),
            laser2: LaserChannelConfig::default(),
            rdco: 25,
        }
    }
}

/// Registers of the default image, in the order they are written to the board.
pub const IMAGE_ORDER: [Register; 19] = [
    Register::Laser1Tec,
    Register::Laser2Tec,
    Register::Rdco,
    Register::Laser1Plr,
    Register::Laser2Plr,
    Register::Laser1Mode,
    Register::Laser2Mode,
    Register::Laser1IRange,
    Register::Laser2IRange,
    Register::Laser1ILim,
    Register::Laser2ILim,
    Register::Laser1RegDelayComp,
    Register::Laser2RegDelayComp,
    Register::Laser1OffsetComp,
    Register::Laser2OffsetComp,
    Register::Laser1State,
    Register::Laser2State,
    Register::Laser1Pow,
    Register::Laser2Pow,
];

/// Split an image register into its channel and kind. `None` for RDCO.
fn channel_kind(register: Register) -> Option<(LaserChannel, ChannelRegister)> {
    use ChannelRegister as C;
    use Register as R;
    let (channel, kind) = match register {
        R::Laser1Tec => (LaserChannel::One, C::Tec),
        R::Laser2Tec => (LaserChannel::Two, C::Tec),
        R::Laser1Plr => (LaserChannel::One, C::Plr),
        R::Laser2Plr => (LaserChannel::Two, C::Plr),
        R::Laser1Mode => (LaserChannel::One, C::Mode),
        R::Laser2Mode => (LaserChannel::Two, C::Mode),
        R::Laser1IRange => (LaserChannel::One, C::IRange),
        R::Laser2IRange => (LaserChannel::Two, C::IRange),
        R::Laser1ILim => (LaserChannel::One, C::ILim),
        R::Laser2ILim => (LaserChannel::Two, C::ILim),
        R::Laser1RegDelayComp => (LaserChannel::One, C::RegDelayComp),
        R::Laser2RegDelayComp => (LaserChannel::Two, C::RegDelayComp),
        R::Laser1OffsetComp => (LaserChannel::One, C::OffsetComp),
        R::Laser2OffsetComp => (LaserChannel::Two, C::OffsetComp),
        R::Laser1State => (LaserChannel::One, C::State),
        R::Laser2State => (LaserChannel::Two, C::State),
        R::Laser1Pow => (LaserChannel::One, C::Power),
        R::Laser2Pow => (LaserChannel::Two, C::Power),
        R::Rdco | R::Laser1Save | R::Laser2Save | R::LaserStatus => return None,
    };
    Some((channel, kind))
}

impl LaserDriverConfig {
    pub fn channel(&self, channel: LaserChannel) -> &LaserChannelConfig {
        match channel {
            LaserChannel::One => &self.laser1,
            LaserChannel::Two => &self.laser2,
        }
    }

    pub fn channel_mut(&mut self, channel: LaserChannel) -> &mut LaserChannelConfig {
        match channel {
            LaserChannel::One => &mut self.laser1,
            LaserChannel::Two => &mut self.laser2,
        }
    }

    /// The image flattened into `(register, value)` pairs in [`IMAGE_ORDER`].
    pub fn entries(&self) -> Vec<(Register, u32)> {
        IMAGE_ORDER
            .iter()
            .filter_map(|&register| self.value(register).map(|value| (register, value)))
            .collect()
    }

    /// Value of an image register. `None` for registers outside the image.
    pub fn value(&self, register: Register) -> Option<u32> {
        if register == Register::Rdco {
            return Some(self.rdco as u32);
        }
        let (channel, kind) = channel_kind(register)?;
        self.channel(channel).get(kind)
    }

    /// Set one register of the image, checked against the register's bit width.
    pub fn set(&mut self, register: Register, value: i64) -> Result<(), RegisterError> {
        // Width check shared with the encoder. The packed word itself is not kept.
        codec::encode(register, value)?;
        let value = value as u32;
        if register == Register::Rdco {
            self.rdco = value as u8;
            return Ok(());
        }
        let stored = channel_kind(register)
            .is_some_and(|(channel, kind)| self.channel_mut(channel).store(kind, value));
        if stored {
            Ok(())
        } else {
            Err(RegisterError::UnknownRegister(register.name().into()))
        }
    }

    /// Build an image from a name -> value map. Names not in the map keep their default.
    pub fn from_named(values: &BTreeMap<String, i64>) -> Result<Self, RegisterError> {
        let mut config = Self::default();
        for (name, &value) in values {
            config.set(Register::from_name(name)?, value)?;
        }
        for register in IMAGE_ORDER {
            if !values.contains_key(register.name()) {
                warn!("{register} missing from config file, using default");
            }
        }
        Ok(config)
    }

    pub fn to_named(&self) -> BTreeMap<String, i64> {
        self.entries()
            .into_iter()
            .map(|(register, value)| (register.name().to_string(), value as i64))
            .collect()
    }
}

/// Everything persisted in the config file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StationConfig {
    pub image: LaserDriverConfig,
    pub apc: ApcSettings,
}

#[derive(Serialize, Deserialize)]
struct VersionedFile {
    version: u32,
    registers: BTreeMap<String, i64>,
    #[serde(default)]
    apc: Option<ApcSettings>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Versioned(VersionedFile),
    Legacy(BTreeMap<String, i64>),
}

impl StationConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        match serde_json::from_str::<ConfigFile>(text)? {
            ConfigFile::Versioned(file) => {
                if file.version != CONFIG_VERSION {
                    return Err(ConfigError::UnsupportedVersion(file.version));
                }
                let apc = file.apc.unwrap_or_default();
                apc.validate().map_err(ConfigError::InvalidSettings)?;
                Ok(Self {
                    image: LaserDriverConfig::from_named(&file.registers)?,
                    apc,
                })
            }
            ConfigFile::Legacy(registers) => {
                info!("Loading unversioned config file");
                Ok(Self {
                    image: LaserDriverConfig::from_named(&registers)?,
                    apc: ApcSettings::default(),
                })
            }
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        let file = VersionedFile {
            version: CONFIG_VERSION,
            registers: self.image.to_named(),
            apc: Some(self.apc.clone()),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Load the config file, creating it with built-in defaults if it does not exist.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            info!("Loading config from {}", path.display());
            Self::from_json(&fs::read_to_string(path)?)
        } else {
            let config = Self::default();
            info!("Creating default config at {}", path.display());
            fs::write(path, config.to_json()?)?;
            Ok(config)
        }
    }
}
