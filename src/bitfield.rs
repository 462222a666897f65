use tracing::trace;

use crate::store::{ParameterLookup, ParameterStore};
use crate::transport::Transport;
use crate::{Error, Result};

/// Single-bit mask, `None` past the top of a 32-bit register.
fn bit_mask(pos: u8) -> Option<u32> {
    1u32.checked_shl(u32::from(pos))
}

/// Logical state of bit `pos`. With `invert`, a cleared bit reads as on.
/// Positions past bit 31 read as off.
pub fn read_bit(value: u32, pos: u8, invert: bool) -> bool {
    let Some(mask) = bit_mask(pos) else {
        return false;
    };
    (value & mask != 0) != invert
}

/// Returns `value` with only bit `pos` changed so that it reads as `on`.
/// Positions past bit 31 leave `value` untouched.
pub fn write_bit(value: u32, pos: u8, on: bool, invert: bool) -> u32 {
    let Some(mask) = bit_mask(pos) else {
        return value;
    };
    if on != invert {
        value | mask
    } else {
        value & !mask
    }
}

/// Named bits of a circuit's settings register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFlag {
    /// Stored as "heating disabled".
    HeatingEnabled,
    CoolingEnabled,
    PumpOnly,
    PumpBlockage,
}

impl SettingsFlag {
    pub const fn bit(self) -> u8 {
        match self {
            SettingsFlag::HeatingEnabled => 20,
            SettingsFlag::CoolingEnabled => 17,
            SettingsFlag::PumpOnly => 13,
            SettingsFlag::PumpBlockage => 10,
        }
    }

    pub const fn inverted(self) -> bool {
        matches!(self, SettingsFlag::HeatingEnabled)
    }
}

/// Bit-vector view over one stored integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagRegister(u32);

impl FlagRegister {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn bit(&self, pos: u8) -> bool {
        read_bit(self.0, pos, false)
    }

    pub fn set_bit(&mut self, pos: u8, on: bool) {
        self.0 = write_bit(self.0, pos, on, false);
    }

    pub fn flag(&self, flag: SettingsFlag) -> bool {
        read_bit(self.0, flag.bit(), flag.inverted())
    }

    pub fn set_flag(&mut self, flag: SettingsFlag, on: bool) {
        self.0 = write_bit(self.0, flag.bit(), on, flag.inverted());
    }
}

/// An on/off control backed by a whole 0/1 parameter or by one bit of a
/// flag register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Switch {
    Plain { id: String },
    Bit { id: String, pos: u8, invert: bool },
}

impl Switch {
    pub fn plain(id: impl Into<String>) -> Self {
        Switch::Plain { id: id.into() }
    }

    pub fn settings(id: impl Into<String>, flag: SettingsFlag) -> Self {
        Switch::Bit {
            id: id.into(),
            pos: flag.bit(),
            invert: flag.inverted(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Switch::Plain { id } | Switch::Bit { id, .. } => id,
        }
    }

    /// `None` while the backing parameter is missing.
    pub fn is_on(&self, lookup: &impl ParameterLookup) -> Option<bool> {
        match self {
            Switch::Plain { id } => lookup.value_i64(id).map(|v| v != 0),
            Switch::Bit { id, pos, invert } => {
                lookup.register(id).map(|v| read_bit(v, *pos, *invert))
            }
        }
    }

    pub async fn turn_on<T: Transport>(&self, store: &ParameterStore<T>) -> Result<()> {
        self.write(store, true).await
    }

    pub async fn turn_off<T: Transport>(&self, store: &ParameterStore<T>) -> Result<()> {
        self.write(store, false).await
    }

    async fn write<T: Transport>(&self, store: &ParameterStore<T>, on: bool) -> Result<()> {
        match self {
            Switch::Plain { id } => store.set(id, i64::from(on)).await,
            Switch::Bit { id, pos, invert } => {
                let current = store
                    .register(id)
                    .ok_or_else(|| Error::UnknownParameter(id.clone()))?;
                let next = write_bit(current, *pos, on, *invert);
                if next == current {
                    trace!(%id, pos, on, "bit already in requested state");
                    return Ok(());
                }
                store.set(id, next).await
            }
        }
    }
}
