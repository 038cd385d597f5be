//! S7 memory areas and the descriptor passed with every read/write.

use std::fmt;

/// S7 memory area.
///
/// The discriminants are the area codes used on the wire by S7 drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Process inputs (I / E)
    Inputs = 0x81,
    /// Process outputs (Q / A)
    Outputs = 0x82,
    /// Flag memory (M)
    Merker = 0x83,
    /// Data block (DB)
    DataBlock = 0x84,
    /// Counters (C / Z)
    Counter = 0x1C,
    /// Timers (T)
    Timer = 0x1D,
}

impl Area {
    #[inline]
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Short mnemonic used in log output.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Area::Inputs => "I",
            Area::Outputs => "Q",
            Area::Merker => "M",
            Area::DataBlock => "DB",
            Area::Counter => "C",
            Area::Timer => "T",
        }
    }
}

/// Area plus data block number.
///
/// The DB number is only meaningful for [`Area::DataBlock`]; other areas
/// always carry 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaDescriptor {
    pub area: Area,
    pub db_number: u16,
}

impl AreaDescriptor {
    pub fn new(area: Area, db_number: u16) -> Self {
        let db_number = if area == Area::DataBlock { db_number } else { 0 };
        Self { area, db_number }
    }

    /// Descriptor for data block `db_number`.
    pub fn data_block(db_number: u16) -> Self {
        Self::new(Area::DataBlock, db_number)
    }

    pub fn inputs() -> Self {
        Self::new(Area::Inputs, 0)
    }

    pub fn outputs() -> Self {
        Self::new(Area::Outputs, 0)
    }

    pub fn merker() -> Self {
        Self::new(Area::Merker, 0)
    }
}

impl fmt::Display for AreaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.area {
            Area::DataBlock => write!(f, "DB{}", self.db_number),
            other => f.write_str(other.mnemonic()),
        }
    }
}
