//! Hardware family selection.

use std::fmt;
use std::str::FromStr;

/// Pinball CPU/ROM family.
///
/// The family decides how big shadow memory is, whether there is a bus to
/// snoop at all, and how long a "no ball in play" reading must persist
/// before a game is considered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Williams System 9 (6802, 2K RAM).
    Sys9,
    /// Williams System 11 (6802/6808, 2K RAM).
    Sys11,
    /// Williams/Bally WPC (6809, 8K RAM).
    Wpc,
    /// Data East (6809, 8K RAM).
    DataEast,
    /// Electromechanical: no CPU, sensors sampled directly.
    Em,
}

/// Hold time for families whose ball-in-play byte drops to zero between
/// balls.
const LONG_HOLD_MS: u64 = 15_000;

impl Family {
    /// Milliseconds ball-in-play must read zero before a game is over.
    #[must_use]
    pub const fn hold_time_ms(self) -> u64 {
        match self {
            Self::Wpc | Self::DataEast => LONG_HOLD_MS,
            Self::Sys9 | Self::Sys11 | Self::Em => 0,
        }
    }

    /// Shadow memory size for the family (zero when there is no bus).
    #[must_use]
    pub const fn shadow_len(self) -> usize {
        match self {
            Self::Sys9 | Self::Sys11 => 0x0800,
            Self::Wpc | Self::DataEast => 0x2000,
            Self::Em => 0,
        }
    }

    /// Does the family expose a CPU bus to snoop?
    #[must_use]
    pub const fn has_bus(self) -> bool {
        !matches!(self, Self::Em)
    }

    /// Configuration name, as written in `GameInfo.System`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sys9 => "9",
            Self::Sys11 => "11",
            Self::Wpc => "WPC",
            Self::DataEast => "DE",
            Self::Em => "EM",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised `GameInfo.System` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFamily(pub String);

impl fmt::Display for UnknownFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown hardware family {:?}", self.0)
    }
}

impl std::error::Error for UnknownFamily {}

impl FromStr for Family {
    type Err = UnknownFamily;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_uppercase();
        match key.as_str() {
            "9" | "S9" | "SYS9" | "SYSTEM9" => Ok(Self::Sys9),
            "11" | "11A" | "11B" | "11C" | "S11" | "SYS11" | "SYSTEM11" => Ok(Self::Sys11),
            "WPC" | "WPC89" | "WPC95" | "WPCS" | "DMD" => Ok(Self::Wpc),
            "DE" | "DATAEAST" | "DATA EAST" | "DATA_EAST" => Ok(Self::DataEast),
            "EM" => Ok(Self::Em),
            _ => Err(UnknownFamily(s.to_string())),
        }
    }
}
