//! Android ABIs and multi-ABI sets.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Native instruction set a library directory or split is built for.
///
/// The directory name under `lib/` selects the ABI, so [`Abi::as_str`]
/// returns exactly that name.
///
/// # Example
///
/// ```
/// use bundlekit_schema::Abi;
///
/// let abi: Abi = "arm64-v8a".parse().unwrap();
/// assert_eq!(abi, Abi::Arm64V8a);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Abi {
    /// 32-bit ARM without hardware floating point.
    Armeabi,
    /// 32-bit ARMv7.
    ArmeabiV7a,
    /// 64-bit ARMv8.
    Arm64V8a,
    /// 32-bit Intel.
    X86,
    /// 64-bit Intel.
    X86_64,
    /// 32-bit MIPS.
    Mips,
    /// 64-bit MIPS.
    Mips64,
    /// 64-bit RISC-V.
    Riscv64,
}

impl Abi {
    /// Every known ABI, in platform preference order.
    pub const ALL: [Self; 8] = [
        Self::Armeabi,
        Self::ArmeabiV7a,
        Self::Arm64V8a,
        Self::X86,
        Self::X86_64,
        Self::Mips,
        Self::Mips64,
        Self::Riscv64,
    ];

    /// Directory name of the ABI under `lib/`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Armeabi => "armeabi",
            Self::ArmeabiV7a => "armeabi-v7a",
            Self::Arm64V8a => "arm64-v8a",
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Mips => "mips",
            Self::Mips64 => "mips64",
            Self::Riscv64 => "riscv64",
        }
    }

    /// Name used in split ids and APEX image file names (`arm64_v8a`).
    pub fn split_name(&self) -> String {
        self.as_str().replace('-', "_")
    }

    /// Whether the ABI is a 64-bit instruction set.
    pub fn is_64_bit(&self) -> bool {
        matches!(
            self,
            Self::Arm64V8a | Self::X86_64 | Self::Mips64 | Self::Riscv64
        )
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Abi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "armeabi" => Ok(Self::Armeabi),
            "armeabi-v7a" | "armeabi_v7a" => Ok(Self::ArmeabiV7a),
            "arm64-v8a" | "arm64_v8a" => Ok(Self::Arm64V8a),
            "x86" => Ok(Self::X86),
            "x86_64" | "x86-64" => Ok(Self::X86_64),
            "mips" => Ok(Self::Mips),
            "mips64" => Ok(Self::Mips64),
            "riscv64" => Ok(Self::Riscv64),
            _ => Err(format!("Unknown ABI: {s}")),
        }
    }
}

/// A set of ABIs served together, as used by APEX images (`x86_64.x86.img`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct MultiAbi(BTreeSet<Abi>);

impl MultiAbi {
    /// Create a multi-ABI value from any collection of ABIs.
    pub fn new(abis: impl IntoIterator<Item = Abi>) -> Self {
        Self(abis.into_iter().collect())
    }

    /// The ABIs in this set, in [`Abi`] order.
    pub fn abis(&self) -> &BTreeSet<Abi> {
        &self.0
    }

    /// Whether this set contains no ABI.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MultiAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(Abi::split_name).collect();
        write!(f, "{}", names.join("."))
    }
}

impl std::str::FromStr for MultiAbi {
    type Err = String;

    /// Parse a dot-separated list such as `x86_64.arm64_v8a`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let abis = s
            .split('.')
            .map(str::parse::<Abi>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        if abis.is_empty() {
            return Err(format!("Empty multi-ABI value: '{s}'"));
        }
        Ok(Self(abis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_and_split_names() {
        assert_eq!("arm64-v8a".parse::<Abi>().unwrap(), Abi::Arm64V8a);
        assert_eq!("arm64_v8a".parse::<Abi>().unwrap(), Abi::Arm64V8a);
        assert_eq!("X86".parse::<Abi>().unwrap(), Abi::X86);
        assert!("sparc".parse::<Abi>().is_err());
    }

    #[test]
    fn multi_abi_round_trips_through_display() {
        let multi: MultiAbi = "x86_64.x86".parse().unwrap();
        assert_eq!(multi.abis().len(), 2);
        assert_eq!(multi.to_string(), "x86.x86_64");
    }
}
