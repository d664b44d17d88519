//! Architecture identifiers.
//!
//! Formulas publish one artifact per CPU class. The host is classified once
//! and matched against the published variants; hosts outside the known set
//! are kept as [`HostArch::Unrecognized`] with their word size, which decides
//! the class they are served.
//!
//! # Example
//!
//! ```
//! use brewlet_schema::{Arch, HostArch};
//!
//! let host: HostArch = "x86_64".parse().unwrap();
//! assert_eq!(host.known(), Some(Arch::Amd64));
//! ```

/// CPU class an artifact variant is built for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86 (`x86_64`, `amd64`).
    Amd64,
    /// 32-bit x86 (`i386`, `i686`, `386`).
    X86,
}

impl Arch {
    /// All architectures a formula may publish.
    pub const ALL: [Self; 2] = [Self::Amd64, Self::X86];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::X86 => "x86",
        }
    }

    /// Word size of binaries built for this architecture.
    pub fn pointer_width(self) -> u32 {
        match self {
            Self::Amd64 => 64,
            Self::X86 => 32,
        }
    }

    /// The architecture published for hosts of the given word size.
    pub fn for_pointer_width(bits: u32) -> Option<Self> {
        match bits {
            64 => Some(Self::Amd64),
            32 => Some(Self::X86),
            _ => None,
        }
    }

    /// Whether a build for this architecture can run on `host`.
    ///
    /// An x86 host family runs its own and narrower builds. An unrecognized
    /// host only runs builds of its own word size.
    pub fn runs_on(self, host: &HostArch) -> bool {
        match host {
            HostArch::Known(arch) => self.pointer_width() <= arch.pointer_width(),
            HostArch::Unrecognized { pointer_width, .. } => self.pointer_width() == *pointer_width,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" | "x64" => Ok(Self::Amd64),
            "x86" | "386" | "i386" | "i686" => Ok(Self::X86),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// Classification of the machine an install runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostArch {
    /// The host matches one of the architectures formulas can publish.
    Known(Arch),
    /// Any other instruction set (e.g. `aarch64`), carried verbatim for error
    /// messages together with its word size.
    Unrecognized {
        /// Raw architecture name.
        raw: String,
        /// Pointer width in bits.
        pointer_width: u32,
    },
}

const NATIVE_POINTER_WIDTH: u32 = if cfg!(target_pointer_width = "64") {
    64
} else {
    32
};

impl HostArch {
    /// Classify the architecture this process is running on.
    pub fn detect() -> Self {
        Self::classify(std::env::consts::ARCH, NATIVE_POINTER_WIDTH)
    }

    /// Classify a raw architecture name such as `std::env::consts::ARCH`.
    ///
    /// The word size of an unrecognized name is taken from the name itself:
    /// `aarch64`, `riscv64` and `s390x` are 64-bit, anything else 32-bit.
    pub fn from_raw(raw: &str) -> Self {
        let pointer_width = if raw.ends_with("64") || raw == "s390x" {
            64
        } else {
            32
        };
        Self::classify(raw, pointer_width)
    }

    /// Classify `raw`, recording `pointer_width` if the name is unrecognized.
    pub fn classify(raw: &str, pointer_width: u32) -> Self {
        raw.parse::<Arch>().map_or_else(
            |_| Self::Unrecognized {
                raw: raw.to_string(),
                pointer_width,
            },
            Self::Known,
        )
    }

    /// The recognized architecture, if any.
    pub fn known(&self) -> Option<Arch> {
        match self {
            Self::Known(arch) => Some(*arch),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Word size of the host in bits.
    pub fn pointer_width(&self) -> u32 {
        match self {
            Self::Known(arch) => arch.pointer_width(),
            Self::Unrecognized { pointer_width, .. } => *pointer_width,
        }
    }

    /// The published class this host belongs to.
    ///
    /// Known hosts are their own class. Other hosts are classed by word size,
    /// so a 64-bit `aarch64` machine is served the amd64 build.
    pub fn class(&self) -> Option<Arch> {
        match self {
            Self::Known(arch) => Some(*arch),
            Self::Unrecognized { pointer_width, .. } => Arch::for_pointer_width(*pointer_width),
        }
    }
}

impl From<Arch> for HostArch {
    fn from(arch: Arch) -> Self {
        Self::Known(arch)
    }
}

impl std::fmt::Display for HostArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(arch) => write!(f, "{arch}"),
            Self::Unrecognized { raw, .. } => write!(f, "{raw}"),
        }
    }
}

impl std::str::FromStr for HostArch {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_raw(s))
    }
}
