use crate::error::SlError;
use crate::platform::{CpuidResult, Platform};
use core::fmt;
use log::{error, info};

/// Which secure-launch family this boot attempt follows.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Architecture {
    #[default]
    None,
    /// Intel SMX, `GETSEC[SENTER]`.
    IntelTxt,
    /// AMD SVM, `SKINIT`.
    AmdSkinit,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::IntelTxt => "Intel TXT",
            Self::AmdSkinit => "AMD SKINIT",
        })
    }
}

/// `CPUID.0` vendor words in `EBX`, `ECX`, `EDX` order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VendorId {
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

impl VendorId {
    /// `"GenuineIntel"`
    pub const INTEL: Self = Self {
        ebx: 0x756E_6547,
        ecx: 0x6C65_746E,
        edx: 0x4965_6E69,
    };

    /// `"AuthenticAMD"`
    pub const AMD: Self = Self {
        ebx: 0x6874_7541,
        ecx: 0x444D_4163,
        edx: 0x6974_6E65,
    };

    #[must_use]
    pub const fn from_cpuid(leaf0: &CpuidResult) -> Self {
        Self {
            ebx: leaf0.ebx,
            ecx: leaf0.ecx,
            edx: leaf0.edx,
        }
    }

    /// The launch family for this vendor, if any.
    #[must_use]
    pub fn architecture(&self) -> Option<Architecture> {
        if *self == Self::INTEL {
            Some(Architecture::IntelTxt)
        } else if *self == Self::AMD {
            Some(Architecture::AmdSkinit)
        } else {
            None
        }
    }
}

/// Identify the CPU vendor and with it the launch family.
///
/// # Errors
/// [`SlError::Fatal`] when `CPUID` is missing or the vendor is unknown.
pub fn detect<P: Platform>(platform: &mut P) -> Result<Architecture, SlError> {
    if !platform.cpuid_available() {
        error!("CPUID instruction is not supported");
        return Err(SlError::Fatal);
    }

    let leaf0 = platform.cpuid(0, 0);
    match VendorId::from_cpuid(&leaf0).architecture() {
        Some(arch) => {
            info!("platform is {arch}");
            Ok(arch)
        }
        None => {
            error!("platform is neither Intel nor AMD");
            Err(SlError::Fatal)
        }
    }
}
