//! # SMX capability and parameter queries
//!
//! `GETSEC[CAPABILITIES]` tells whether a TXT chipset is present and which
//! leaves exist; `GETSEC[PARAMETERS]` is walked with an increasing index to
//! learn the SINIT constraints. Both need `CR4.SMXE = 1`.

use crate::error::SlError;
use crate::platform::Platform;
use bitfield_struct::bitfield;
use log::{debug, error, warn};

/// Upper bound on collected ACM version entries.
pub const MAX_SUPPORTED_ACM_VERSIONS: usize = 16;

/// Upper bound on `GETSEC[PARAMETERS]` queries.
pub const MAX_PARAMETER_QUERIES: u32 = 16;

pub const ACM_MEM_TYPE_UC: u32 = 0x0100;
pub const ACM_MEM_TYPE_WC: u32 = 0x0200;
pub const ACM_MEM_TYPE_WT: u32 = 0x1000;
pub const ACM_MEM_TYPE_WP: u32 = 0x2000;
pub const ACM_MEM_TYPE_WB: u32 = 0x4000;

const DEFAULT_ACM_MAX_SIZE: u32 = 0x8000;
const DEFAULT_ACM_VERSION: AcmVersion = AcmVersion {
    mask: 0xFFFF_FFFF,
    version: 0,
};

/// `EAX` of `GETSEC[CAPABILITIES]` with index 0.
#[bitfield(u32, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct GetsecCapabilities {
    /// Bit 0 — a TXT-capable chipset is present.
    pub chipset_present: bool,

    /// Bit 1 — Undefined.
    pub undefined_1: bool,

    /// Bit 2 — `ENTERACCS` available.
    pub enteraccs: bool,

    /// Bit 3 — `EXITAC` available.
    pub exitac: bool,

    /// Bit 4 — `SENTER` available.
    pub senter: bool,

    /// Bit 5 — `SEXIT` available.
    pub sexit: bool,

    /// Bit 6 — `PARAMETERS` available.
    pub parameters: bool,

    /// Bit 7 — `SMCTRL` available.
    pub smctrl: bool,

    /// Bit 8 — `WAKEUP` available.
    pub wakeup: bool,

    /// Bits 9–30 — Undefined.
    #[bits(22)]
    pub undefined_9_30: u32,

    /// Bit 31 — extended leaves are reported.
    pub extended_leafs: bool,
}

impl GetsecCapabilities {
    /// Chipset present and every leaf the measured launch needs.
    #[must_use]
    pub const fn launch_capable(&self) -> bool {
        self.chipset_present()
            && self.senter()
            && self.sexit()
            && self.parameters()
            && self.smctrl()
            && self.wakeup()
    }
}

/// One supported SINIT version: a module matches if
/// `module_version & mask == version`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AcmVersion {
    pub mask: u32,
    pub version: u32,
}

/// Decoded `GETSEC[PARAMETERS]` output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GetsecParameters {
    acm_versions: [AcmVersion; MAX_SUPPORTED_ACM_VERSIONS],
    n_versions: usize,
    /// Maximum size of the authenticated code execution area, in bytes.
    pub acm_max_size: u32,
    /// Supported memory types for the module, `ACM_MEM_TYPE_*` bits.
    pub acm_mem_types: u32,
    pub senter_controls: u32,
    /// The processor provides its own S-CRTM.
    pub proc_based_scrtm: bool,
    /// Machine-check errors may be left in the banks across SENTER.
    pub preserve_mce: bool,
}

impl Default for GetsecParameters {
    fn default() -> Self {
        Self {
            acm_versions: [AcmVersion::default(); MAX_SUPPORTED_ACM_VERSIONS],
            n_versions: 0,
            acm_max_size: DEFAULT_ACM_MAX_SIZE,
            acm_mem_types: ACM_MEM_TYPE_UC,
            senter_controls: 0,
            proc_based_scrtm: false,
            preserve_mce: false,
        }
    }
}

impl GetsecParameters {
    #[must_use]
    pub fn acm_versions(&self) -> &[AcmVersion] {
        &self.acm_versions[..self.n_versions]
    }

    fn push_version(&mut self, v: AcmVersion) {
        if self.n_versions == MAX_SUPPORTED_ACM_VERSIONS {
            warn!("more than {MAX_SUPPORTED_ACM_VERSIONS} supported ACM versions, ignoring {v:x?}");
            return;
        }
        self.acm_versions[self.n_versions] = v;
        self.n_versions += 1;
    }
}

/// Read `GETSEC[CAPABILITIES]` index 0.
pub fn capabilities<P: Platform>(platform: &mut P) -> GetsecCapabilities {
    GetsecCapabilities::from_bits(platform.getsec_capabilities(0))
}

/// Walk `GETSEC[PARAMETERS]` until the end marker, an unknown type or the
/// query bound.
///
/// # Errors
/// [`SlError::Fatal`] if `CR4.SMXE` is clear, GETSEC would fault.
pub fn query_parameters<P: Platform>(platform: &mut P) -> Result<GetsecParameters, SlError> {
    if !platform.read_cr4().smxe() {
        error!("SMXE not enabled, can't read parameters");
        return Err(SlError::Fatal);
    }

    let mut params = GetsecParameters::default();
    let mut terminated = false;
    for index in 0..MAX_PARAMETER_QUERIES {
        let leaf = platform.getsec_parameters(index);
        match leaf.param_type() {
            0 => {
                terminated = true;
                break;
            }
            1 => params.push_version(AcmVersion {
                mask: leaf.ebx,
                version: leaf.ecx,
            }),
            2 => params.acm_max_size = leaf.eax & 0xFFFF_FFE0,
            3 => params.acm_mem_types = leaf.eax & 0xFFFF_FFE0,
            4 => params.senter_controls = (leaf.eax & 0x7FFF) >> 8,
            5 => {
                params.proc_based_scrtm = leaf.eax & (1 << 5) != 0;
                params.preserve_mce = leaf.eax & (1 << 6) != 0;
            }
            other => {
                warn!("unknown GETSEC[PARAMETERS] type: {other}");
                terminated = true;
                break;
            }
        }
    }
    if !terminated {
        warn!("GETSEC[PARAMETERS] did not terminate after {MAX_PARAMETER_QUERIES} queries");
    }

    if params.n_versions == 0 {
        params.push_version(DEFAULT_ACM_VERSION);
    }

    debug!(
        "ACM max size {:#x}, mem types {:#x}, SENTER controls {:#x}",
        params.acm_max_size, params.acm_mem_types, params.senter_controls
    );
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::GetsecParameterLeaf;
    use crate::sim::{SimEvent, SimPlatform};

    fn smx_enabled(leaves: &[GetsecParameterLeaf]) -> SimPlatform {
        let mut sim = SimPlatform::intel();
        sim.cr4 = sim.cr4.with_smxe(true);
        sim.set_getsec_parameters(leaves);
        sim
    }

    #[test]
    fn capability_bits() {
        let caps = GetsecCapabilities::from_bits(0x1FD);
        assert!(caps.launch_capable());
        assert!(!caps.with_wakeup(false).launch_capable());
        assert!(!GetsecCapabilities::from_bits(0x1FC).launch_capable());
    }

    #[test]
    fn requires_smxe() {
        let mut sim = SimPlatform::intel();
        assert_eq!(query_parameters(&mut sim), Err(SlError::Fatal));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn decodes_preset() {
        let mut sim = SimPlatform::intel();
        sim.cr4 = sim.cr4.with_smxe(true);
        let p = query_parameters(&mut sim).unwrap();
        assert_eq!(p.acm_versions(), &[AcmVersion { mask: 0xFFFF_FFFF, version: 0 }]);
        assert_eq!(p.acm_max_size, 0x0004_0000);
        assert_eq!(p.acm_mem_types, ACM_MEM_TYPE_UC | ACM_MEM_TYPE_WB);
        assert!(p.proc_based_scrtm);
        assert!(!p.preserve_mce);
    }

    #[test]
    fn defaults_without_entries() {
        let mut sim = smx_enabled(&[]);
        let p = query_parameters(&mut sim).unwrap();
        assert_eq!(p.acm_max_size, 0x8000);
        assert_eq!(p.acm_mem_types, ACM_MEM_TYPE_UC);
        assert_eq!(p.acm_versions(), &[DEFAULT_ACM_VERSION]);
        assert_eq!(sim.events(), &[SimEvent::GetsecParameters(0)]);
    }

    #[test]
    fn senter_controls_and_mce() {
        let mut sim = smx_enabled(&[
            GetsecParameterLeaf { eax: 0x0000_7F04, ebx: 0, ecx: 0 },
            GetsecParameterLeaf { eax: 0x45, ebx: 0, ecx: 0 },
        ]);
        let p = query_parameters(&mut sim).unwrap();
        assert_eq!(p.senter_controls, 0x7F);
        assert!(p.preserve_mce);
        assert!(!p.proc_based_scrtm);
    }

    #[test]
    fn unknown_type_stops_the_walk() {
        let mut sim = smx_enabled(&[
            GetsecParameterLeaf { eax: 0x1F, ebx: 0, ecx: 0 },
            GetsecParameterLeaf { eax: 0x0010_0002, ebx: 0, ecx: 0 },
        ]);
        let p = query_parameters(&mut sim).unwrap();
        assert_eq!(p.acm_max_size, DEFAULT_ACM_MAX_SIZE);
        assert_eq!(sim.events().len(), 1);
    }

    #[test]
    fn walk_is_bounded() {
        let versions = [GetsecParameterLeaf { eax: 1, ebx: 0xFF, ecx: 1 }; 16];
        let mut sim = smx_enabled(&versions);
        let p = query_parameters(&mut sim).unwrap();
        assert_eq!(p.acm_versions().len(), MAX_SUPPORTED_ACM_VERSIONS);
        assert_eq!(sim.events().len(), MAX_PARAMETER_QUERIES as usize);
    }
}
