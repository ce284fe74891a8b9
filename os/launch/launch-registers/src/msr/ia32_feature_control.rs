use crate::msr::Msr;
use bitfield_struct::bitfield;

/// `IA32_FEATURE_CONTROL` (MSR `0x3A`).
///
/// Firmware decides here whether `GETSEC[SENTER]` may ever execute. The
/// register must be locked, otherwise SMX is treated as unavailable.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Ia32FeatureControl {
    /// Bit 0 — Lock. Writes fault once set; cleared only by reset.
    pub lock: bool,

    /// Bit 1 — Enable VMX inside SMX operation.
    pub vmx_inside_smx: bool,

    /// Bit 2 — Enable VMX outside SMX operation.
    pub vmx_outside_smx: bool,

    /// Bits 3–7 — Reserved.
    #[bits(5)]
    pub reserved_3_7: u8,

    /// Bits 8–14 — SENTER local function enables.
    #[bits(7)]
    pub senter_local_functions: u8,

    /// Bit 15 — SENTER global enable.
    pub senter_global_enable: bool,

    /// Bits 16–63 — Other enables and reserved bits.
    #[bits(48)]
    pub reserved_16_63: u64,
}

impl Ia32FeatureControl {
    pub const MSR: Msr = Msr::new(0x3A);

    /// Locked with `GETSEC[SENTER]` globally enabled.
    #[inline]
    #[must_use]
    pub const fn senter_allowed(&self) -> bool {
        self.lock() && self.senter_global_enable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn senter_requires_lock_and_global_enable() {
        assert!(Ia32FeatureControl::from_bits(0xFF07).senter_allowed());
        assert!(!Ia32FeatureControl::from_bits(0xFF06).senter_allowed());
        assert!(!Ia32FeatureControl::from_bits(0x7F07).senter_allowed());
    }
}
