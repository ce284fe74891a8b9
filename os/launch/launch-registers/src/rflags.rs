use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// RFLAGS / EFLAGS.
///
/// Unlike a long-mode kernel, the launcher may be entered from a loader that
/// left the CPU in virtual-8086 mode, so `VM` is a regular read/write field
/// here. The reserved bits are modeled as plain fields to keep raw values
/// intact across a read-modify-write.
#[bitfield(u64, order = Lsb)]
#[derive(PartialEq, Eq)]
pub struct Rflags {
    /// Bit 0 — CF: Carry Flag.
    pub cf_carry: bool,

    /// Bit 1 — Reserved, reads as 1.
    #[bits(default = true)]
    pub reserved_1: bool,

    /// Bit 2 — PF: Parity Flag.
    pub pf_parity: bool,

    /// Bit 3 — Reserved.
    pub reserved_3: bool,

    /// Bit 4 — AF: Adjust Flag.
    pub af_adjust: bool,

    /// Bit 5 — Reserved.
    pub reserved_5: bool,

    /// Bit 6 — ZF: Zero Flag.
    pub zf_zero: bool,

    /// Bit 7 — SF: Sign Flag.
    pub sf_sign: bool,

    /// Bit 8 — TF: Trap Flag.
    pub tf_trap: bool,

    /// Bit 9 — IF: Interrupt Enable Flag.
    pub if_interrupt_enable: bool,

    /// Bit 10 — DF: Direction Flag.
    pub df_direction: bool,

    /// Bit 11 — OF: Overflow Flag.
    pub of_overflow: bool,

    /// Bits 12–13 — IOPL.
    #[bits(2)]
    pub iopl: u8,

    /// Bit 14 — NT: Nested Task.
    pub nt_nested: bool,

    /// Bit 15 — Reserved.
    pub reserved_15: bool,

    /// Bit 16 — RF: Resume Flag.
    pub rf_resume: bool,

    /// Bit 17 — VM: Virtual-8086 Mode.
    pub vm_virtual_8086: bool,

    /// Bit 18 — AC: Alignment Check.
    pub ac_alignment_check: bool,

    /// Bit 19 — VIF.
    pub vif_virtual_interrupt: bool,

    /// Bit 20 — VIP.
    pub vip_virtual_interrupt_pending: bool,

    /// Bit 21 — ID: software can toggle this bit iff `CPUID` exists.
    pub id_cpuid: bool,

    /// Bits 22–63 — Reserved.
    #[bits(42)]
    pub reserved_22_63: u64,
}

impl Rflags {
    /// Mask of the `ID` flag (bit 21).
    pub const ID_MASK: u64 = 1 << 21;
}

#[cfg(feature = "asm")]
impl LoadRegisterUnsafe for Rflags {
    unsafe fn load_unsafe() -> Self {
        let flags: u64;
        unsafe {
            core::arch::asm!("pushfq", "pop {}", out(reg) flags, options(nomem, preserves_flags));
        }
        Self::from_bits(flags)
    }
}

#[cfg(feature = "asm")]
impl StoreRegisterUnsafe for Rflags {
    unsafe fn store_unsafe(self) {
        let flags = self.into_bits();
        unsafe {
            core::arch::asm!("push {}", "popfq", in(reg) flags, options(nomem));
        }
    }
}
