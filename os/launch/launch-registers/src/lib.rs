//! # Typed x86 registers for the pre-launch environment
//!
//! Every register the launcher inspects or rewrites is modeled here as a
//! fixed-width integer with one accessor per architectural field (via
//! [`bitfield_struct`]). Bit offsets and widths are part of the contract:
//! `from_bits`/`into_bits` always round-trip the raw value, including
//! reserved bits, so values read from hardware can be written back unchanged.
//!
//! The `asm` feature adds the privileged load/store implementations.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cr0;
pub mod cr4;
pub mod efer;
pub mod msr;
pub mod rflags;

pub use cr0::Cr0;
pub use cr4::Cr4;
pub use efer::Efer;
pub use rflags::Rflags;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require CPL 0.
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require CPL 0.
    unsafe fn store_unsafe(self);
}
