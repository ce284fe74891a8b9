//! # Variable MTRR bracket for the SINIT module
//!
//! `GETSEC[SENTER]` requires the authenticated code module to be mapped
//! with a single cacheable memory type and everything else uncacheable.
//! This module captures the current MTRR state, installs the module
//! mapping and restores a captured state.
//!
//! ## Reprogramming sequence
//!
//! [`configure_for_module`] follows the SDM procedure for changing MTRRs:
//!
//! 1. save `RFLAGS`, disable interrupts
//! 2. `CR0.CD = 1`, `CR0.NW = 0`, `WBINVD`
//! 3. `CR4.PGE = 0`
//! 4. `IA32_MTRR_DEF_TYPE.E = 0`
//! 5. default type UC, fixed ranges off, every variable pair invalid
//! 6. program the module ranges
//! 7. `WBINVD`, `IA32_MTRR_DEF_TYPE.E = 1`
//! 8. restore `CR0`, `CR4` and `RFLAGS`
//!
//! The ranges are planned before step 1. A footprint that needs more pairs
//! than the processor has is rejected without touching any register, and so
//! is a processor with more pairs than a [`MtrrSnapshot`] can hold.
//!
//! ## Ranges
//!
//! A variable range covers `2^k` pages and its base must be a multiple of
//! its size. The footprint is split greedily from its base upwards, each
//! range as large as both the remaining length and the alignment of the
//! current base allow.

use crate::error::MtrrError;
use crate::platform::Platform;
use launch_registers::msr::{MemoryType, Msr, MtrrCap, MtrrDefType, MtrrPhysBase, MtrrPhysMask};
use log::{debug, error};

/// Pairs kept in a [`MtrrSnapshot`]. Current parts implement ten or fewer.
pub const MAX_VARIABLE_MTRRS: usize = MAX_VCNT as usize;

const MAX_VCNT: u8 = 32;

const PAGE_SHIFT: u32 = 12;
const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Used when `CPUID.80000008h` is not implemented.
const DEFAULT_MAX_PHYS_ADDR: u32 = 36;

/// One `IA32_MTRR_PHYSBASEn`/`IA32_MTRR_PHYSMASKn` pair.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct VarMtrrPair {
    pub base: MtrrPhysBase,
    pub mask: MtrrPhysMask,
}

/// Default type register plus the implemented variable pairs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MtrrSnapshot {
    pub def_type: MtrrDefType,
    num_var: usize,
    pairs: [VarMtrrPair; MAX_VARIABLE_MTRRS],
}

impl MtrrSnapshot {
    /// Build a snapshot from explicit values; pairs beyond
    /// [`MAX_VARIABLE_MTRRS`] are dropped.
    #[must_use]
    pub fn new(def_type: MtrrDefType, pairs: &[VarMtrrPair]) -> Self {
        let num_var = pairs.len().min(MAX_VARIABLE_MTRRS);
        let mut all = [VarMtrrPair::default(); MAX_VARIABLE_MTRRS];
        all[..num_var].copy_from_slice(&pairs[..num_var]);
        Self {
            def_type,
            num_var,
            pairs: all,
        }
    }

    #[must_use]
    pub fn pairs(&self) -> &[VarMtrrPair] {
        &self.pairs[..self.num_var]
    }

    #[must_use]
    pub const fn num_var(&self) -> usize {
        self.num_var
    }
}

/// Physical footprint of a module and the type it must be mapped with.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModuleFootprint {
    pub base: u64,
    pub size: u64,
    pub mem_type: MemoryType,
}

/// `pages` pages starting at page `base_page`; `pages` is a power of two
/// and divides `base_page`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MtrrRange {
    pub base_page: u64,
    pub pages: u64,
}

/// The variable ranges that map a [`ModuleFootprint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtrrPlan {
    ranges: [MtrrRange; MAX_VARIABLE_MTRRS],
    len: usize,
}

impl MtrrPlan {
    /// Split `footprint` into at most `available` ranges.
    ///
    /// # Errors
    /// The base is not page aligned, the footprint is empty, or more than
    /// `available` ranges would be needed.
    pub fn compute(footprint: &ModuleFootprint, available: usize) -> Result<Self, MtrrError> {
        if !footprint.base.is_multiple_of(PAGE_SIZE) {
            return Err(MtrrError::Unaligned(footprint.base));
        }
        if footprint.size == 0 {
            return Err(MtrrError::Empty);
        }

        let available = available.min(MAX_VARIABLE_MTRRS);
        let mut plan = Self {
            ranges: [MtrrRange::default(); MAX_VARIABLE_MTRRS],
            len: 0,
        };

        let mut page = footprint.base >> PAGE_SHIFT;
        let mut remaining = footprint.size.div_ceil(PAGE_SIZE);
        while remaining > 0 {
            let largest = 1u64 << (u64::BITS - 1 - remaining.leading_zeros());
            // Page 0 is aligned to every size.
            let pages = if page == 0 {
                largest
            } else {
                largest.min(1u64 << page.trailing_zeros())
            };

            if plan.len == available {
                return Err(MtrrError::TooManyRanges { available });
            }
            plan.ranges[plan.len] = MtrrRange {
                base_page: page,
                pages,
            };
            plan.len += 1;

            page += pages;
            remaining -= pages;
        }
        Ok(plan)
    }

    #[must_use]
    pub fn ranges(&self) -> &[MtrrRange] {
        &self.ranges[..self.len]
    }
}

/// Implemented variable pairs.
///
/// # Errors
/// [`MtrrError::TooManyVariableMtrrs`] if `IA32_MTRRCAP.VCNT` exceeds
/// [`MAX_VARIABLE_MTRRS`]; pairs beyond the limit could be neither saved nor
/// invalidated.
pub fn variable_count<P: Platform>(platform: &mut P) -> Result<u8, MtrrError> {
    let vcnt = MtrrCap::from_bits(platform.rdmsr(MtrrCap::MSR)).vcnt();
    if vcnt > MAX_VCNT {
        error!("{vcnt} variable MTRRs, at most {MAX_VARIABLE_MTRRS} are supported");
        return Err(MtrrError::TooManyVariableMtrrs { vcnt });
    }
    Ok(vcnt)
}

/// `MAXPHYADDR` in bits.
pub fn max_phys_addr<P: Platform>(platform: &mut P) -> u32 {
    if platform.cpuid(0x8000_0000, 0).eax >= 0x8000_0008 {
        let bits = platform.cpuid(0x8000_0008, 0).eax & 0xFF;
        if bits > PAGE_SHIFT {
            return bits.min(52 + PAGE_SHIFT);
        }
    }
    DEFAULT_MAX_PHYS_ADDR
}

const fn phys_page_mask(max_phys_addr: u32) -> u64 {
    (1u64 << (max_phys_addr - PAGE_SHIFT)) - 1
}

/// Read the default type and every implemented variable pair.
///
/// # Errors
/// The processor implements more pairs than a snapshot holds.
pub fn save<P: Platform>(platform: &mut P) -> Result<MtrrSnapshot, MtrrError> {
    let num_var = variable_count(platform)?;
    let mut snapshot = MtrrSnapshot {
        def_type: MtrrDefType::from_bits(platform.rdmsr(MtrrDefType::MSR)),
        num_var: usize::from(num_var),
        pairs: [VarMtrrPair::default(); MAX_VARIABLE_MTRRS],
    };
    for n in 0..num_var {
        snapshot.pairs[usize::from(n)] = VarMtrrPair {
            base: MtrrPhysBase::from_bits(platform.rdmsr(Msr::mtrr_physbase(u32::from(n)))),
            mask: MtrrPhysMask::from_bits(platform.rdmsr(Msr::mtrr_physmask(u32::from(n)))),
        };
    }
    Ok(snapshot)
}

/// Write a snapshot back: MTRRs off, every pair, then the default type
/// register (which carries the saved enable bits).
pub fn restore<P: Platform>(platform: &mut P, snapshot: &MtrrSnapshot) {
    enable(platform, false);
    for (n, pair) in (0u32..).zip(snapshot.pairs()) {
        platform.wrmsr(Msr::mtrr_physmask(n), pair.mask.into_bits());
        platform.wrmsr(Msr::mtrr_physbase(n), pair.base.into_bits());
    }
    platform.wrmsr(MtrrDefType::MSR, snapshot.def_type.into_bits());
}

/// Set or clear `IA32_MTRR_DEF_TYPE.E` with a single `WRMSR`, leaving the
/// ranges alone.
pub fn enable<P: Platform>(platform: &mut P, on: bool) {
    let def = MtrrDefType::from_bits(platform.rdmsr(MtrrDefType::MSR)).with_enable(on);
    platform.wrmsr(MtrrDefType::MSR, def.into_bits());
}

/// Map `footprint` with its memory type and everything else UC.
///
/// Pairs the plan does not use are invalidated; their base and mask bits
/// are kept. Take a [`save`] first to be able to undo this.
///
/// # Errors
/// The footprint cannot be planned within the implemented pairs, or the
/// processor implements more pairs than are supported. Nothing has been
/// written in either case.
pub fn configure_for_module<P: Platform>(
    platform: &mut P,
    footprint: &ModuleFootprint,
) -> Result<(), MtrrError> {
    let vcnt = variable_count(platform)?;
    let plan = MtrrPlan::compute(footprint, usize::from(vcnt))?;
    let page_mask = phys_page_mask(max_phys_addr(platform));

    debug!(
        "mapping {:#x}+{:#x} as {} with {} of {vcnt} variable MTRRs",
        footprint.base,
        footprint.size,
        footprint.mem_type.as_str(),
        plan.ranges().len()
    );

    let rflags = platform.read_rflags();
    platform.disable_interrupts();

    let cr0 = platform.read_cr0();
    platform.write_cr0(cr0.with_cache_no_fill());
    platform.wbinvd();

    let cr4 = platform.read_cr4();
    platform.write_cr4(cr4.with_pge(false));

    enable(platform, false);

    let def = MtrrDefType::from_bits(platform.rdmsr(MtrrDefType::MSR))
        .with_fixed_enable(false)
        .with_default_type(MemoryType::Uncacheable);
    platform.wrmsr(MtrrDefType::MSR, def.into_bits());

    for n in 0..u32::from(vcnt) {
        let mask = MtrrPhysMask::from_bits(platform.rdmsr(Msr::mtrr_physmask(n))).with_valid(false);
        platform.wrmsr(Msr::mtrr_physmask(n), mask.into_bits());
    }

    for (n, range) in (0u32..).zip(plan.ranges()) {
        let base = MtrrPhysBase::new()
            .with_base_page(range.base_page & page_mask)
            .with_range_type(footprint.mem_type);
        let mask = MtrrPhysMask::new()
            .with_mask_page(!(range.pages - 1) & page_mask)
            .with_valid(true);
        platform.wrmsr(Msr::mtrr_physbase(n), base.into_bits());
        platform.wrmsr(Msr::mtrr_physmask(n), mask.into_bits());
    }

    platform.wbinvd();
    enable(platform, true);

    platform.write_cr0(cr0);
    platform.write_cr4(cr4);
    platform.write_rflags(rflags);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimEvent, SimPlatform};

    fn footprint(base: u64, size: u64) -> ModuleFootprint {
        ModuleFootprint {
            base,
            size,
            mem_type: MemoryType::WriteBack,
        }
    }

    fn range(base_page: u64, pages: u64) -> MtrrRange {
        MtrrRange { base_page, pages }
    }

    #[test]
    fn aligned_power_of_two_is_one_range() {
        let plan = MtrrPlan::compute(&footprint(0x1000_0000, 0x4_0000), 8).unwrap();
        assert_eq!(plan.ranges(), &[range(0x1_0000, 0x40)]);
    }

    #[test]
    fn base_alignment_caps_range_size() {
        let plan = MtrrPlan::compute(&footprint(0x1000, 0x3000), 8).unwrap();
        assert_eq!(plan.ranges(), &[range(1, 1), range(2, 2)]);
    }

    #[test]
    fn zero_base_splits_by_length() {
        let plan = MtrrPlan::compute(&footprint(0, 5 * PAGE_SIZE), 8).unwrap();
        assert_eq!(plan.ranges(), &[range(0, 4), range(4, 1)]);
    }

    #[test]
    fn partial_pages_round_up() {
        let plan = MtrrPlan::compute(&footprint(0x20_0000, 0x1001), 8).unwrap();
        assert_eq!(plan.ranges(), &[range(0x200, 2)]);
    }

    #[test]
    fn exact_fit_succeeds() {
        assert!(MtrrPlan::compute(&footprint(0x1000, 0x3000), 2).is_ok());
        assert_eq!(
            MtrrPlan::compute(&footprint(0x1000, 0x3000), 1),
            Err(MtrrError::TooManyRanges { available: 1 })
        );
    }

    #[test]
    fn rejects_bad_footprints() {
        assert_eq!(
            MtrrPlan::compute(&footprint(0x1234, 0x1000), 8),
            Err(MtrrError::Unaligned(0x1234))
        );
        assert_eq!(MtrrPlan::compute(&footprint(0x1000, 0), 8), Err(MtrrError::Empty));
    }

    #[test]
    fn save_reads_implemented_pairs() {
        let mut sim = SimPlatform::intel();
        let snap = save(&mut sim).unwrap();
        assert_eq!(snap.num_var(), 10);
        assert_eq!(snap.pairs()[1].base.into_bits(), 0x8000_0006);
        assert_eq!(snap.pairs()[1].mask.into_bits(), 0x7F_C000_0800);
        assert!(snap.def_type.enable());
        assert!(sim.events().is_empty());
    }

    #[test]
    fn configure_follows_the_bracket() {
        let mut sim = SimPlatform::intel();
        let cr0 = sim.cr0;
        let cr4 = sim.cr4;
        let rflags = sim.rflags.with_if_interrupt_enable(true);
        sim.rflags = rflags;

        configure_for_module(&mut sim, &footprint(0x1000_0000, 0x4_0000)).unwrap();

        let events = sim.events();
        assert_eq!(events[0], SimEvent::DisableInterrupts);
        assert_eq!(events[1], SimEvent::WriteCr0(cr0.with_cache_no_fill().into_bits()));
        assert_eq!(events[2], SimEvent::Wbinvd);
        assert_eq!(events[3], SimEvent::WriteCr4(cr4.with_pge(false).into_bits()));

        let tail = &events[events.len() - 5..];
        assert_eq!(tail[0], SimEvent::Wbinvd);
        assert!(matches!(tail[1], SimEvent::Wrmsr { msr: 0x2FF, value } if value & (1 << 11) != 0));
        assert_eq!(tail[2], SimEvent::WriteCr0(cr0.into_bits()));
        assert_eq!(tail[3], SimEvent::WriteCr4(cr4.into_bits()));
        assert_eq!(tail[4], SimEvent::WriteRflags(rflags.into_bits()));

        // 39-bit MAXPHYADDR, 256 KiB write-back at 256 MiB
        assert_eq!(sim.msr(Msr::mtrr_physbase(0)), 0x1000_0006);
        assert_eq!(sim.msr(Msr::mtrr_physmask(0)), 0x7F_FFFC_0800);
        // the second firmware pair is invalidated but otherwise kept
        assert_eq!(sim.msr(Msr::mtrr_physbase(1)), 0x8000_0006);
        assert_eq!(sim.msr(Msr::mtrr_physmask(1)), 0x7F_C000_0000);

        let def = MtrrDefType::from_bits(sim.msr(MtrrDefType::MSR));
        assert!(def.enable());
        assert!(!def.fixed_enable());
        assert_eq!(def.mem_type(), MemoryType::Uncacheable.into_bits());
    }

    #[test]
    fn overflow_writes_nothing() {
        let mut sim = SimPlatform::intel();
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(1).into_bits());
        let before = save(&mut sim).unwrap();

        let result = configure_for_module(&mut sim, &footprint(0x1000, 0x3000));
        assert_eq!(result, Err(MtrrError::TooManyRanges { available: 1 }));
        assert!(sim.events().is_empty());
        assert_eq!(save(&mut sim), Ok(before));
    }

    #[test]
    fn more_pairs_than_supported_is_rejected() {
        let mut sim = SimPlatform::intel();
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(40).with_fix(true).into_bits());
        // a write-back range beyond the snapshot limit
        sim.set_msr(Msr::mtrr_physbase(35), 0x8000_0006);
        sim.set_msr(Msr::mtrr_physmask(35), 0x7F_C000_0800);

        let err = MtrrError::TooManyVariableMtrrs { vcnt: 40 };
        assert_eq!(variable_count(&mut sim), Err(err));
        assert_eq!(save(&mut sim).unwrap_err(), err);
        assert_eq!(
            configure_for_module(&mut sim, &footprint(0x1000_0000, 0x4_0000)),
            Err(err)
        );
        assert!(sim.events().is_empty());
        assert!(MtrrPhysMask::from_bits(sim.msr(Msr::mtrr_physmask(35))).valid());
    }

    #[test]
    fn largest_supported_count_is_saved_in_full() {
        let mut sim = SimPlatform::intel();
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(MAX_VCNT).into_bits());
        sim.set_msr(Msr::mtrr_physbase(31), 0xC000_0001);
        sim.set_msr(Msr::mtrr_physmask(31), 0x7F_F000_0800);

        let snap = save(&mut sim).unwrap();
        assert_eq!(snap.num_var(), MAX_VARIABLE_MTRRS);
        assert_eq!(snap.pairs()[31].base.into_bits(), 0xC000_0001);
        assert_eq!(snap.pairs()[31].mask.into_bits(), 0x7F_F000_0800);
    }

    #[test]
    fn enable_touches_only_the_e_bit() {
        let mut sim = SimPlatform::intel();
        enable(&mut sim, false);
        assert_eq!(sim.msr(MtrrDefType::MSR), 0x400);
        enable(&mut sim, true);
        assert_eq!(sim.msr(MtrrDefType::MSR), 0xC00);
    }

    #[test]
    fn max_phys_addr_fallback() {
        let mut sim = SimPlatform::new();
        assert_eq!(max_phys_addr(&mut sim), 36);
        assert_eq!(max_phys_addr(&mut SimPlatform::intel()), 39);
    }
}
