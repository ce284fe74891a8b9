//! # Simulated platform
//!
//! [`SimPlatform`] implements [`Platform`] over fixed-size tables so the
//! launch logic can run on a development host. Every side effect (register
//! and MSR writes, cache flushes, port writes, `GETSEC` leaves) is appended
//! to an event log that tests inspect afterwards.
//!
//! The no-return operations panic with one of the `*_PANIC` messages; tests
//! catch the unwind and then look at the event log.

use crate::arch::VendorId;
use crate::platform::{CpuidResult, GetsecParameterLeaf, Platform};
use launch_registers::msr::{Ia32ApicBase, Ia32FeatureControl, McgCap, MtrrCap, MtrrDefType, Msr, VmCr};
use launch_registers::{Cr0, Cr4, Efer, Rflags};

pub const SENTER_PANIC: &str = "simulated GETSEC[SENTER]";
pub const SKINIT_PANIC: &str = "simulated SKINIT";
pub const HALT_PANIC: &str = "simulated HLT";

const MAX_CPUID: usize = 16;
const MAX_MSRS: usize = 128;
const MAX_EVENTS: usize = 512;
const MAX_PARAMETER_LEAVES: usize = 16;

/// One observable side effect on the simulated processor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SimEvent {
    WriteCr0(u64),
    WriteCr4(u64),
    WriteRflags(u64),
    DisableInterrupts,
    Wrmsr { msr: u32, value: u64 },
    Wbinvd,
    GetsecCapabilities(u32),
    GetsecParameters(u32),
    Senter { base: u32, size: u32 },
    Skinit(u32),
    Outb { port: u16, value: u8 },
    Halt,
}

#[derive(Debug, Copy, Clone)]
struct CpuidEntry {
    leaf: u32,
    subleaf: u32,
    result: CpuidResult,
}

/// A processor described by tables instead of silicon.
#[derive(Debug, Clone)]
pub struct SimPlatform {
    /// Whether `RFLAGS.ID` toggles.
    pub cpuid_supported: bool,
    pub cr0: Cr0,
    pub cr4: Cr4,
    pub rflags: Rflags,
    /// Raw `EAX` of `GETSEC[CAPABILITIES]`.
    pub getsec_caps: u32,
    cpuid: [CpuidEntry; MAX_CPUID],
    cpuid_len: usize,
    msrs: [(u32, u64); MAX_MSRS],
    msr_len: usize,
    parameters: [GetsecParameterLeaf; MAX_PARAMETER_LEAVES],
    parameters_len: usize,
    events: [SimEvent; MAX_EVENTS],
    event_len: usize,
    dropped_events: usize,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    /// A blank processor: `CPUID` available but every leaf zero, all
    /// registers zero except the fixed `RFLAGS` bit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cpuid_supported: true,
            cr0: Cr0::new(),
            cr4: Cr4::new(),
            rflags: Rflags::new(),
            getsec_caps: 0,
            cpuid: [CpuidEntry {
                leaf: 0,
                subleaf: 0,
                result: CpuidResult {
                    eax: 0,
                    ebx: 0,
                    ecx: 0,
                    edx: 0,
                },
            }; MAX_CPUID],
            cpuid_len: 0,
            msrs: [(0, 0); MAX_MSRS],
            msr_len: 0,
            parameters: [GetsecParameterLeaf {
                eax: 0,
                ebx: 0,
                ecx: 0,
            }; MAX_PARAMETER_LEAVES],
            parameters_len: 0,
            events: [SimEvent::Halt; MAX_EVENTS],
            event_len: 0,
            dropped_events: 0,
        }
    }

    /// A TXT-capable Intel machine in a state that passes every check:
    /// protected mode with paging, BSP, SMX locked and enabled, ten variable
    /// MTRRs, ten clean machine-check banks.
    #[must_use]
    pub fn intel() -> Self {
        let mut sim = Self::new();
        sim.set_cpuid(0, 0, vendor_leaf(0x16, VendorId::INTEL));
        sim.set_cpuid(
            1,
            0,
            CpuidResult {
                eax: 0x0009_06EA,
                ebx: 0x0010_0800,
                ecx: CPUID1_ECX_SMX,
                edx: 0xBFEB_FBFF,
            },
        );
        sim.set_cpuid(0x8000_0000, 0, CpuidResult { eax: 0x8000_0008, ..CpuidResult::default() });
        sim.set_cpuid(0x8000_0008, 0, CpuidResult { eax: 0x3027, ..CpuidResult::default() });

        sim.set_common_registers();
        sim.set_msr(
            Ia32FeatureControl::MSR,
            Ia32FeatureControl::new()
                .with_lock(true)
                .with_vmx_outside_smx(true)
                .with_senter_local_functions(0x7F)
                .with_senter_global_enable(true)
                .into_bits(),
        );
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(10).with_fix(true).with_wc(true).into_bits());
        // 0-2 GiB and 2-3 GiB write-back at 39 physical address bits
        sim.set_msr(Msr::mtrr_physbase(0), 0x0000_0006);
        sim.set_msr(Msr::mtrr_physmask(0), 0x7F_8000_0800);
        sim.set_msr(Msr::mtrr_physbase(1), 0x8000_0006);
        sim.set_msr(Msr::mtrr_physmask(1), 0x7F_C000_0800);
        sim.set_msr(McgCap::MSR, McgCap::new().with_count(10).into_bits());

        // chipset, ENTERACCS, EXITAC, SENTER, SEXIT, PARAMETERS, SMCTRL, WAKEUP
        sim.getsec_caps = 0x1FD;
        sim.set_getsec_parameters(&[
            GetsecParameterLeaf { eax: 1, ebx: 0xFFFF_FFFF, ecx: 0 },
            GetsecParameterLeaf { eax: 0x0004_0000 | 2, ebx: 0, ecx: 0 },
            GetsecParameterLeaf { eax: 0x4100 | 3, ebx: 0, ecx: 0 },
            GetsecParameterLeaf { eax: 0x20 | 5, ebx: 0, ecx: 0 },
        ]);
        sim
    }

    /// An SKINIT-capable AMD machine that passes every check.
    #[must_use]
    pub fn amd() -> Self {
        let mut sim = Self::new();
        sim.set_cpuid(0, 0, vendor_leaf(0x10, VendorId::AMD));
        sim.set_cpuid(1, 0, CpuidResult { eax: 0x00A2_0F10, ebx: 0x0010_0800, ..CpuidResult::default() });
        sim.set_cpuid(0x8000_0000, 0, CpuidResult { eax: 0x8000_0008, ..CpuidResult::default() });
        sim.set_cpuid(
            0x8000_0001,
            0,
            CpuidResult {
                ecx: CPUID_EXT_ECX_SVM | CPUID_EXT_ECX_SKINIT,
                ..CpuidResult::default()
            },
        );
        sim.set_cpuid(0x8000_0008, 0, CpuidResult { eax: 0x3030, ..CpuidResult::default() });

        sim.set_common_registers();
        sim.set_msr(VmCr::MSR, 0);
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(8).with_fix(true).with_wc(true).into_bits());
        sim.set_msr(Msr::mtrr_physbase(0), 0x0000_0006);
        sim.set_msr(Msr::mtrr_physmask(0), 0xFFFF_8000_0800);
        sim.set_msr(McgCap::MSR, McgCap::new().with_count(6).into_bits());
        sim
    }

    fn set_common_registers(&mut self) {
        self.cr0 = Cr0::new()
            .with_pe_protection_enable(true)
            .with_mp_monitor_coprocessor(true)
            .with_et_extension_type(true)
            .with_ne_numeric_error(true)
            .with_wp_write_protect(true)
            .with_pg_paging(true);
        self.cr4 = Cr4::new().with_pae(true).with_pge(true).with_osfxsr(true).with_osxmmexcpt(true);
        self.rflags = Rflags::new();

        self.set_msr(
            Ia32ApicBase::MSR,
            Ia32ApicBase::new().with_bsp(true).with_enable(true).with_base_page(0xFEE00).into_bits(),
        );
        self.set_msr(
            Efer::MSR,
            Efer::new().with_sce(true).with_lme(true).with_lma(true).with_nxe(true).into_bits(),
        );
        self.set_msr(
            MtrrDefType::MSR,
            MtrrDefType::new()
                .with_mem_type(0)
                .with_fixed_enable(true)
                .with_enable(true)
                .into_bits(),
        );
    }

    /// Add or replace one `CPUID` leaf.
    ///
    /// # Panics
    /// The leaf table is full.
    pub fn set_cpuid(&mut self, leaf: u32, subleaf: u32, result: CpuidResult) {
        if let Some(entry) = self.cpuid[..self.cpuid_len]
            .iter_mut()
            .find(|e| e.leaf == leaf && e.subleaf == subleaf)
        {
            entry.result = result;
            return;
        }
        assert!(self.cpuid_len < MAX_CPUID, "simulated CPUID table full");
        self.cpuid[self.cpuid_len] = CpuidEntry { leaf, subleaf, result };
        self.cpuid_len += 1;
    }

    /// Set an MSR without recording an event.
    ///
    /// # Panics
    /// The MSR table is full.
    pub fn set_msr(&mut self, msr: Msr, value: u64) {
        if let Some(slot) = self.msrs[..self.msr_len].iter_mut().find(|(m, _)| *m == msr.raw()) {
            slot.1 = value;
            return;
        }
        assert!(self.msr_len < MAX_MSRS, "simulated MSR table full");
        self.msrs[self.msr_len] = (msr.raw(), value);
        self.msr_len += 1;
    }

    /// Current MSR value; never-written MSRs read as zero.
    #[must_use]
    pub fn msr(&self, msr: Msr) -> u64 {
        self.msrs[..self.msr_len]
            .iter()
            .find(|(m, _)| *m == msr.raw())
            .map_or(0, |(_, v)| *v)
    }

    /// Replace the `GETSEC[PARAMETERS]` answers. Indices past the end read
    /// as type 0 (end of list). At most 16 leaves are kept.
    pub fn set_getsec_parameters(&mut self, leaves: &[GetsecParameterLeaf]) {
        let n = leaves.len().min(MAX_PARAMETER_LEAVES);
        self.parameters[..n].copy_from_slice(&leaves[..n]);
        self.parameters_len = n;
    }

    /// Side effects recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> &[SimEvent] {
        &self.events[..self.event_len]
    }

    /// Number of events that did not fit into the log.
    #[must_use]
    pub const fn dropped_events(&self) -> usize {
        self.dropped_events
    }

    pub fn clear_events(&mut self) {
        self.event_len = 0;
        self.dropped_events = 0;
    }

    #[must_use]
    pub fn has_event(&self, pred: impl Fn(&SimEvent) -> bool) -> bool {
        self.events().iter().any(pred)
    }

    fn record(&mut self, event: SimEvent) {
        if self.event_len < MAX_EVENTS {
            self.events[self.event_len] = event;
            self.event_len += 1;
        } else {
            self.dropped_events += 1;
        }
    }

    fn require_smxe(&self, leaf: &str) {
        // GETSEC raises #UD with CR4.SMXE clear.
        assert!(self.cr4.smxe(), "GETSEC[{leaf}] with CR4.SMXE clear");
    }
}

impl Platform for SimPlatform {
    fn cpuid_available(&mut self) -> bool {
        self.cpuid_supported
    }

    fn cpuid(&mut self, leaf: u32, subleaf: u32) -> CpuidResult {
        self.cpuid[..self.cpuid_len]
            .iter()
            .find(|e| e.leaf == leaf && e.subleaf == subleaf)
            .map_or_else(CpuidResult::default, |e| e.result)
    }

    fn read_cr0(&mut self) -> Cr0 {
        self.cr0
    }

    fn write_cr0(&mut self, value: Cr0) {
        self.record(SimEvent::WriteCr0(value.into_bits()));
        self.cr0 = value;
    }

    fn read_cr4(&mut self) -> Cr4 {
        self.cr4
    }

    fn write_cr4(&mut self, value: Cr4) {
        self.record(SimEvent::WriteCr4(value.into_bits()));
        self.cr4 = value;
    }

    fn read_rflags(&mut self) -> Rflags {
        self.rflags
    }

    fn write_rflags(&mut self, value: Rflags) {
        self.record(SimEvent::WriteRflags(value.into_bits()));
        self.rflags = value;
    }

    fn disable_interrupts(&mut self) {
        self.record(SimEvent::DisableInterrupts);
        self.rflags = self.rflags.with_if_interrupt_enable(false);
    }

    fn rdmsr(&mut self, msr: Msr) -> u64 {
        self.msr(msr)
    }

    fn wrmsr(&mut self, msr: Msr, value: u64) {
        self.record(SimEvent::Wrmsr { msr: msr.raw(), value });
        self.set_msr(msr, value);
    }

    fn wbinvd(&mut self) {
        self.record(SimEvent::Wbinvd);
    }

    fn getsec_capabilities(&mut self, index: u32) -> u32 {
        self.require_smxe("CAPABILITIES");
        self.record(SimEvent::GetsecCapabilities(index));
        if index == 0 { self.getsec_caps } else { 0 }
    }

    fn getsec_parameters(&mut self, index: u32) -> GetsecParameterLeaf {
        self.require_smxe("PARAMETERS");
        self.record(SimEvent::GetsecParameters(index));
        self.parameters[..self.parameters_len]
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    fn getsec_senter(&mut self, sinit_base: u32, sinit_size: u32) -> ! {
        self.require_smxe("SENTER");
        self.record(SimEvent::Senter {
            base: sinit_base,
            size: sinit_size,
        });
        panic!("{SENTER_PANIC}");
    }

    fn skinit(&mut self, slb: u32) -> ! {
        self.record(SimEvent::Skinit(slb));
        panic!("{SKINIT_PANIC}");
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.record(SimEvent::Outb { port, value });
    }

    fn halt(&mut self) -> ! {
        self.record(SimEvent::Halt);
        panic!("{HALT_PANIC}");
    }
}

const CPUID1_ECX_SMX: u32 = 1 << 6;
const CPUID_EXT_ECX_SVM: u32 = 1 << 2;
const CPUID_EXT_ECX_SKINIT: u32 = 1 << 12;

const fn vendor_leaf(max_leaf: u32, vendor: VendorId) -> CpuidResult {
    CpuidResult {
        eax: max_leaf,
        ebx: vendor.ebx,
        ecx: vendor.ecx,
        edx: vendor.edx,
    }
}
