#![allow(dead_code)]

use log::{LevelFilter, Log, Metadata, Record};
use slexec::cmdline::LaunchConfig;
use slexec::error::SlError;
use slexec::loader::LoaderContext;
use slexec::mtrr::MtrrSnapshot;
use slexec::services::{
    AcmVerifier, LoaderOps, Logging, PhysModule, SinitModule, SkinitChipset, SklModule, Tpm,
    TxtChipset,
};
use slexec::sim::SimPlatform;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Once;

pub const MB2_INFO_ADDR: usize = 0x0009_0000;
pub const SINIT: SinitModule = PhysModule {
    base: 0x1000_0000,
    size: 0x8000,
};
pub const SKL: SklModule = PhysModule {
    base: 0x0200_0000,
    size: 0x1_0000,
};
pub const SKL_RELOCATED: SklModule = PhysModule {
    base: 0x0010_0000,
    size: 0x1_0000,
};

/// Collaborators with scripted answers and call counters.
pub struct FakeServices {
    pub cmdline: Vec<u8>,
    pub memory_map_ok: bool,
    pub modules_ok: bool,
    pub sinit: Option<SinitModule>,
    pub skl: Option<SklModule>,
    pub intermediate_loader_ok: bool,
    pub tpm_present: bool,
    pub tpm_ready: bool,
    pub acm_valid: bool,
    pub svn_ok: bool,
    pub txt_regs: HashMap<u32, u64>,
    pub platform_result: Result<(), SlError>,
    pub heap_result: Result<(), SlError>,
    pub bootloader_data_ok: bool,

    pub find_sinit_calls: usize,
    pub find_skl_calls: usize,
    pub verify_calls: Cell<usize>,
    pub config_reg_reads: Cell<usize>,
    pub verify_platform_calls: usize,
    pub saved_mtrrs: Option<MtrrSnapshot>,
    pub logging_config: Option<LaunchConfig>,
}

impl Default for FakeServices {
    fn default() -> Self {
        Self {
            cmdline: Vec::new(),
            memory_map_ok: true,
            modules_ok: true,
            sinit: Some(SINIT),
            skl: Some(SKL),
            intermediate_loader_ok: true,
            tpm_present: true,
            tpm_ready: true,
            acm_valid: true,
            svn_ok: true,
            txt_regs: HashMap::new(),
            platform_result: Ok(()),
            heap_result: Ok(()),
            bootloader_data_ok: true,
            find_sinit_calls: 0,
            find_skl_calls: 0,
            verify_calls: Cell::new(0),
            config_reg_reads: Cell::new(0),
            verify_platform_calls: 0,
            saved_mtrrs: None,
            logging_config: None,
        }
    }
}

impl FakeServices {
    pub fn with_cmdline(cmdline: &str) -> Self {
        Self {
            cmdline: cmdline.as_bytes().to_vec(),
            ..Self::default()
        }
    }
}

impl LoaderOps for FakeServices {
    fn cmdline(&self, _ctx: &LoaderContext) -> Option<&[u8]> {
        Some(&self.cmdline)
    }

    fn copy_memory_map(&mut self, _ctx: &LoaderContext) -> bool {
        self.memory_map_ok
    }

    fn verify_modules(&self, _ctx: &LoaderContext) -> bool {
        self.modules_ok
    }

    fn find_sinit(&mut self, _ctx: &LoaderContext) -> Option<SinitModule> {
        self.find_sinit_calls += 1;
        self.sinit
    }

    fn find_skl(&mut self, _ctx: &LoaderContext) -> Option<SklModule> {
        self.find_skl_calls += 1;
        self.skl
    }

    fn prepare_intermediate_loader(&mut self, _ctx: &LoaderContext) -> bool {
        self.intermediate_loader_ok
    }
}

impl Tpm for FakeServices {
    fn detect(&mut self) -> bool {
        self.tpm_present
    }

    fn prepare(&mut self) -> bool {
        self.tpm_ready
    }
}

impl AcmVerifier for FakeServices {
    fn verify(&self, _sinit: &SinitModule) -> bool {
        self.verify_calls.set(self.verify_calls.get() + 1);
        self.acm_valid
    }

    fn svn_status_ok(&self, _sinit: &SinitModule) -> bool {
        self.svn_ok
    }
}

impl TxtChipset for FakeServices {
    fn copy_sinit(&mut self, found: Option<SinitModule>) -> Option<SinitModule> {
        found
    }

    fn read_config_reg(&self, offset: u32) -> u64 {
        self.config_reg_reads.set(self.config_reg_reads.get() + 1);
        self.txt_regs.get(&offset).copied().unwrap_or(0)
    }

    fn verify_platform(&mut self) -> Result<(), SlError> {
        self.verify_platform_calls += 1;
        self.platform_result
    }

    fn prepare_launch(
        &mut self,
        _ctx: &LoaderContext,
        _sinit: &SinitModule,
        saved_mtrrs: &MtrrSnapshot,
    ) -> Result<(), SlError> {
        self.saved_mtrrs = Some(*saved_mtrrs);
        self.heap_result
    }
}

impl SkinitChipset for FakeServices {
    fn relocate_skl(&mut self, skl: SklModule) -> SklModule {
        SklModule {
            base: SKL_RELOCATED.base,
            size: skl.size,
        }
    }

    fn prepare_bootloader_data(&mut self, _skl: &SklModule, _ctx: &LoaderContext) -> bool {
        self.bootloader_data_ok
    }
}

impl Logging for FakeServices {
    fn init_logging(&mut self, config: &LaunchConfig) {
        self.logging_config = Some(*config);
    }
}

/// Collects formatted records per test thread.
struct CaptureLogger;

thread_local! {
    static RECORDS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!("[{}] {}", record.level(), record.args());
        RECORDS.with(|r| r.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

pub fn install_logger() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in tests");
        log::set_max_level(LevelFilter::Trace);
    });
}

pub fn take_records() -> Vec<String> {
    RECORDS.with(|r| r.borrow_mut().drain(..).collect())
}

pub fn record_count() -> usize {
    RECORDS.with(|r| r.borrow().len())
}

/// Run the launch until the simulated processor stops it and return the
/// panic message it stopped with.
pub fn launch(sim: &mut SimPlatform, services: &mut FakeServices, magic: u32) -> String {
    install_logger();
    let result = catch_unwind(AssertUnwindSafe(|| {
        slexec::begin_launch(sim, services, MB2_INFO_ADDR, magic)
    }));
    let Err(payload) = result else {
        unreachable!("begin_launch returned");
    };
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .expect("panic payload is a message")
}
