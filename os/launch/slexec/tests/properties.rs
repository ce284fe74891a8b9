mod support;

use launch_registers::msr::{MemoryType, MtrrCap, MtrrDefType, MtrrPhysBase, MtrrPhysMask};
use proptest::prelude::*;
use slexec::mtrr::{self, MAX_VARIABLE_MTRRS, ModuleFootprint, MtrrSnapshot, VarMtrrPair};
use slexec::sim::SimPlatform;
use slexec::{ShutdownAction, ShutdownPolicy};
use support::{install_logger, record_count};

fn arb_action() -> impl Strategy<Value = ShutdownAction> {
    prop_oneof![
        Just(ShutdownAction::Reboot),
        Just(ShutdownAction::Shutdown),
        Just(ShutdownAction::Halt),
    ]
}

fn arb_mem_type() -> impl Strategy<Value = MemoryType> {
    prop_oneof![
        Just(MemoryType::Uncacheable),
        Just(MemoryType::WriteCombining),
        Just(MemoryType::WriteThrough),
        Just(MemoryType::WriteProtected),
        Just(MemoryType::WriteBack),
    ]
}

/// A valid pair at 39 physical address bits.
fn arb_pair() -> impl Strategy<Value = VarMtrrPair> {
    (0u64..1 << 27, 0u64..1 << 27, arb_mem_type(), any::<bool>()).prop_map(|(base, mask, ty, valid)| {
        VarMtrrPair {
            base: MtrrPhysBase::new().with_base_page(base).with_range_type(ty),
            mask: MtrrPhysMask::new().with_mask_page(mask).with_valid(valid),
        }
    })
}

/// Variable count, how many pairs are populated (none, one or all) and the
/// pair values. No pairs and the most a snapshot holds are always in the mix.
fn arb_layout() -> impl Strategy<Value = (u8, usize, Vec<VarMtrrPair>)> {
    let max = u8::try_from(MAX_VARIABLE_MTRRS).unwrap();
    prop_oneof![Just(0), Just(max), 1..max].prop_flat_map(|vcnt| {
        let n = usize::from(vcnt);
        (
            Just(vcnt),
            prop_oneof![Just(0), Just(n.min(1)), Just(n)],
            proptest::collection::vec(arb_pair(), n),
        )
    })
}

fn arb_def_type() -> impl Strategy<Value = MtrrDefType> {
    (arb_mem_type(), any::<bool>(), any::<bool>()).prop_map(|(ty, fe, e)| {
        MtrrDefType::new().with_default_type(ty).with_fixed_enable(fe).with_enable(e)
    })
}

proptest! {
    #[test]
    fn error_action_on_success_has_no_side_effects(
        intel in any::<bool>(),
        action in arb_action(),
        power_cycle in any::<bool>(),
        cd in any::<bool>(),
        smxe in any::<bool>(),
    ) {
        install_logger();
        let mut sim = if intel { SimPlatform::intel() } else { SimPlatform::amd() };
        sim.cr0 = sim.cr0.with_cd_cache_disable(cd);
        sim.cr4 = sim.cr4.with_smxe(smxe);
        let before = sim.clone();
        let policy = ShutdownPolicy { action, power_cycle };

        let records = record_count();
        policy.error_action(&mut sim, Ok(()));

        prop_assert!(sim.events().is_empty());
        prop_assert_eq!(record_count(), records);
        prop_assert_eq!(sim.cr0, before.cr0);
        prop_assert_eq!(sim.cr4, before.cr4);
        prop_assert_eq!(sim.rflags, before.rflags);
    }

    #[test]
    fn restore_after_configure_is_bit_exact(
        (vcnt, populated, pairs) in arb_layout(),
        def_type in arb_def_type(),
        module_page in 0u64..0x10_0000,
        module_pages in 1u64..=64,
    ) {
        let mut sim = SimPlatform::intel();
        sim.set_msr(MtrrCap::MSR, MtrrCap::new().with_vcnt(vcnt).with_fix(true).into_bits());

        let mut installed = vec![VarMtrrPair::default(); usize::from(vcnt)];
        installed[..populated].copy_from_slice(&pairs[..populated]);
        mtrr::restore(&mut sim, &MtrrSnapshot::new(def_type, &installed));

        let before = mtrr::save(&mut sim).unwrap();
        prop_assert_eq!(before.pairs(), installed.as_slice());

        let footprint = ModuleFootprint {
            base: module_page << 12,
            size: module_pages << 12,
            mem_type: MemoryType::WriteBack,
        };
        // an unplannable footprint writes nothing, restore must cope either way
        let _ = mtrr::configure_for_module(&mut sim, &footprint);

        mtrr::restore(&mut sim, &before);
        prop_assert_eq!(mtrr::save(&mut sim), Ok(before));
    }
}
