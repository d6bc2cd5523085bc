use proptest::prelude::*;
use warden_flags::{FeatureFlagRegistry, FLAG_CATALOG};

#[derive(Debug, Clone)]
enum Op {
    Set(usize, bool),
    Kill(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    let n = FLAG_CATALOG.len();
    prop_oneof![
        (0..n, any::<bool>()).prop_map(|(i, b)| Op::Set(i, b)),
        (0..n).prop_map(Op::Kill),
    ]
}

proptest! {
    #[test]
    fn safe_mode_round_trip_restores_every_flag(ops in proptest::collection::vec(arb_op(), 0..20)) {
        let registry = FeatureFlagRegistry::with_defaults();
        for op in &ops {
            match op {
                Op::Set(i, b) => registry.set_flag(FLAG_CATALOG[*i].name, *b).unwrap(),
                Op::Kill(i) => registry.kill_feature(FLAG_CATALOG[*i].name).unwrap(),
            }
        }
        let before: Vec<bool> = FLAG_CATALOG.iter().map(|e| registry.is_enabled(e.name)).collect();

        registry.set_safe_mode(true);
        for entry in FLAG_CATALOG {
            if entry.tier == warden_core::models::FlagTier::Advanced {
                prop_assert!(!registry.is_enabled(entry.name));
            }
        }
        registry.set_safe_mode(false);

        let after: Vec<bool> = FLAG_CATALOG.iter().map(|e| registry.is_enabled(e.name)).collect();
        prop_assert_eq!(before, after);
    }
}
