// tests/resolution_order.rs

mod common;
use crate::common::{drain, memory_deps};

use proptest::prelude::*;
use taskweave::deps::Deps;
use taskweave::types::ResolveStrategy;

// A group over `n` dependencies, resolved in an arbitrary order with
// arbitrary repeats, yields exactly one ready signal, and only after the
// last distinct member is resolved.
fn resolution_plan() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (1..8usize).prop_flat_map(|n| {
        let order = Just((0..n).collect::<Vec<_>>()).prop_shuffle();
        let repeats = proptest::collection::vec(0..n, 0..8);
        (Just(n), order, repeats).prop_map(|(n, mut order, repeats)| {
            // Interleave repeats after the first occurrences.
            for (i, idx) in repeats.into_iter().enumerate() {
                let at = (i * 3 + 1).min(order.len());
                order.insert(at, idx);
            }
            (n, order)
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ready_fires_once_regardless_of_order(
        (n, plan) in resolution_plan(),
        instant in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let strategy = if instant { ResolveStrategy::Instant } else { ResolveStrategy::Batched };
            let (deps, ready) = memory_deps(strategy);
            let initializer = deps.initializer();
            let scheduler = deps.scheduler(1024);

            let ids: Vec<String> = (0..n).map(|_| deps.new_dependency().id).collect();
            let group = deps.make_group(&ids).await.unwrap();
            initializer.tick().await.unwrap();

            let mut resolved = std::collections::HashSet::new();
            let mut signals = Vec::new();
            for idx in plan {
                deps.resolve(&ids[idx]).await.unwrap();
                resolved.insert(idx);
                scheduler.tick().await.unwrap();
                let emitted = drain(&ready);
                if resolved.len() < n {
                    prop_assert!(emitted.is_empty());
                }
                signals.extend(emitted);
            }

            prop_assert_eq!(signals, vec![group]);
            Ok(())
        })?;
    }
}
