//! Property-based tests for core components using proptest.

use proptest::prelude::*;

use sift_core::config::CyclePolicy;
use sift_core::research::analyzer::reliability_score;
use sift_core::research::synthesis::{categorize, group_facts, triangulated_confidence, SourcedFact};
use sift_core::text::word_overlap;
use sift_core::types::{ContentType, FactCategory};
use sift_core::workflow::{DagStep, plan_batches};
use std::collections::HashSet;

// --- Reliability properties ---

proptest! {
    #[test]
    fn reliability_always_within_bounds(
        authority in -50.0f64..200.0,
        quality in -50.0f64..200.0,
        recency in -50.0f64..200.0,
        citations in -50.0f64..200.0,
    ) {
        let score = reliability_score(authority, quality, recency, citations);
        prop_assert!((0.0..=100.0).contains(&score));
    }
}

// --- Triangulation properties ---

proptest! {
    #[test]
    fn single_source_is_never_confirmed(confidence in 0.0f64..=1.0) {
        prop_assert_ne!(categorize(confidence, 1), FactCategory::Confirmed);
        prop_assert_ne!(categorize(confidence, 0), FactCategory::Confirmed);
    }

    #[test]
    fn triangulated_confidence_non_decreasing_in_support(
        confidence in 0.0f64..=1.0,
        reliability in 0.0f64..=100.0,
        sources in 1usize..10,
    ) {
        let fewer = triangulated_confidence(confidence, reliability, sources);
        let more = triangulated_confidence(confidence, reliability, sources + 1);
        prop_assert!(more >= fewer);
        prop_assert!((0.0..=1.0).contains(&fewer));
    }

    #[test]
    fn fact_groups_partition_all_facts(
        statements in prop::collection::vec("[a-e]{3,5}( [a-e]{3,5}){2,5}", 0..12),
        threshold in 0.0f64..=1.0,
    ) {
        let facts: Vec<SourcedFact> = statements
            .iter()
            .enumerate()
            .map(|(i, s)| SourcedFact::new(s.clone(), 0.8, 70.0, format!("src-{i}"), ContentType::Article))
            .collect();
        let groups = group_facts(&facts, threshold);

        let mut seen = HashSet::new();
        for group in &groups {
            prop_assert!(!group.is_empty());
            for &i in group {
                prop_assert!(seen.insert(i), "fact {} grouped twice", i);
            }
        }
        prop_assert_eq!(seen.len(), facts.len());
    }

    #[test]
    fn word_overlap_is_symmetric(a in "[a-f ]{0,40}", b in "[a-f ]{0,40}") {
        let a = sift_core::text::keyword_set(&a);
        let b = sift_core::text::keyword_set(&b);
        prop_assert_eq!(word_overlap(&a, &b), word_overlap(&b, &a));
    }
}

// --- DAG batching properties ---

/// Random acyclic graph: step `i` may only depend on steps before it.
fn acyclic_steps() -> impl Strategy<Value = Vec<DagStep<()>>> {
    (1usize..15).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), n).prop_map(
            move |deps| {
                deps.into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let ids: Vec<String> = if i == 0 {
                            Vec::new()
                        } else {
                            picks.iter().map(|p| format!("s{}", p.index(i))).collect()
                        };
                        DagStep::new(format!("s{i}"), ()).depends_on(ids)
                    })
                    .collect()
            },
        )
    })
}

proptest! {
    #[test]
    fn dependencies_run_in_strictly_earlier_batches(steps in acyclic_steps()) {
        let plan = plan_batches(&steps, CyclePolicy::FailFast).unwrap();
        prop_assert!(!plan.cycle_broken);

        let mut batch_of = vec![usize::MAX; steps.len()];
        for (b, batch) in plan.batches.iter().enumerate() {
            for &i in batch {
                batch_of[i] = b;
            }
        }
        prop_assert!(batch_of.iter().all(|b| *b != usize::MAX));
        for (i, deps) in plan.dependencies.iter().enumerate() {
            for &d in deps {
                prop_assert!(batch_of[d] < batch_of[i]);
            }
        }
    }

    #[test]
    fn cycles_are_always_broken(n in 2usize..8) {
        // A ring: every step depends on the next one.
        let steps: Vec<DagStep<()>> = (0..n)
            .map(|i| DagStep::new(format!("s{i}"), ()).depends_on([format!("s{}", (i + 1) % n)]))
            .collect();
        let plan = plan_batches(&steps, CyclePolicy::BreakArbitrarily).unwrap();
        prop_assert!(plan.cycle_broken);
        prop_assert_eq!(plan.batches.iter().map(Vec::len).sum::<usize>(), n);
        prop_assert!(plan_batches(&steps, CyclePolicy::FailFast).is_err());
    }
}
