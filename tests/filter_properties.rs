//! Property-based tests for subset filtering
//!
//! - Filtering returns an ordered subsequence of the collection
//! - Filtering is idempotent
//! - Speed bins only drop runs recorded in an unselected bin

mod common;

use std::collections::BTreeSet;

use bicycle_id::data::filter::SPEED_BIN_TOLERANCE;
use bicycle_id::{filter, Category, FilterCriteria, RunCollection, SpeedBin};
use common::RunSpec;
use proptest::prelude::*;

const RIDERS: [&str; 3] = ["Charlie", "Jason", "Luke"];
const MANEUVERS: [&str; 3] = ["Balance", "Track Straight Line", "Balance With Disturbance"];
const ENVIRONMENTS: [&str; 4] = ["Horse Treadmill", "Pavillion Floor", "Treadmill", "Pavilion"];
/// Every nominal bin plus values that sit in none of them.
const SPEED_BINS: [f64; 11] = [1.4, 2.0, 3.0, 4.0, 4.92, 5.8, 7.0, 9.0, 2.5, 6.3, 0.0];

// ============================================================================
// Strategies
// ============================================================================

fn arb_run() -> impl Strategy<Value = RunSpec> {
    (
        prop::sample::select(RIDERS.to_vec()),
        prop::sample::select(MANEUVERS.to_vec()),
        prop::sample::select(ENVIRONMENTS.to_vec()),
        prop::sample::select(SPEED_BINS.to_vec()),
        0.0f64..1.0,
        1.0f64..60.0,
    )
        .prop_map(|(rider, maneuver, environment, speed_bin, mean_fit, duration)| RunSpec {
            run_id: "run",
            rider,
            maneuver,
            environment,
            speed_bin,
            speed: speed_bin.max(0.5),
            duration,
            mean_fit,
        })
}

fn arb_collection() -> impl Strategy<Value = RunCollection> {
    prop::collection::vec(arb_run(), 0..30).prop_map(|specs| common::collection(&specs))
}

fn arb_names(names: &'static [&'static str]) -> impl Strategy<Value = Option<BTreeSet<String>>> {
    prop::option::of(
        prop::sample::subsequence(names, 0..=names.len())
            .prop_map(|v| v.into_iter().map(String::from).collect()),
    )
}

fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
    (
        arb_names(&RIDERS),
        arb_names(&MANEUVERS),
        arb_names(&ENVIRONMENTS),
        prop::option::of(prop::sample::subsequence(SpeedBin::ALL.to_vec(), 0..=8)),
        prop::option::of(0.0f64..1.0),
        prop::option::of(0.0f64..60.0),
    )
        .prop_map(|(rider, maneuver, environment, speed, mean_fit, duration)| FilterCriteria {
            rider,
            maneuver,
            environment,
            speed: speed.map(|bins| bins.into_iter().collect()),
            mean_fit,
            duration,
        })
}

fn in_any_bin(speed_bin: f64) -> bool {
    SpeedBin::ALL
        .iter()
        .any(|b| (speed_bin - b.value()).abs() <= SPEED_BIN_TOLERANCE)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the subset is exactly the matching runs, in collection order
    #[test]
    fn prop_filter_is_ordered_subsequence(
        collection in arb_collection(),
        criteria in arb_criteria()
    ) {
        let subset = filter(&collection, &criteria);
        prop_assert!(subset.indices().windows(2).all(|w| w[0] < w[1]));
        for (i, run) in collection.runs().iter().enumerate() {
            prop_assert_eq!(subset.indices().contains(&i), criteria.matches(run));
        }
    }

    /// Property: filtering a filtered subset changes nothing
    #[test]
    fn prop_filter_is_idempotent(
        collection in arb_collection(),
        criteria in arb_criteria()
    ) {
        let once = filter(&collection, &criteria);
        let twice = once.filter(&criteria);
        prop_assert_eq!(once.indices(), twice.indices());
    }

    /// Property: selecting every speed bin is the same as not filtering on speed
    #[test]
    fn prop_all_speed_bins_is_no_restriction(collection in arb_collection()) {
        let every_bin = filter(&collection, &FilterCriteria::all().with_speeds(SpeedBin::ALL));
        prop_assert_eq!(every_bin.len(), collection.len());
    }

    /// Property: an empty speed selection keeps only runs outside every bin
    #[test]
    fn prop_empty_speed_selection_keeps_unbinned_runs(collection in arb_collection()) {
        let subset = filter(&collection, &FilterCriteria::all().with_speeds([]));
        let expected: Vec<usize> = collection
            .runs()
            .iter()
            .enumerate()
            .filter(|(_, r)| !in_any_bin(r.speed_bin))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(subset.indices(), expected.as_slice());
    }

    /// Property: intersecting the rider set with one rider never grows the subset
    #[test]
    fn prop_narrowing_never_grows(
        collection in arb_collection(),
        criteria in arb_criteria(),
        rider in prop::sample::select(RIDERS.to_vec())
    ) {
        let base = filter(&collection, &criteria);
        let riders: BTreeSet<String> = match &criteria.rider {
            Some(selected) => selected.iter().filter(|r| r.as_str() == rider).cloned().collect(),
            None => [rider.to_string()].into(),
        };
        let narrowed = filter(&collection, &criteria.clone().with_values(Category::Rider, riders));
        prop_assert!(narrowed.len() <= base.len());
        prop_assert!(narrowed.indices().iter().all(|i| base.indices().contains(i)));
    }
}

#[test]
fn environment_synonyms() {
    let collection = common::collection(&[
        RunSpec {
            environment: "Pavillion Floor",
            ..RunSpec::new("floor", 2.0)
        },
        RunSpec {
            environment: "Horse Treadmill",
            ..RunSpec::new("horse", 2.0)
        },
        RunSpec {
            environment: "Treadmill",
            ..RunSpec::new("plain", 2.0)
        },
    ]);

    let pavilion = FilterCriteria::all().with_values(Category::Environment, ["Pavilion"]);
    assert_eq!(filter(&collection, &pavilion).run_ids(), vec!["floor"]);

    let treadmill = FilterCriteria::all().with_values(Category::Environment, ["Treadmill"]);
    assert_eq!(filter(&collection, &treadmill).run_ids(), vec!["horse", "plain"]);

    let exact = FilterCriteria::all().with_values(Category::Environment, ["Horse Treadmill"]);
    assert_eq!(filter(&collection, &exact).run_ids(), vec!["horse"]);
}

#[test]
fn thresholds_are_strict() {
    let collection = common::collection(&[
        RunSpec {
            mean_fit: 0.5,
            duration: 20.0,
            ..RunSpec::new("edge", 2.0)
        },
        RunSpec {
            mean_fit: 0.75,
            duration: 40.0,
            ..RunSpec::new("above", 2.0)
        },
    ]);
    let by_fit = FilterCriteria::all().with_mean_fit(0.5);
    assert_eq!(filter(&collection, &by_fit).run_ids(), vec!["above"]);
    let by_duration = FilterCriteria::all().with_duration(20.0);
    assert_eq!(filter(&collection, &by_duration).run_ids(), vec!["above"]);
}
