//! Property-based tests for configuration bounds and instance naming.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use paco_cli::domain::config::{
    MAX_INSTANCES, MIN_INSTANCES, validate_instance_count, validate_pool_name,
};
use paco_cli::domain::instance::{
    group_unit_name, instance_name, instance_unit_name, parse_instance_index, pool_instances,
};
use paco_cli::domain::unit::generate;
use paco_cli::domain::ConfigError;

use crate::helpers::pool_config;

// ============================================================================
// validate_instance_count()
// ============================================================================

#[test]
fn test_instance_count_boundaries() {
    assert!(validate_instance_count(0).is_err());
    assert_eq!(validate_instance_count(1).ok(), Some(MIN_INSTANCES));
    assert_eq!(validate_instance_count(10).ok(), Some(MAX_INSTANCES));
    assert!(matches!(
        validate_instance_count(11),
        Err(ConfigError::InstanceCountOutOfRange { count: 11, min: 1, max: 10 })
    ));
}

proptest! {
    /// Counts inside the bounds are accepted unchanged.
    #[test]
    fn prop_in_range_counts_accepted(count in 1i64..=10) {
        prop_assert_eq!(validate_instance_count(count).ok().map(i64::from), Some(count));
    }

    /// Everything else, including values that overflow `u8`, is rejected.
    #[test]
    fn prop_out_of_range_counts_rejected(count in prop_oneof![i64::MIN..1i64, 11i64..i64::MAX]) {
        prop_assert!(validate_instance_count(count).is_err());
    }
}

// ============================================================================
// Instance naming
// ============================================================================

proptest! {
    /// A derived instance name parses back to its index for the same pool only.
    #[test]
    fn prop_instance_name_identifies_pool_and_index(
        pool in "[a-z0-9][a-z0-9]{0,15}",
        index in 1u8..=10,
    ) {
        let name = instance_name(&pool, index);
        prop_assert!(validate_pool_name(&pool).is_ok());
        prop_assert_eq!(parse_instance_index(&pool, &name), Some(index));
        let other = format!("{pool}x");
        prop_assert_eq!(parse_instance_index(&other, &name), None);
        prop_assert_eq!(instance_unit_name(&name), format!("{pool}-runner-{index}.service"));
    }

    /// Pool names that could break unit names are rejected.
    #[test]
    fn prop_pool_names_with_separators_rejected(
        head in "[a-z]{1,8}",
        sep in prop::sample::select(vec!["/", " ", ".", "_", "@", "\n"]),
        tail in "[a-z]{1,8}",
    ) {
        let name = format!("{head}{sep}{tail}");
        prop_assert!(validate_pool_name(&name).is_err());
    }

    /// Every generated pool has exactly one unit per instance plus the group.
    #[test]
    fn prop_generated_units_cover_the_pool(count in 1i64..=10) {
        let config = pool_config(count);
        let units = generate(&config);
        let expected: Vec<String> = pool_instances(&config)
            .iter()
            .map(|i| i.unit_name())
            .collect();
        let names: Vec<String> = units.instance_units.iter().map(|u| u.name.clone()).collect();
        prop_assert_eq!(names, expected);
        prop_assert_eq!(&units.group_unit.name, &group_unit_name("ci"));
        for unit in &units.instance_units {
            let part_of = unit.part_of.clone();
            prop_assert_eq!(part_of, Some(group_unit_name("ci")));
        }
    }
}
