//! Property tests for attribute merging.

use std::collections::BTreeMap;

use proptest::prelude::*;

use purser::Attributes;

fn attr_map() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("[A-Z][a-z]{0,3}", "[a-z0-9]{0,8}", 0..8)
}

fn attrs(map: &BTreeMap<String, String>) -> Attributes {
    map.iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: base keys always win, overlay only fills gaps, and the
    /// result covers exactly the union of both key sets.
    #[test]
    fn property_merge_precedence(base in attr_map(), overlay in attr_map()) {
        let merged = attrs(&base).merge(&attrs(&overlay)).expect("plain values must merge");

        for (key, value) in &base {
            prop_assert_eq!(merged.get(key), Some(value.as_str()));
        }
        for (key, value) in &overlay {
            if !base.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value.as_str()));
            }
        }

        let union: std::collections::BTreeSet<_> =
            base.keys().chain(overlay.keys()).collect();
        prop_assert_eq!(merged.len(), union.len());
    }

    /// PROPERTY: merging never mutates the base set.
    #[test]
    fn property_merge_leaves_base_untouched(base in attr_map(), overlay in attr_map()) {
        let original = attrs(&base);
        let _ = original.merge(&attrs(&overlay)).expect("plain values must merge");
        prop_assert_eq!(original, attrs(&base));
    }
}
