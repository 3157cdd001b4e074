//! Property tests for the step hash chain.

use proptest::prelude::*;

use purser::attrs::Attributes;
use purser::script::{ShellStep, Step};

fn chain(scripts: &[String]) -> Vec<String> {
    let mut attrs = Attributes::new();
    let mut hashes = Vec::new();
    let mut prev = String::new();
    for (i, script) in scripts.iter().enumerate() {
        let mut step = ShellStep::new(&format!("p_{i}"), script);
        prev = step
            .prepare(&mut attrs, &prev)
            .expect("plain scripts must prepare");
        hashes.push(prev.clone());
    }
    hashes
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the chain is deterministic.
    #[test]
    fn property_chain_is_deterministic(
        scripts in proptest::collection::vec("[a-z ]{1,24}", 1..6),
    ) {
        prop_assert_eq!(chain(&scripts), chain(&scripts));
    }

    /// PROPERTY: changing step i leaves hashes before i intact and changes
    /// the hash of every step from i on.
    #[test]
    fn property_change_invalidates_downstream(
        scripts in proptest::collection::vec("[a-z ]{1,24}", 1..6),
        index in any::<prop::sample::Index>(),
    ) {
        let i = index.index(scripts.len());
        let mut changed = scripts.clone();
        changed[i] = format!("{} changed", changed[i]);

        let before = chain(&scripts);
        let after = chain(&changed);

        for j in 0..scripts.len() {
            if j < i {
                prop_assert_eq!(&before[j], &after[j]);
            } else {
                prop_assert_ne!(&before[j], &after[j]);
            }
        }
    }
}
