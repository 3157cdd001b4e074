//! Property tests for the document parser.

use proptest::prelude::*;

use purser::parser::parse_str;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: the parser never panics, whatever the input.
    #[test]
    fn property_parse_never_panics(input in "(?s).{0,512}") {
        let _ = parse_str("prop.prd", &input);
    }

    /// PROPERTY: a well-formed single-package document always parses, and
    /// formatting it re-parses to an identical tree.
    #[test]
    fn property_well_formed_documents_round_trip(
        name in "[A-Za-z][A-Za-z0-9 ]{0,16}",
        id in "[a-z][a-z0-9_]{0,8}",
        lines in proptest::collection::vec("[a-z][a-z0-9 ]{0,20}", 1..4),
    ) {
        let doc = format!(
            "# Resource: {name} [{id}]\n\n## Package: P [p]\n\n{}",
            lines
                .iter()
                .map(|l| format!("    {l}\n"))
                .collect::<String>(),
        );
        let tree = parse_str("prop.prd", &doc).expect("well-formed document must parse");
        let formatted = tree.to_string();
        let reparsed = parse_str("prop.prd", &formatted).expect("formatted output must parse");
        prop_assert_eq!(tree, reparsed);
    }
}
