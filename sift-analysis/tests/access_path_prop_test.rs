//! Property tests for the access-path lattice.

use proptest::prelude::*;

use sift_analysis::taint::access_path::AccessPath;

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}".prop_map(|s| s)
}

fn chain() -> impl Strategy<Value = (String, Vec<String>)> {
    (ident(), prop::collection::vec(ident(), 0..8))
}

fn render(base: &str, fields: &[String]) -> String {
    let mut s = base.to_string();
    for f in fields {
        s.push('.');
        s.push_str(f);
    }
    s
}

proptest! {
    #[test]
    fn parse_render_round_trips_under_k((base, fields) in chain()) {
        prop_assume!(fields.len() <= 5);
        let text = render(&base, &fields);
        let ap = AccessPath::parse(&text, 5).unwrap();
        prop_assert_eq!(ap.render(), text);
    }

    #[test]
    fn truncation_never_loses_matches((base, fields) in chain()) {
        // The k-limited view must still match the untruncated path.
        let text = render(&base, &fields);
        let truncated = AccessPath::parse(&text, 5).unwrap();
        let full = AccessPath::parse(&text, 64).unwrap();
        prop_assert!(truncated.matches(&full));
        prop_assert!(full.matches(&truncated));
    }

    #[test]
    fn matches_is_symmetric((base, a) in chain(), b in prop::collection::vec(ident(), 0..8)) {
        let x = AccessPath::parse(&render(&base, &a), 5).unwrap();
        let y = AccessPath::parse(&render(&base, &b), 5).unwrap();
        prop_assert_eq!(x.matches(&y), y.matches(&x));
    }

    #[test]
    fn extend_is_bounded_by_k((base, fields) in chain(), extra in ident()) {
        let ap = AccessPath::parse(&render(&base, &fields), 5).unwrap();
        let extended = ap.extend(&extra, 5);
        prop_assert!(extended.fields.len() <= 5);
        prop_assert_eq!(&extended.base, &ap.base);
    }

    #[test]
    fn has_prefix_implies_matches((base, fields) in chain()) {
        prop_assume!(!fields.is_empty());
        let full = AccessPath::parse(&render(&base, &fields), 10).unwrap();
        let prefix = AccessPath::parse(&render(&base, &fields[..fields.len() - 1]), 10).unwrap();
        prop_assert!(full.has_prefix(&prefix));
        prop_assert!(full.matches(&prefix));
        // Refinement is one-directional unless equal.
        if fields.len() > prefix.fields.len() {
            prop_assert!(!prefix.has_prefix(&full));
        }
    }
}
