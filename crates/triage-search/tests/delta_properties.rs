//! Property tests for array set operations and delta encoding.
//!
//! - `merge_array` is set union, `diff_array` is the add/remove difference
//! - `parse(format(t)) == t` for normalized typed values
//! - `delta_params` is idempotent for arbitrary query strings
//! - the same holds for arbitrary (non-canonical) array defaults

use std::collections::BTreeSet;

use proptest::prelude::*;

use triage_search::{
    FieldSpec, FieldValue, ParamsState, SearchFormat, SearchFormatter, SearchParser, TypedParams,
    merge_array,
};

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        max_shrink_iters: 2000,
        ..ProptestConfig::default()
    }
}

fn alert_format() -> SearchFormat {
    SearchFormat::new()
        .field("rows", FieldSpec::number(25.0).min(0.0).max(1000.0))
        .field("query", FieldSpec::string(""))
        .field("track_total_hits", FieldSpec::boolean(true))
        .field("sort", FieldSpec::enumeration("desc", ["asc", "desc"]))
        .field("fq", FieldSpec::array(["status:OPEN", "NOT(owner:bot)"]))
}

fn arb_items() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e]{1,2}", 0..8)
}

fn arb_filter_token() -> impl Strategy<Value = String> {
    let bare = prop::sample::select(vec!["status:OPEN", "owner:bot", "label:x", "label:y", "prio:HIGH"]);
    (bare, any::<bool>()).prop_map(|(b, negate)| {
        if negate {
            format!("NOT({b})")
        } else {
            b.to_string()
        }
    })
}

prop_compose! {
    fn arb_typed()(
        rows in 0u16..=1000,
        query in "[a-z ]{0,8}",
        hits in any::<bool>(),
        sort in prop::sample::select(vec!["asc", "desc"]),
        fq in prop::collection::vec(arb_filter_token(), 0..6),
    ) -> TypedParams {
        let formatter = SearchFormatter::new(alert_format());
        let mut typed = TypedParams::new();
        typed.insert("rows".into(), FieldValue::Number(f64::from(rows)));
        typed.insert("query".into(), FieldValue::Text(query));
        typed.insert("track_total_hits".into(), FieldValue::Bool(hits));
        typed.insert("sort".into(), FieldValue::Text(sort.to_string()));
        typed.insert("fq".into(), FieldValue::List(formatter.apply_array_delta(fq.as_slice(), &[])));
        typed
    }
}

/// Any token form, including removals and stacked prefixes.
fn arb_any_token() -> impl Strategy<Value = String> {
    let wrap = prop::sample::select(vec!["", "NOT", "!", "NOT!", "!NOT", "!!"]);
    (arb_filter_token(), wrap).prop_map(|(token, wrap)| {
        wrap.chars().rev().fold(token, |inner, c| match c {
            'N' => format!("NOT({inner})"),
            '!' => format!("!({inner})"),
            _ => inner,
        })
    })
}

fn arb_query() -> impl Strategy<Value = String> {
    let key = prop::sample::select(vec!["rows", "query", "track_total_hits", "sort", "fq", "junk"]);
    let value = prop_oneof![
        "[a-z0-9 ]{0,6}",
        Just("true".to_string()),
        Just("asc".to_string()),
        arb_filter_token(),
        arb_filter_token().prop_map(|t| format!("!({t})")),
    ];
    prop::collection::vec((key, value), 0..10).prop_map(|pairs| {
        pairs
            .into_iter()
            .collect::<ParamsState>()
            .to_query_string()
    })
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn merge_is_set_union(a in arb_items(), b in arb_items()) {
        let merged = merge_array(&a, &b);
        let expected: BTreeSet<&String> = a.iter().chain(&b).collect();
        let got: BTreeSet<&String> = merged.iter().collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(merged.len(), expected_len(&a, &b));
    }

    #[test]
    fn diff_is_add_remove_difference(a in arb_items(), b in arb_items()) {
        let formatter = SearchFormatter::default();
        let diff: BTreeSet<String> = formatter.diff_array(&a, &b).into_iter().collect();
        let mut expected: BTreeSet<String> =
            a.iter().filter(|x| !b.contains(x)).cloned().collect();
        expected.extend(b.iter().filter(|x| !a.contains(x)).map(|x| format!("!({x})")));
        prop_assert_eq!(diff, expected);
    }

    #[test]
    fn parse_inverts_format(typed in arb_typed()) {
        let formatter = SearchFormatter::new(alert_format());
        let encoded = formatter.format(&typed);
        prop_assert_eq!(formatter.parse(&encoded), typed.clone());
        let full = formatter.format_full(&typed);
        prop_assert_eq!(formatter.parse(&full), typed);
    }

    #[test]
    fn delta_params_is_idempotent(query in arb_query()) {
        let parser = SearchParser::new(alert_format()).with_enforced(&["rows"]);
        let once = parser.delta_params(&ParamsState::parse(&query));
        let twice = parser.delta_params(once.to_params());
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.has("rows"));
    }

    #[test]
    fn arbitrary_array_defaults_stay_stable(
        defaults in prop::collection::vec(arb_any_token(), 0..6),
        fq in prop::collection::vec(arb_any_token(), 0..6),
    ) {
        let parser = SearchParser::new(
            SearchFormat::new().field("fq", FieldSpec::array(defaults)),
        );
        prop_assert!(parser.delta_params(&ParamsState::new()).is_empty());
        let untouched = parser.from_object(&parser.defaults());
        prop_assert!(untouched.is_empty());

        let query: ParamsState = fq.iter().map(|t| ("fq", t.as_str())).collect();
        let once = parser.delta_params(&query);
        let twice = parser.delta_params(once.to_params());
        prop_assert_eq!(&once, &twice);
        let full = parser.full_params(&query);
        prop_assert_eq!(full.to_object(), once.to_object());
    }
}

fn expected_len(a: &[String], b: &[String]) -> usize {
    a.iter().chain(b).collect::<BTreeSet<_>>().len()
}
