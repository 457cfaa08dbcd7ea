use proptest::prelude::*;
use recon_path::{get, matches, set, DotPath};
use serde_json::{json, Value};

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]{0,8}"
}

fn path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..5).prop_map(|segs| segs.join("."))
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
        Just(json!({"nested": [1, 2, 3]})),
    ]
}

proptest! {
    #[test]
    fn prop_set_then_get_round_trips(p in path(), v in leaf()) {
        let mut doc = json!({});
        set(&mut doc, &p, v.clone()).unwrap();
        prop_assert_eq!(get(&doc, &p), Some(&v));
        prop_assert!(matches(Some(&v), get(&doc, &p)));
    }

    #[test]
    fn prop_set_twice_keeps_last(p in path(), a in leaf(), b in leaf()) {
        let mut doc = json!({});
        set(&mut doc, &p, a).unwrap();
        set(&mut doc, &p, b.clone()).unwrap();
        prop_assert_eq!(get(&doc, &p), Some(&b));
    }

    #[test]
    fn prop_conflict_never_mutates(first in segment(), rest in path(), v in leaf()) {
        let mut doc = json!({ first.clone(): "scalar" });
        let before = doc.clone();
        let full = format!("{first}.{rest}");
        let err = set(&mut doc, &full, v).unwrap_err();
        prop_assert!(err.is_conflict());
        prop_assert_eq!(doc, before);
    }

    #[test]
    fn prop_display_is_parse_inverse(p in path()) {
        let parsed = DotPath::parse(&p).unwrap();
        prop_assert_eq!(parsed.to_string(), p);
    }
}
