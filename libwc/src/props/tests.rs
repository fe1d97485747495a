use super::*;

fn props(pairs: &[(&str, &str)]) -> Props {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn test_prop_diffs() {
    let old = props(&[("k", "1"), ("gone", "x")]);
    let new = props(&[("k", "2"), ("fresh", "y")]);
    let diffs = prop_diffs(&old, &new);
    assert_eq!(
        diffs,
        vec![
            PropChange { name: "fresh".to_owned(), value: Some("y".to_owned()) },
            PropChange { name: "gone".to_owned(), value: None },
            PropChange { name: "k".to_owned(), value: Some("2".to_owned()) },
        ]
    );
}

#[test]
fn test_merge_no_incoming_change_is_unchanged() {
    let old = props(&[("k", "1")]);
    let working = props(&[("k", "local")]);
    let result = merge_props(&old, &working, &old);
    assert_eq!(result.state, NotifyState::Unchanged);
    assert_eq!(result.merged, working);
    assert!(result.conflicts.is_empty());
}

#[test]
fn test_merge_clean_incoming_change() {
    let old = props(&[("k", "1")]);
    let new = props(&[("k", "2")]);
    let result = merge_props(&old, &old.clone(), &new);
    assert_eq!(result.state, NotifyState::Changed);
    assert_eq!(result.merged, new);
}

#[test]
fn test_merge_identical_changes_merge() {
    let old = props(&[("k", "1")]);
    let new = props(&[("k", "2")]);
    let result = merge_props(&old, &new.clone(), &new);
    assert_eq!(result.state, NotifyState::Merged);
    assert_eq!(result.merged, new);
}

#[test]
fn test_merge_disjoint_changes_merge() {
    let old = props(&[("a", "1"), ("b", "1")]);
    let working = props(&[("a", "local"), ("b", "1")]);
    let new = props(&[("a", "1"), ("b", "2")]);
    let result = merge_props(&old, &working, &new);
    assert_eq!(result.state, NotifyState::Merged);
    assert_eq!(result.merged, props(&[("a", "local"), ("b", "2")]));
}

#[test]
fn test_merge_conflicting_change_keeps_working_value() {
    let old = props(&[("k", "1")]);
    let working = props(&[("k", "local")]);
    let new = props(&[("k", "2")]);
    let result = merge_props(&old, &working, &new);
    assert_eq!(result.state, NotifyState::Conflicted);
    assert_eq!(result.merged, working);
    assert_eq!(
        result.conflicts,
        vec![PropConflict {
            name: "k".to_owned(),
            old: Some("1".to_owned()),
            new: Some("2".to_owned()),
            working: Some("local".to_owned()),
        }]
    );
}

#[test]
fn test_merge_incoming_deletion() {
    let old = props(&[("k", "1")]);
    let result = merge_props(&old, &old.clone(), &Props::new());
    assert_eq!(result.state, NotifyState::Changed);
    assert!(result.merged.is_empty());
}

#[quickcheck]
fn qc_merge_of_equal_sides_is_identity(pairs: Vec<(u8, u8)>) -> bool {
    let side: Props =
        pairs.iter().map(|(k, v)| (format!("p{}", k % 8), format!("{}", v))).collect();
    let result = merge_props(&side, &side, &side);
    result.state == NotifyState::Unchanged && result.merged == side && result.conflicts.is_empty()
}
