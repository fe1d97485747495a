//! node properties and the three-way property merge used when an update
//! alters a node the user has moved away

use crate::notify::NotifyState;
use itertools::{EitherOrBoth, Itertools};
use std::collections::BTreeMap;

/// versioned properties of a node; ordered so layer comparisons are stable
pub type Props = BTreeMap<String, String>;

/// a single incoming property change; `value = None` is a deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropChange {
    pub name: String,
    pub value: Option<String>,
}

/// one property the merge could not decide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropConflict {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
    pub working: Option<String>,
}

#[derive(Debug)]
pub struct PropMergeResult {
    pub merged: Props,
    pub conflicts: Vec<PropConflict>,
    pub state: NotifyState,
}

/// the incoming changes turning `old` into `new`
pub fn prop_diffs(old: &Props, new: &Props) -> Vec<PropChange> {
    old.iter()
        .merge_join_by(new.iter(), |(a, _), (b, _)| a.cmp(b))
        .filter_map(|entry| match entry {
            EitherOrBoth::Both((_, old_value), (name, new_value)) => (old_value != new_value)
                .then(|| PropChange { name: name.clone(), value: Some(new_value.clone()) }),
            EitherOrBoth::Left((name, _)) => Some(PropChange { name: name.clone(), value: None }),
            EitherOrBoth::Right((name, value)) =>
                Some(PropChange { name: name.clone(), value: Some(value.clone()) }),
        })
        .collect()
}

/// three-way property merge: `old` is the common base, `working` the user's
/// actual properties, `new` the incoming side
///
/// per-property rules:
/// - no incoming change: keep the working value
/// - incoming change, working untouched: take the incoming value
/// - incoming change identical to the working change: already merged
/// - otherwise: conflict; the working value is kept and the property recorded
pub fn merge_props(old: &Props, working: &Props, new: &Props) -> PropMergeResult {
    let mut merged = Props::new();
    let mut conflicts = vec![];

    let names: std::collections::BTreeSet<&String> =
        old.keys().chain(working.keys()).chain(new.keys()).collect();

    for name in names {
        let o = old.get(name);
        let w = working.get(name);
        let n = new.get(name);

        let value = if o == n {
            w
        } else if w == o {
            n
        } else if w == n {
            w
        } else {
            conflicts.push(PropConflict {
                name: name.clone(),
                old: o.cloned(),
                new: n.cloned(),
                working: w.cloned(),
            });
            w
        };
        if let Some(value) = value {
            merged.insert(name.clone(), value.clone());
        }
    }

    let incoming_changed = old != new;
    let working_diverged = working != old;
    let state = if !incoming_changed {
        NotifyState::Unchanged
    } else if !conflicts.is_empty() {
        NotifyState::Conflicted
    } else if working_diverged {
        NotifyState::Merged
    } else {
        NotifyState::Changed
    };

    PropMergeResult { merged, conflicts, state }
}

#[cfg(test)]
mod tests;
