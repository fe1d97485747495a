use crate::conflict::TextConflictInfo;
use crate::error::WcResult;
use crate::props::{PropChange, Props};
use crate::workqueue::WorkItem;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Unchanged,
    Merged,
    Conflicted,
}

#[derive(Debug)]
pub struct TextMergeResult {
    /// the deferred effect realizing the merge on disk, if any
    pub work_item: Option<WorkItem>,
    pub conflict: Option<TextConflictInfo>,
    pub outcome: MergeOutcome,
}

/// the external file-content merger
///
/// invoked only for files that are locally modified; must be purely
/// functional relative to its inputs, with both pristines already resolved
/// to local paths so no store or network work happens inside the walk
pub trait FileMerger {
    fn merge_text(
        &self,
        old_pristine: &Path,
        new_pristine: &Path,
        working: &Path,
        actual_props: &Props,
        prop_changes: &[PropChange],
    ) -> WcResult<TextMergeResult>;
}
