//! the layer replacer: after the walk (or during a bump) the destination's
//! single op-depth layer is rewritten to mirror the source layer exactly,
//! leaving every higher destination layer untouched

use crate::db::Txn;
use crate::error::WcResult;
use crate::path::WcPath;
use rustc_hash::FxHashSet;

pub(crate) fn replace_moved_layer(
    txn: &mut Txn<'_>,
    src_op_root: WcPath,
    dst_op_root: WcPath,
    src_op_depth: usize,
) -> WcResult<()> {
    debug!(
        "replace_moved_layer({} @ {} -> {} @ {})",
        src_op_root,
        src_op_depth,
        dst_op_root,
        dst_op_root.depth()
    );
    let dst_op_depth = dst_op_root.depth();
    let src_rows = txn.subtree_at(src_op_root, src_op_depth);

    // destination rows with no source counterpart are stale; ones still
    // covering a lower layer degrade to base-deleted shadows instead
    let mapped: FxHashSet<WcPath> = src_rows
        .iter()
        .map(|(src_path, _)| dst_op_root.join(src_path.skip_ancestor(src_op_root).unwrap()))
        .collect();
    for (dst_path, _) in txn.subtree_at(dst_op_root, dst_op_depth) {
        if !mapped.contains(&dst_path) && !txn.delete_no_lower_layer(dst_path, dst_op_depth)? {
            txn.replace_with_base_deleted(dst_path, dst_op_depth)?;
        }
    }

    for (src_path, row) in &src_rows {
        let dst_path = dst_op_root.join(src_path.skip_ancestor(src_op_root).unwrap());
        txn.copy_node_move(*src_path, src_op_depth, dst_path, dst_op_depth)?;
        if dst_path != dst_op_root {
            // a local delete above the destination layer must keep covering
            // whatever the rewrite introduced
            txn.extend_parent_delete(dst_path, row.kind, dst_op_depth)?;
        }
    }
    Ok(())
}
