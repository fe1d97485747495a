//! the bump engine: when a bulk update rewrote the base under a pending
//! move, a move with no entangling local layers can be fast-forwarded by
//! rewriting the destination layer directly, with no editor drive and no
//! per-node notifications; anything else becomes a move-edit tree conflict
//! on the source for the full resolver to handle later

use super::replace::replace_moved_layer;
use crate::conflict::{
    ConflictAction, ConflictReason, ConflictSkel, NodeVersion, Operation, TreeConflictInfo,
};
use crate::db::{MoveRecord, Revision, Txn, WcDb};
use crate::error::{WcError, WcResult};
use crate::notify::{Notification, NotifyAction};
use crate::path::WcPath;
use fallible_iterator::FallibleIterator;

/// how much of the tree the bulk update actually visited; a bump is only
/// sound when the requested depth covered the whole move source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateDepth {
    Empty,
    Files,
    Immediates,
    Infinity,
}

impl WcDb {
    /// fast-forwards every pending move under `root` after a bulk update to
    /// `new_revision`, raising move-edit tree conflicts on the sources the
    /// update could not cover
    pub fn bump_moves_after_update(
        &mut self,
        root: WcPath,
        depth: UpdateDepth,
        operation: Operation,
        old_revision: Revision,
        new_revision: Revision,
    ) -> WcResult<()> {
        debug!("WcDb::bump_moves_after_update({}, {:?})", root, depth);
        self.verify_write_lock(root)?;
        self.with_txn_mut(|txn| {
            bump_moved_away(txn, root, 0, depth, operation, old_revision, new_revision)
        })
    }
}

fn bump_moved_away(
    txn: &mut Txn<'_>,
    root: WcPath,
    op_depth: usize,
    depth: UpdateDepth,
    operation: Operation,
    old_revision: Revision,
    new_revision: Revision,
) -> WcResult<()> {
    let mut moves = txn.moves_under(root, op_depth);
    while let Some(mv) = moves.next()? {
        bump_move(txn, mv, op_depth, depth, operation, old_revision, new_revision)?;
    }
    Ok(())
}

fn bump_move(
    txn: &mut Txn<'_>,
    mv: MoveRecord,
    src_op_depth: usize,
    depth: UpdateDepth,
    operation: Operation,
    old_revision: Revision,
    new_revision: Revision,
) -> WcResult<()> {
    let MoveRecord { src_op_root: src, dst_op_root: dst, op_depth: delete_op_depth } = mv;
    trace!("bump_move({} -> {})", src, dst);

    // a source already carrying a tree conflict is the resolver's problem
    if txn.read_conflict(src).map_or(false, |skel| skel.tree.is_some()) {
        return Ok(());
    }

    // a layer between the updated content and the move's delete entangles
    // the move with some other local operation
    let entangled =
        txn.op_depths_above(src, src_op_depth).into_iter().any(|d| d < delete_op_depth);

    if entangled || !depth_sufficient_to_bump(txn, src, src_op_depth, depth) {
        bump_mark_tree_conflict(txn, src, src_op_depth, operation, old_revision, new_revision)?;
        return Ok(());
    }

    replace_moved_layer(txn, src, dst, src_op_depth)?;
    // the rewritten destination may itself shelter further moves
    bump_moved_away(txn, dst, dst.depth(), depth, operation, old_revision, new_revision)
}

fn depth_sufficient_to_bump(
    txn: &Txn<'_>,
    src: WcPath,
    op_depth: usize,
    depth: UpdateDepth,
) -> bool {
    let rows = txn.subtree_at(src, op_depth);
    let child_depth = src.depth() + 1;
    match depth {
        UpdateDepth::Infinity => true,
        UpdateDepth::Empty => rows.iter().all(|(path, _)| *path == src),
        UpdateDepth::Files =>
            rows.iter().all(|(path, row)| *path == src || (path.depth() == child_depth && !row.kind.is_dir())),
        UpdateDepth::Immediates => rows.iter().all(|(path, _)| path.depth() <= child_depth),
    }
}

fn bump_mark_tree_conflict(
    txn: &mut Txn<'_>,
    src: WcPath,
    src_op_depth: usize,
    operation: Operation,
    old_revision: Revision,
    new_revision: Revision,
) -> WcResult<()> {
    debug!("bump_mark_tree_conflict({})", src);
    let Some(row) = txn.depth_get_info(src, src_op_depth) else {
        bail!(WcError::ResolverFailure(format!(
            "move source `{}` has no row at op-depth {}",
            src, src_op_depth
        )));
    };
    let old = NodeVersion::new(row.repos_relpath, old_revision, Some(row.kind));
    let new = NodeVersion::new(row.repos_relpath, new_revision, Some(row.kind));
    let skel = ConflictSkel::new(operation, old, new).with_tree(TreeConflictInfo {
        reason: ConflictReason::MovedAway,
        action: ConflictAction::Edit,
        move_src_op_root: Some(src),
    });
    if txn.mark_conflict(src, skel)? {
        txn.notify_add(
            Notification::new(src, NotifyAction::TreeConflict, row.kind)
                .with_revisions(old_revision, new_revision),
        );
    }
    Ok(())
}
