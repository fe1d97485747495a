//! reconciles an incoming update with a local move-away
//!
//! When an update edits a subtree the user has moved away, the destination of
//! the move must end up as if the update had been applied before the move.
//! The driver walks the updated source layer and the destination layer in
//! lockstep, the editor applies each difference to the destination (raising
//! tree conflicts where local state is in the way), and the layer replacer
//! finally rewrites the destination's op-depth layer to mirror the source.
//! The bump engine is the fast path for moves the update can fast-forward
//! without driving the editor at all.

mod bump;
mod driver;
mod editor;
mod replace;

pub use bump::UpdateDepth;

use crate::cancel::CancelToken;
use crate::conflict::{NodeVersion, Operation};
use crate::db::{MoveInfo, Txn, WcDb};
use crate::error::{WcError, WcResult};
use crate::merge::FileMerger;
use crate::path::WcPath;
use crate::pristine::PristineStore;
use rustc_hash::FxHashMap;

impl WcDb {
    /// resolves the tree conflict on `victim` (the source of a move hit by an
    /// update or switch) by replaying the incoming change onto the move
    /// destination
    ///
    /// the caller must hold write-locks on both the move source and the move
    /// destination op-roots; everything happens in one transaction, so an
    /// error (including cancellation) leaves the working copy untouched
    pub fn resolve_update_move(
        &mut self,
        victim: WcPath,
        merger: &dyn FileMerger,
        pristines: &dyn PristineStore,
        cancel: &dyn CancelToken,
    ) -> WcResult<()> {
        debug!("WcDb::resolve_update_move({})", victim);

        let Some(skel) = self.read_conflict(victim) else {
            bail!(WcError::NotInConflict(victim));
        };
        if skel.tree.is_none() {
            bail!(WcError::NotInConflict(victim));
        }
        match skel.operation {
            Operation::Update | Operation::Switch => {}
            Operation::Merge => bail!(WcError::UnsupportedConflict(victim)),
        }

        let Some(mv) = self.op_depth_moved_to(victim, 0) else {
            bail!(WcError::NotMovedAway(victim));
        };
        let MoveInfo { src_op_root, dst_op_root, .. } = mv;
        let delete_op_depth = mv.delete_op_depth();

        // the lock protocol requires both op-roots locked before the
        // transaction opens
        self.verify_write_lock(src_op_root)?;
        self.verify_write_lock(dst_op_root)?;

        self.with_txn_mut(|txn| {
            let Some((src_op_depth, _)) = txn.highest_layer_below(src_op_root, delete_op_depth)
            else {
                bail!(WcError::ResolverFailure(format!(
                    "move source `{}` has no layer below its delete at op-depth {}",
                    src_op_root, delete_op_depth
                )));
            };
            verify_source_integrity(txn, src_op_root, src_op_depth)?;

            let mut ctxt = UpdateMoveCtxt {
                txn,
                operation: skel.operation,
                old_version: skel.old.clone(),
                new_version: skel.new.clone(),
                src_op_root,
                dst_op_root,
                src_op_depth,
                dst_op_depth: dst_op_root.depth(),
                conflict_root: None,
                merger,
                pristines,
                cancel,
            };
            ctxt.drive()?;
            replace::replace_moved_layer(ctxt.txn, src_op_root, dst_op_root, src_op_depth)?;
            Ok(())
        })
    }

    /// dissolves the move linkage between `src_op_root` and `dst_op_root`
    /// while leaving the content of both sides intact; the delete layer at
    /// the source and the copied layer at the destination survive as an
    /// ordinary delete and an ordinary copy
    pub fn break_move(
        &mut self,
        src_op_root: WcPath,
        op_depth: usize,
        dst_op_root: WcPath,
    ) -> WcResult<()> {
        debug!("WcDb::break_move({} -> {})", src_op_root, dst_op_root);
        self.verify_write_lock(src_op_root)?;
        self.verify_write_lock(dst_op_root)?;
        self.with_txn_mut(|txn| {
            txn.clear_moved_to(src_op_root, op_depth)?;
            txn.clear_moved_here_recursive(dst_op_root, dst_op_root.depth())
        })
    }

    /// explicit resolve: clears the recorded conflict skeleton on `path`
    pub fn resolve_conflict(&mut self, path: WcPath) -> WcResult<bool> {
        debug!("WcDb::resolve_conflict({})", path);
        self.verify_write_lock(path)?;
        self.with_txn_mut(|txn| txn.clear_conflict(path))
    }
}

/// a move source must be single-revision and unswitched before its update can
/// be replayed; anything else is rejected before the first edit
fn verify_source_integrity(txn: &Txn<'_>, root: WcPath, op_depth: usize) -> WcResult<()> {
    let rows = txn.subtree_at(root, op_depth);
    let mut revisions = rows
        .iter()
        .filter(|(_, row)| row.is_visible())
        .map(|(_, row)| row.revision);
    let Some(first) = revisions.next() else { return Ok(()) };
    let (lo, hi) = revisions.fold((first, first), |(lo, hi), rev| (lo.min(rev), hi.max(rev)));
    if lo != hi {
        bail!(WcError::MixedRevisionSource(root, lo, hi));
    }

    let repos_relpaths: FxHashMap<WcPath, WcPath> = rows
        .iter()
        .filter(|(_, row)| row.is_visible())
        .map(|(path, row)| (*path, row.repos_relpath))
        .collect();
    for (path, row) in rows.iter().filter(|(_, row)| row.is_visible()) {
        let Some(parent) = path.parent().filter(|_| *path != root) else { continue };
        if let Some(&parent_repos) = repos_relpaths.get(&parent) {
            if parent_repos.join(path.file_name()) != row.repos_relpath {
                bail!(WcError::SwitchedSubtree(*path));
            }
        }
    }
    Ok(())
}

/// shared state of one resolver run: the identity of the move being
/// reconciled, the repository versions from the recorded conflict, and the
/// most recently raised conflict root (one tree conflict suppresses every
/// nested raise on the same branch)
pub(crate) struct UpdateMoveCtxt<'a, 'db> {
    pub(crate) txn: &'a mut Txn<'db>,
    operation: Operation,
    old_version: NodeVersion,
    new_version: NodeVersion,
    src_op_root: WcPath,
    dst_op_root: WcPath,
    src_op_depth: usize,
    dst_op_depth: usize,
    conflict_root: Option<WcPath>,
    merger: &'a dyn FileMerger,
    pristines: &'a dyn PristineStore,
    cancel: &'a dyn CancelToken,
}
