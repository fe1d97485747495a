//! the edit receiver: applies one walked difference to the destination,
//! raising tree conflicts where local state is in the way, and the conflict
//! engine deciding where such a conflict anchors

use super::UpdateMoveCtxt;
use crate::checksum::Checksum;
use crate::conflict::{
    ConflictAction, ConflictReason, ConflictSkel, NodeVersion, PropConflictInfo, TreeConflictInfo,
};
use crate::db::{NodeKind, NodeRow};
use crate::error::{WcError, WcResult};
use crate::merge::MergeOutcome;
use crate::notify::{Notification, NotifyAction, NotifyState};
use crate::path::WcPath;
use crate::props::{merge_props, prop_diffs, PropConflict};
use crate::workqueue::WorkItem;

impl UpdateMoveCtxt<'_, '_> {
    pub(super) fn add_directory(
        &mut self,
        dst: WcPath,
        shadowed: bool,
        old_kind: Option<NodeKind>,
    ) -> WcResult<()> {
        debug!("UpdateMoveCtxt::add_directory({})", dst);
        let conflicted =
            self.check_tree_conflict(dst, old_kind, Some(NodeKind::Dir), ConflictAction::Add)?;
        if conflicted || shadowed {
            // nothing to materialize; the layer rewrite still applies
            return Ok(());
        }

        match NodeKind::of_disk(&self.txn.abspath(dst)) {
            Some(kind) if kind != NodeKind::Dir => {
                // an unversioned node of a conflicting kind is in the way
                self.mark_tree_conflict(
                    dst,
                    ConflictReason::Unversioned,
                    ConflictAction::Add,
                    old_kind,
                    Some(NodeKind::Dir),
                    None,
                )?;
                self.conflict_root = Some(dst);
                return Ok(());
            }
            _ => {}
        }

        self.txn.wq_add(WorkItem::DirInstall { path: dst });
        self.notify(dst, NotifyAction::UpdateAdd, NodeKind::Dir, NotifyState::Inapplicable, NotifyState::Inapplicable);
        Ok(())
    }

    pub(super) fn add_file(
        &mut self,
        dst: WcPath,
        shadowed: bool,
        old_kind: Option<NodeKind>,
    ) -> WcResult<()> {
        debug!("UpdateMoveCtxt::add_file({})", dst);
        let conflicted =
            self.check_tree_conflict(dst, old_kind, Some(NodeKind::File), ConflictAction::Add)?;
        if conflicted || shadowed {
            return Ok(());
        }

        if let Some(_obstruction) = NodeKind::of_disk(&self.txn.abspath(dst)) {
            // any unversioned node obstructs a file install
            self.mark_tree_conflict(
                dst,
                ConflictReason::Unversioned,
                ConflictAction::Add,
                old_kind,
                Some(NodeKind::File),
                None,
            )?;
            self.conflict_root = Some(dst);
            return Ok(());
        }

        // the pristine arrives with the layer rewrite; materialize empty and
        // let the executor record the node's info afterwards
        self.txn.wq_add(WorkItem::FileInstall { path: dst, pristine: None, record_info: true });
        self.notify(dst, NotifyAction::UpdateAdd, NodeKind::File, NotifyState::Inapplicable, NotifyState::Inapplicable);
        Ok(())
    }

    /// directory edits carry only property changes; children are the
    /// walker's business
    pub(super) fn alter_directory(
        &mut self,
        dst: WcPath,
        shadowed: bool,
        old_row: &NodeRow,
        new_row: &NodeRow,
    ) -> WcResult<()> {
        debug!("UpdateMoveCtxt::alter_directory({})", dst);
        let conflicted = self.check_tree_conflict(
            dst,
            Some(NodeKind::Dir),
            Some(NodeKind::Dir),
            ConflictAction::Edit,
        )?;
        if conflicted || shadowed {
            return Ok(());
        }

        let (prop_state, prop_conflicts) = self.apply_prop_changes(dst, old_row, new_row)?;
        if !prop_conflicts.is_empty() {
            let (old, new) =
                self.versions_for(dst, Some(NodeKind::Dir), Some(NodeKind::Dir));
            let skel = ConflictSkel::new(self.operation, old, new)
                .with_props(PropConflictInfo { conflicts: prop_conflicts });
            self.txn.mark_conflict(dst, skel)?;
            self.txn.wq_add(WorkItem::ConflictMarkers { path: dst });
        }
        self.notify(dst, NotifyAction::UpdateUpdate, NodeKind::Dir, NotifyState::Unchanged, prop_state);
        Ok(())
    }

    pub(super) fn alter_file(
        &mut self,
        dst: WcPath,
        shadowed: bool,
        old_row: &NodeRow,
        new_row: &NodeRow,
    ) -> WcResult<()> {
        debug!("UpdateMoveCtxt::alter_file({})", dst);
        let kind = new_row.kind;
        let conflicted =
            self.check_tree_conflict(dst, Some(kind), Some(kind), ConflictAction::Edit)?;
        if conflicted || shadowed {
            return Ok(());
        }

        // the merger sees the pre-merge actual props, not what the property
        // merge is about to write
        let working_props = self.txn.actual_props(dst).unwrap_or_else(|| old_row.props.clone());
        let prop_changes = prop_diffs(&old_row.props, &new_row.props);
        let (prop_state, prop_conflicts) = self.apply_prop_changes(dst, old_row, new_row)?;

        let mut content_state = NotifyState::Unchanged;
        let mut text_conflict = None;
        if old_row.checksum != new_row.checksum {
            let old_checksum = require_checksum(old_row, dst)?;
            let new_checksum = require_checksum(new_row, dst)?;
            let working_abspath = self.txn.abspath(dst);

            let locally_modified = NodeKind::of_disk(&working_abspath).is_some()
                && Checksum::of_file(&working_abspath)? != old_checksum;

            if !locally_modified {
                self.txn.wq_add(WorkItem::FileInstall {
                    path: dst,
                    pristine: Some(new_checksum),
                    record_info: true,
                });
                content_state = NotifyState::Changed;
            } else {
                let old_pristine = self.pristines.pristine_path(&old_checksum)?;
                let new_pristine = self.pristines.pristine_path(&new_checksum)?;
                let result = self.merger.merge_text(
                    &old_pristine,
                    &new_pristine,
                    &working_abspath,
                    &working_props,
                    &prop_changes,
                )?;
                if let Some(item) = result.work_item {
                    self.txn.wq_add(item);
                }
                content_state = match result.outcome {
                    MergeOutcome::Unchanged => NotifyState::Unchanged,
                    MergeOutcome::Merged => NotifyState::Merged,
                    MergeOutcome::Conflicted => NotifyState::Conflicted,
                };
                text_conflict = result.conflict;
            }
        }

        if text_conflict.is_some() || !prop_conflicts.is_empty() {
            let (old, new) = self.versions_for(dst, Some(kind), Some(kind));
            let mut skel = ConflictSkel::new(self.operation, old, new);
            if let Some(text) = text_conflict {
                skel = skel.with_text(text);
            }
            if !prop_conflicts.is_empty() {
                skel = skel.with_props(PropConflictInfo { conflicts: prop_conflicts });
            }
            self.txn.mark_conflict(dst, skel)?;
            self.txn.wq_add(WorkItem::ConflictMarkers { path: dst });
        }

        self.notify(dst, NotifyAction::UpdateUpdate, kind, content_state, prop_state);
        Ok(())
    }

    pub(super) fn delete(&mut self, dst: WcPath, shadowed: bool, dst_row: &NodeRow) -> WcResult<()> {
        debug!("UpdateMoveCtxt::delete({})", dst);
        let conflicted =
            self.check_tree_conflict(dst, Some(dst_row.kind), None, ConflictAction::Delete)?;
        if shadowed || conflicted {
            return Ok(());
        }

        let (modified, all_deletes) = self.txn.has_local_mods(dst, self.dst_op_depth)?;
        if !modified {
            self.schedule_removal(dst, dst_row);
            self.notify(
                dst,
                NotifyAction::UpdateDelete,
                dst_row.kind,
                NotifyState::Inapplicable,
                NotifyState::Inapplicable,
            );
        } else if !all_deletes {
            // local edits survive the incoming delete: the destination layer
            // becomes an ordinary copy rooted here, and the delete is raised
            // as a conflict instead of applied
            self.txn.update_op_depth_recursive(dst, self.dst_op_depth, dst.depth())?;
            self.mark_tree_conflict(
                dst,
                ConflictReason::Edited,
                ConflictAction::Delete,
                Some(dst_row.kind),
                None,
                None,
            )?;
            self.conflict_root = Some(dst);
        } else {
            for op_depth in self.txn.op_depths_above(dst, self.dst_op_depth) {
                self.txn.delete_working_op_depth(dst, op_depth)?;
            }
            self.mark_tree_conflict(
                dst,
                ConflictReason::Deleted,
                ConflictAction::Delete,
                Some(dst_row.kind),
                None,
                None,
            )?;
            self.conflict_root = Some(dst);
            // best effort: the executor is idempotent on replay
            self.schedule_removal(dst, dst_row);
        }
        Ok(())
    }

    fn schedule_removal(&mut self, dst: WcPath, dst_row: &NodeRow) {
        // children before their parents so directory removals find them empty
        let rows = self.txn.subtree_at(dst, self.dst_op_depth);
        for (path, row) in rows.iter().rev() {
            if *path == dst || !row.is_visible() {
                continue;
            }
            self.txn.wq_add(removal_item(*path, row.kind));
        }
        self.txn.wq_add(removal_item(dst, dst_row.kind));
    }

    fn apply_prop_changes(
        &mut self,
        dst: WcPath,
        old_row: &NodeRow,
        new_row: &NodeRow,
    ) -> WcResult<(NotifyState, Vec<PropConflict>)> {
        if old_row.props == new_row.props {
            return Ok((NotifyState::Unchanged, vec![]));
        }
        let working = self.txn.actual_props(dst).unwrap_or_else(|| old_row.props.clone());
        let merge = merge_props(&old_row.props, &working, &new_row.props);
        // the post-merge diff against the incoming props decides whether the
        // actual row still carries information
        if merge.merged == new_row.props {
            self.txn.set_props(dst, None)?;
        } else {
            self.txn.set_props(dst, Some(merge.merged))?;
        }
        Ok((merge.state, merge.conflicts))
    }

    // conflict engine

    /// decides whether the incoming change at `relpath` collides with a local
    /// working layer; if so, raises a tree conflict at that layer's op-root
    /// and remembers it so nothing nested raises again
    pub(super) fn check_tree_conflict(
        &mut self,
        relpath: WcPath,
        old_kind: Option<NodeKind>,
        new_kind: Option<NodeKind>,
        action: ConflictAction,
    ) -> WcResult<bool> {
        if let Some(root) = self.conflict_root {
            if root.is_same_or_ancestor_of(relpath) {
                return Ok(true);
            }
        }
        let Some((op_depth, _)) = self.txn.lowest_layer_above(relpath, self.dst_op_depth) else {
            return Ok(false);
        };
        // the conflict anchors at the op-root of that layer
        let anchor = relpath.ancestor_at_depth(op_depth).ok_or_else(|| {
            anyhow!(WcError::ResolverFailure(format!(
                "layer at op-depth {} cannot be rooted above `{}`",
                op_depth, relpath
            )))
        })?;
        let moved = self.txn.op_depth_moved_to(anchor, op_depth - 1);
        let reason = match moved {
            Some(_) => ConflictReason::MovedAway,
            None => ConflictReason::Deleted,
        };
        let (old_kind, new_kind, action) = if anchor == relpath {
            (old_kind, new_kind, action)
        } else {
            // widened to the op-root, the incoming change reads as an edit of
            // the anchor
            let kind = self.txn.depth_get_info(anchor, self.dst_op_depth).map(|r| r.kind);
            (kind, kind, ConflictAction::Edit)
        };
        self.mark_tree_conflict(
            anchor,
            reason,
            action,
            old_kind,
            new_kind,
            moved.map(|m| m.src_op_root),
        )?;
        self.conflict_root = Some(anchor);
        Ok(true)
    }

    /// records the tree conflict at its anchor; an equivalent existing
    /// conflict is left alone, an incompatible one is an `ObstructedUpdate`
    pub(super) fn mark_tree_conflict(
        &mut self,
        anchor: WcPath,
        reason: ConflictReason,
        action: ConflictAction,
        old_kind: Option<NodeKind>,
        new_kind: Option<NodeKind>,
        move_src_op_root: Option<WcPath>,
    ) -> WcResult<()> {
        debug!("UpdateMoveCtxt::mark_tree_conflict({}, {}, {})", anchor, reason, action);
        let (old, new) = self.versions_for(anchor, old_kind, new_kind);
        let skel = ConflictSkel::new(self.operation, old, new).with_tree(TreeConflictInfo {
            reason,
            action,
            move_src_op_root,
        });
        if self.txn.mark_conflict(anchor, skel)? {
            let kind = new_kind.or(old_kind).unwrap_or(NodeKind::Dir);
            self.txn.notify_add(
                Notification::new(anchor, NotifyAction::TreeConflict, kind).with_revisions(
                    self.old_version.revision,
                    self.new_version.revision,
                ),
            );
        }
        Ok(())
    }

    /// composes the conflict's repository versions for a path below the
    /// destination op-root
    fn versions_for(
        &self,
        path: WcPath,
        old_kind: Option<NodeKind>,
        new_kind: Option<NodeKind>,
    ) -> (NodeVersion, NodeVersion) {
        let subpath = path.skip_ancestor(self.dst_op_root).unwrap_or(WcPath::EMPTY);
        (
            self.old_version.subversion(subpath, old_kind),
            self.new_version.subversion(subpath, new_kind),
        )
    }

    fn notify(
        &mut self,
        path: WcPath,
        action: NotifyAction,
        kind: NodeKind,
        content_state: NotifyState,
        prop_state: NotifyState,
    ) {
        self.txn.notify_add(
            Notification::new(path, action, kind)
                .with_states(content_state, prop_state)
                .with_revisions(self.old_version.revision, self.new_version.revision),
        );
    }
}

fn require_checksum(row: &NodeRow, path: WcPath) -> WcResult<Checksum> {
    row.checksum.ok_or_else(|| {
        anyhow!(WcError::ResolverFailure(format!("file row for `{}` has no checksum", path)))
    })
}

fn removal_item(path: WcPath, kind: NodeKind) -> WorkItem {
    match kind {
        NodeKind::Dir => WorkItem::DirRemove { path },
        NodeKind::File | NodeKind::Symlink => WorkItem::FileRemove { path },
    }
}
