//! the tree walk driving the editor: source and destination layers visited
//! in lockstep, depth-first, children in lexicographic order

use super::UpdateMoveCtxt;
use crate::db::NodeKind;
use crate::error::{WcError, WcResult};
use crate::path::WcPath;
use crate::props::prop_diffs;
use fallible_iterator::FallibleIterator;
use std::cmp::Ordering;

impl UpdateMoveCtxt<'_, '_> {
    pub(crate) fn drive(&mut self) -> WcResult<()> {
        debug!(
            "UpdateMoveCtxt::drive({} @ {} -> {} @ {})",
            self.src_op_root, self.src_op_depth, self.dst_op_root, self.dst_op_depth
        );
        let shadowed = self.txn.is_shadowed(self.dst_op_root, self.dst_op_depth);
        self.walk(self.src_op_root, self.dst_op_root, shadowed)
    }

    fn walk(&mut self, src: WcPath, dst: WcPath, shadowed: bool) -> WcResult<()> {
        trace!("UpdateMoveCtxt::walk({} -> {}, shadowed: {})", src, dst, shadowed);

        let src_row = self.txn.depth_get_info(src, self.src_op_depth).filter(|r| r.is_visible());
        let dst_row = self.txn.depth_get_info(dst, self.dst_op_depth).filter(|r| r.is_visible());
        let src_kind = src_row.as_ref().map(|r| r.kind);
        let dst_kind = dst_row.as_ref().map(|r| r.kind);

        if let Some(d) = &dst_row {
            if src_kind != dst_kind {
                // the destination node vanishes: either a pure delete or the
                // delete half of a kind change
                self.delete(dst, shadowed, d)?;
                self.retract_dst_layer(dst)?;
            }
        }

        match (&src_row, &dst_row) {
            (Some(s), _) if src_kind != dst_kind => {
                if shadowed {
                    // the add lands under a local delete; grow its shadow
                    // instead of materializing anything
                    self.txn.extend_parent_delete(dst, s.kind, self.dst_op_depth)?;
                }
                match s.kind {
                    NodeKind::Dir => self.add_directory(dst, shadowed, dst_kind)?,
                    NodeKind::File | NodeKind::Symlink => self.add_file(dst, shadowed, dst_kind)?,
                }
            }
            (Some(s), Some(d)) => {
                if s.kind.is_dir() {
                    if !prop_diffs(&d.props, &s.props).is_empty() {
                        self.alter_directory(dst, shadowed, d, s)?;
                    }
                } else if s.checksum != d.checksum || s.props != d.props {
                    self.alter_file(dst, shadowed, d, s)?;
                }
            }
            _ => {}
        }

        // merge-walk the children present on either side
        let src_children: Vec<&'static str> = if src_kind == Some(NodeKind::Dir) {
            self.txn.children(src, self.src_op_depth).collect()?
        } else {
            vec![]
        };
        let dst_children: Vec<&'static str> = if dst_kind == Some(NodeKind::Dir) {
            self.txn.children(dst, self.dst_op_depth).collect()?
        } else {
            vec![]
        };

        let mut src_iter = src_children.into_iter().peekable();
        let mut dst_iter = dst_children.into_iter().peekable();
        loop {
            if self.cancel.cancelled() {
                bail!(WcError::Cancelled);
            }
            let name = match (src_iter.peek(), dst_iter.peek()) {
                (None, None) => break,
                (Some(&name), None) => {
                    src_iter.next();
                    name
                }
                (None, Some(&name)) => {
                    dst_iter.next();
                    name
                }
                (Some(&s), Some(&d)) => match s.cmp(d) {
                    Ordering::Less => {
                        src_iter.next();
                        s
                    }
                    Ordering::Equal => {
                        src_iter.next();
                        dst_iter.next();
                        s
                    }
                    Ordering::Greater => {
                        dst_iter.next();
                        d
                    }
                },
            };
            let child_dst = dst.join(name);
            let child_shadowed = shadowed || self.txn.is_shadowed(child_dst, self.dst_op_depth);
            self.walk(src.join(name), child_dst, child_shadowed)?;
        }
        Ok(())
    }

    /// retracts the destination layer for the whole subtree at `dst`: rows
    /// with nothing below them disappear, rows still covering a lower layer
    /// degrade to base-deleted shadows
    fn retract_dst_layer(&mut self, dst: WcPath) -> WcResult<()> {
        for (path, _) in self.txn.subtree_at(dst, self.dst_op_depth) {
            if !self.txn.delete_no_lower_layer(path, self.dst_op_depth)? {
                self.txn.replace_with_base_deleted(path, self.dst_op_depth)?;
            }
        }
        Ok(())
    }
}
