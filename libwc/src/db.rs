//! the persisted node model and its transactional surface
//!
//! A node may exist at several op-depths at once; each op-depth is one layer
//! of pending local operation and the op-depth equals the path depth of the
//! op-root that introduced the layer. The relational store itself is an
//! external collaborator; this module plays its part with ordered in-process
//! tables that honor the same contract: subtree scans over a
//! `(local_relpath, op_depth)` key, atomic commit/rollback, and spool tables
//! that become visible to the outside world only on commit.

mod moves;
mod node;

pub use moves::{Children, MoveInfo, MoveRecord, Moves};
pub use node::{ActualRow, NodeKind, NodeRow, Presence, Revision};

use crate::checksum::Checksum;
use crate::conflict::ConflictSkel;
use crate::error::{WcError, WcResult};
use crate::notify::Notification;
use crate::path::WcPath;
use crate::props::Props;
use crate::workqueue::WorkItem;
use itertools::Either;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

type Layers = BTreeMap<usize, NodeRow>;

#[derive(Debug, Default, Clone)]
struct Tables {
    nodes: BTreeMap<WcPath, Layers>,
    actual: BTreeMap<WcPath, ActualRow>,
}

impl Tables {
    fn node(&self, path: WcPath, op_depth: usize) -> Option<&NodeRow> {
        self.nodes.get(path.as_str())?.get(&op_depth)
    }

    fn layers(&self, path: WcPath) -> Option<&Layers> {
        self.nodes.get(path.as_str())
    }

    fn insert_node(&mut self, path: WcPath, op_depth: usize, row: NodeRow) {
        self.nodes.entry(path).or_default().insert(op_depth, row);
    }

    fn remove_node(&mut self, path: WcPath, op_depth: usize) -> Option<NodeRow> {
        let layers = self.nodes.get_mut(path.as_str())?;
        let row = layers.remove(&op_depth);
        if layers.is_empty() {
            self.nodes.remove(path.as_str());
        }
        row
    }

    /// all rows of `root` and its descendants, in path order
    fn subtree(&self, root: WcPath) -> impl Iterator<Item = (WcPath, &Layers)> + '_ {
        let this = self.nodes.get_key_value(root.as_str()).map(|(&k, v)| (k, v));
        let descendants = if root.is_empty() {
            Either::Left(
                self.nodes
                    .range::<str, _>((Bound::Excluded(""), Bound::Unbounded))
                    .map(|(&k, v)| (k, v)),
            )
        } else {
            // `'0' == '/' + 1`, so this range is exactly the descendants
            let lo = format!("{}/", root);
            let hi = format!("{}0", root);
            Either::Right(
                self.nodes
                    .range::<str, _>((Bound::Included(lo.as_str()), Bound::Excluded(hi.as_str())))
                    .map(|(&k, v)| (k, v)),
            )
        };
        this.into_iter().chain(descendants)
    }

    /// rows of the subtree at exactly one op-depth, in path order
    fn subtree_at(&self, root: WcPath, op_depth: usize) -> Vec<(WcPath, NodeRow)> {
        self.subtree(root)
            .filter_map(|(path, layers)| Some((path, layers.get(&op_depth)?.clone())))
            .collect()
    }

    fn actual(&self, path: WcPath) -> Option<&ActualRow> {
        self.actual.get(path.as_str())
    }

    fn actual_subtree(&self, root: WcPath) -> impl Iterator<Item = (WcPath, &ActualRow)> + '_ {
        let this = self.actual.get_key_value(root.as_str()).map(|(&k, v)| (k, v));
        let descendants = if root.is_empty() {
            Either::Left(
                self.actual
                    .range::<str, _>((Bound::Excluded(""), Bound::Unbounded))
                    .map(|(&k, v)| (k, v)),
            )
        } else {
            let lo = format!("{}/", root);
            let hi = format!("{}0", root);
            Either::Right(
                self.actual
                    .range::<str, _>((Bound::Included(lo.as_str()), Bound::Excluded(hi.as_str())))
                    .map(|(&k, v)| (k, v)),
            )
        };
        this.into_iter().chain(descendants)
    }
}

/// the working copy node store
pub struct WcDb {
    root: PathBuf,
    tables: Tables,
    /// op-roots currently under an exclusive write-lock
    locks: FxHashSet<WcPath>,
    /// committed spools, drained by the external executor and sink
    work_queue: Vec<WorkItem>,
    notifications: Vec<Notification>,
}

impl WcDb {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tables: Tables::default(),
            locks: FxHashSet::default(),
            work_queue: vec![],
            notifications: vec![],
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// absolute on-disk path of a node
    pub fn abspath(&self, path: WcPath) -> PathBuf {
        path.below(&self.root)
    }

    pub fn obtain_write_lock(&mut self, op_root: WcPath) {
        debug!("WcDb::obtain_write_lock({})", op_root);
        self.locks.insert(op_root);
    }

    pub fn release_write_lock(&mut self, op_root: WcPath) {
        debug!("WcDb::release_write_lock({})", op_root);
        self.locks.remove(op_root.as_str());
    }

    pub fn verify_write_lock(&self, path: WcPath) -> WcResult<()> {
        verify_write_lock(&self.locks, path)
    }

    /// runs `f` inside a transaction: on `Ok` the table mutations are kept
    /// and the spooled work items and notifications become visible; on `Err`
    /// everything `f` did vanishes
    pub fn with_txn_mut<R>(&mut self, f: impl FnOnce(&mut Txn<'_>) -> WcResult<R>) -> WcResult<R> {
        let snapshot = self.tables.clone();
        let (result, spooled_wq, spooled_notifications) = {
            let mut txn = Txn {
                tables: &mut self.tables,
                locks: &self.locks,
                root: &self.root,
                work_queue: vec![],
                notifications: vec![],
            };
            let result = f(&mut txn);
            (result, txn.work_queue, txn.notifications)
        };
        match result {
            Ok(r) => {
                self.work_queue.extend(spooled_wq);
                self.notifications.extend(spooled_notifications);
                Ok(r)
            }
            Err(err) => {
                self.tables = snapshot;
                Err(err)
            }
        }
    }

    // read-only surface; reads are allowed outside a transaction

    pub fn node(&self, path: WcPath, op_depth: usize) -> Option<NodeRow> {
        self.tables.node(path, op_depth).cloned()
    }

    pub fn read_conflict(&self, path: WcPath) -> Option<ConflictSkel> {
        self.tables.actual(path)?.conflict.clone()
    }

    pub fn actual_props(&self, path: WcPath) -> Option<Props> {
        self.tables.actual(path)?.props.clone()
    }

    pub fn op_depth_moved_to(&self, path: WcPath, above_op_depth: usize) -> Option<MoveInfo> {
        op_depth_moved_to(&self.tables, path, above_op_depth)
    }

    /// hands the committed work items to the external executor
    pub fn take_work_queue(&mut self) -> Vec<WorkItem> {
        std::mem::take(&mut self.work_queue)
    }

    /// hands the committed notification records to the notification sink
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn work_queue(&self) -> &[WorkItem] {
        &self.work_queue
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}

fn verify_write_lock(locks: &FxHashSet<WcPath>, path: WcPath) -> WcResult<()> {
    if locks.iter().any(|&lock| lock.is_same_or_ancestor_of(path)) {
        Ok(())
    } else {
        bail!(WcError::NotLocked(path))
    }
}

fn op_depth_moved_to(tables: &Tables, path: WcPath, above_op_depth: usize) -> Option<MoveInfo> {
    // the lowest op-depth strictly above the given one wins: that is the
    // outermost move still relevant to the caller
    for op_depth in above_op_depth + 1..=path.depth() {
        let op_root = path.ancestor_at_depth(op_depth).unwrap();
        if let Some(dst) = tables.node(op_root, op_depth).and_then(|row| row.moved_to) {
            let remainder = path.skip_ancestor(op_root).unwrap();
            return Some(MoveInfo {
                moved_to: dst.join(remainder),
                src_op_root: op_root,
                dst_op_root: dst,
            });
        }
    }
    None
}

/// one open transaction over the node store
///
/// every mutating entry point verifies the write-lock before touching a row;
/// work items and notifications spooled here surface only if the transaction
/// commits
pub struct Txn<'db> {
    tables: &'db mut Tables,
    locks: &'db FxHashSet<WcPath>,
    root: &'db Path,
    work_queue: Vec<WorkItem>,
    notifications: Vec<Notification>,
}

impl Txn<'_> {
    pub fn verify_write_lock(&self, path: WcPath) -> WcResult<()> {
        verify_write_lock(self.locks, path)
    }

    pub fn abspath(&self, path: WcPath) -> PathBuf {
        path.below(self.root)
    }

    // reads

    /// the row of `path` at exactly `op_depth`; `None` stands in for the
    /// store's not-found signal
    pub fn depth_get_info(&self, path: WcPath, op_depth: usize) -> Option<NodeRow> {
        self.tables.node(path, op_depth).cloned()
    }

    /// the currently visible layer: the highest op-depth row
    pub fn visible_node(&self, path: WcPath) -> Option<(usize, NodeRow)> {
        let (&op_depth, row) = self.tables.layers(path)?.iter().next_back()?;
        Some((op_depth, row.clone()))
    }

    /// the lowest working layer strictly above `op_depth` covering `path`
    pub fn lowest_layer_above(&self, path: WcPath, op_depth: usize) -> Option<(usize, NodeRow)> {
        let (&d, row) =
            self.tables.layers(path)?.range((Bound::Excluded(op_depth), Bound::Unbounded)).next()?;
        Some((d, row.clone()))
    }

    pub fn highest_layer_below(&self, path: WcPath, op_depth: usize) -> Option<(usize, NodeRow)> {
        let (&d, row) = self.tables.layers(path)?.range(..op_depth).next_back()?;
        Some((d, row.clone()))
    }

    /// a shadowed destination node takes its visible state from a layer above
    /// the destination op-depth; the resolver must not overwrite its content
    pub fn is_shadowed(&self, path: WcPath, op_depth: usize) -> bool {
        self.lowest_layer_above(path, op_depth).is_some()
    }

    /// sorted base names of the children of `path` with a row at `op_depth`
    pub fn children(&self, path: WcPath, op_depth: usize) -> Children {
        let child_depth = path.depth() + 1;
        let names: moves::ChildNames = self
            .tables
            .subtree(path)
            .filter(|(p, layers)| p.depth() == child_depth && layers.contains_key(&op_depth))
            .map(|(p, _)| p.file_name())
            .collect();
        Children::new(names)
    }

    /// rows of the subtree at exactly one op-depth, in path order
    pub fn subtree_at(&self, root: WcPath, op_depth: usize) -> Vec<(WcPath, NodeRow)> {
        self.tables.subtree_at(root, op_depth)
    }

    /// distinct op-depths strictly above `op_depth` present in the subtree
    pub fn op_depths_above(&self, root: WcPath, op_depth: usize) -> Vec<usize> {
        let mut depths: Vec<usize> = self
            .tables
            .subtree(root)
            .flat_map(|(_, layers)| {
                layers.range((Bound::Excluded(op_depth), Bound::Unbounded)).map(|(&d, _)| d)
            })
            .collect();
        depths.sort_unstable();
        depths.dedup();
        depths
    }

    pub fn read_conflict(&self, path: WcPath) -> Option<ConflictSkel> {
        self.tables.actual(path)?.conflict.clone()
    }

    pub fn actual_props(&self, path: WcPath) -> Option<Props> {
        self.tables.actual(path)?.props.clone()
    }

    pub fn op_depth_moved_to(&self, path: WcPath, above_op_depth: usize) -> Option<MoveInfo> {
        op_depth_moved_to(self.tables, path, above_op_depth)
    }

    /// moves recorded on op-root rows within the subtree, at op-depths
    /// strictly above the given one
    pub fn moves_under(&self, root: WcPath, above_op_depth: usize) -> Moves {
        let records = self
            .tables
            .subtree(root)
            .flat_map(|(path, layers)| {
                layers
                    .range((Bound::Excluded(above_op_depth), Bound::Unbounded))
                    .filter(move |&(&d, row)| d == path.depth() && row.moved_to.is_some())
                    .map(move |(&d, row)| MoveRecord {
                        src_op_root: path,
                        dst_op_root: row.moved_to.unwrap(),
                        op_depth: d,
                    })
            })
            .collect();
        Moves::new(records)
    }

    // writes

    pub fn insert_node(&mut self, path: WcPath, op_depth: usize, row: NodeRow) -> WcResult<()> {
        self.verify_write_lock(path)?;
        trace!("Txn::insert_node({}, {}, presence: {:?})", path, op_depth, row.presence);
        self.tables.insert_node(path, op_depth, row);
        Ok(())
    }

    pub fn remove_node(&mut self, path: WcPath, op_depth: usize) -> WcResult<Option<NodeRow>> {
        self.verify_write_lock(path)?;
        trace!("Txn::remove_node({}, {})", path, op_depth);
        Ok(self.tables.remove_node(path, op_depth))
    }

    /// records a conflict skeleton; a second equivalent skeleton is a no-op,
    /// an incompatible tree payload is an `ObstructedUpdate`
    ///
    /// returns whether the recorded conflict changed
    pub fn mark_conflict(&mut self, path: WcPath, skel: ConflictSkel) -> WcResult<bool> {
        self.verify_write_lock(path)?;
        debug!("Txn::mark_conflict({})", path);
        let actual = self.tables.actual.entry(path).or_default();
        match &mut actual.conflict {
            slot @ None => {
                *slot = Some(skel);
                Ok(true)
            }
            Some(existing) if *existing == skel => Ok(false),
            Some(existing) => {
                if !existing.tree_compatible_with(&skel) {
                    bail!(WcError::ObstructedUpdate(path));
                }
                existing.absorb(skel);
                Ok(true)
            }
        }
    }

    /// explicit resolve: forgets the recorded conflict
    pub fn clear_conflict(&mut self, path: WcPath) -> WcResult<bool> {
        self.verify_write_lock(path)?;
        let Some(actual) = self.tables.actual.get_mut(path.as_str()) else { return Ok(false) };
        let had = actual.conflict.take().is_some();
        if actual.is_empty() {
            self.tables.actual.remove(path.as_str());
        }
        Ok(had)
    }

    /// writes actual (working) props; `None` or props equal to the visible
    /// layer clear the override instead
    pub fn set_props(&mut self, path: WcPath, props: Option<Props>) -> WcResult<()> {
        self.verify_write_lock(path)?;
        let props = props.filter(|p| match self.visible_node(path) {
            Some((_, row)) => row.props != *p,
            None => true,
        });
        match props {
            Some(props) => {
                self.tables.actual.entry(path).or_default().props = Some(props);
            }
            None => {
                if let Some(actual) = self.tables.actual.get_mut(path.as_str()) {
                    actual.props = None;
                    if actual.is_empty() {
                        self.tables.actual.remove(path.as_str());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn wq_add(&mut self, item: WorkItem) {
        trace!("Txn::wq_add({:?})", item);
        self.work_queue.push(item);
    }

    pub fn wq_extend(&mut self, items: impl IntoIterator<Item = WorkItem>) {
        self.work_queue.extend(items);
    }

    pub fn notify_add(&mut self, record: Notification) {
        trace!("Txn::notify_add({})", record);
        self.notifications.push(record);
    }

    /// when a node is added above a lower deleted layer, the delete must grow
    /// a base-deleted shadow row covering the new path
    pub fn extend_parent_delete(
        &mut self,
        path: WcPath,
        kind: NodeKind,
        op_depth: usize,
    ) -> WcResult<()> {
        self.verify_write_lock(path)?;
        let Some(parent) = path.parent() else { return Ok(()) };
        let Some((parent_op_depth, parent_row)) = self.lowest_layer_above(parent, op_depth) else {
            return Ok(());
        };
        if parent_row.presence == Presence::BaseDeleted
            && self.tables.node(path, parent_op_depth).is_none()
        {
            trace!("Txn::extend_parent_delete({}, {})", path, parent_op_depth);
            self.tables.insert_node(path, parent_op_depth, NodeRow::base_deleted(kind));
        }
        Ok(())
    }

    /// drops the base-deleted shadow row left behind when the node it covered
    /// goes away
    pub fn retract_parent_delete(&mut self, path: WcPath, op_depth: usize) -> WcResult<()> {
        self.verify_write_lock(path)?;
        if let Some((d, row)) = self.lowest_layer_above(path, op_depth) {
            if row.presence == Presence::BaseDeleted {
                trace!("Txn::retract_parent_delete({}, {})", path, d);
                self.tables.remove_node(path, d);
            }
        }
        Ok(())
    }

    // layer rewrite primitives, used only by the layer replacer and the bump
    // engine

    /// copies the source row into the destination layer; an existing
    /// destination row's move linkage survives the overwrite
    pub fn copy_node_move(
        &mut self,
        src: WcPath,
        src_op_depth: usize,
        dst: WcPath,
        dst_op_depth: usize,
    ) -> WcResult<()> {
        self.verify_write_lock(dst)?;
        let Some(src_row) = self.tables.node(src, src_op_depth).cloned() else {
            bail!(WcError::ResolverFailure(format!(
                "copy_node_move: no source row at ({}, {})",
                src, src_op_depth
            )));
        };
        let existing_moved_to =
            self.tables.node(dst, dst_op_depth).and_then(|row| row.moved_to);
        let row = NodeRow {
            moved_to: existing_moved_to,
            moved_here: dst.depth() == dst_op_depth,
            ..src_row
        };
        self.tables.insert_node(dst, dst_op_depth, row);
        Ok(())
    }

    /// removes the row when no lower layer would be uncovered by its absence;
    /// returns whether it was removed
    pub fn delete_no_lower_layer(&mut self, path: WcPath, op_depth: usize) -> WcResult<bool> {
        self.verify_write_lock(path)?;
        if self.highest_layer_below(path, op_depth).is_some() {
            return Ok(false);
        }
        self.tables.remove_node(path, op_depth);
        Ok(true)
    }

    /// turns the row into a pure base-deleted shadow of the layer below
    pub fn replace_with_base_deleted(&mut self, path: WcPath, op_depth: usize) -> WcResult<()> {
        self.verify_write_lock(path)?;
        let Some(row) = self.tables.node(path, op_depth) else {
            bail!(WcError::ResolverFailure(format!(
                "replace_with_base_deleted: no row at ({}, {})",
                path, op_depth
            )));
        };
        let replacement = NodeRow { moved_to: row.moved_to, ..NodeRow::base_deleted(row.kind) };
        self.tables.insert_node(path, op_depth, replacement);
        Ok(())
    }

    /// removes every row of the subtree at exactly `op_depth`
    pub fn delete_working_op_depth(&mut self, root: WcPath, op_depth: usize) -> WcResult<()> {
        self.verify_write_lock(root)?;
        trace!("Txn::delete_working_op_depth({}, {})", root, op_depth);
        let paths: Vec<WcPath> = self
            .tables
            .subtree(root)
            .filter(|(_, layers)| layers.contains_key(&op_depth))
            .map(|(path, _)| path)
            .collect();
        for path in paths {
            self.tables.remove_node(path, op_depth);
        }
        Ok(())
    }

    /// reparents the subtree's layer from one op-depth to another
    pub fn update_op_depth_recursive(
        &mut self,
        root: WcPath,
        from_op_depth: usize,
        to_op_depth: usize,
    ) -> WcResult<()> {
        self.verify_write_lock(root)?;
        trace!("Txn::update_op_depth_recursive({}, {} -> {})", root, from_op_depth, to_op_depth);
        let rows = self.tables.subtree_at(root, from_op_depth);
        for (path, row) in rows {
            self.tables.remove_node(path, from_op_depth);
            self.tables.insert_node(path, to_op_depth, row);
        }
        Ok(())
    }

    // move linkage

    pub fn clear_moved_to(&mut self, src_op_root: WcPath, op_depth: usize) -> WcResult<()> {
        self.verify_write_lock(src_op_root)?;
        if let Some(layers) = self.tables.nodes.get_mut(src_op_root.as_str()) {
            if let Some(row) = layers.get_mut(&op_depth) {
                row.moved_to = None;
            }
        }
        Ok(())
    }

    pub fn clear_moved_here_recursive(&mut self, dst_root: WcPath, op_depth: usize) -> WcResult<()> {
        self.verify_write_lock(dst_root)?;
        let paths: Vec<WcPath> = self
            .tables
            .subtree(dst_root)
            .filter(|(_, layers)| layers.contains_key(&op_depth))
            .map(|(path, _)| path)
            .collect();
        for path in paths {
            if let Some(row) =
                self.tables.nodes.get_mut(path.as_str()).and_then(|layers| layers.get_mut(&op_depth))
            {
                row.moved_here = false;
            }
        }
        Ok(())
    }

    /// classifies local changes under `root` relative to its layer at
    /// `op_depth`: db-recorded operations above the layer plus on-disk drift
    /// of working files against their pristine checksums
    ///
    /// returns `(is_modified, is_all_deletes)`
    pub fn has_local_mods(&self, root: WcPath, op_depth: usize) -> WcResult<(bool, bool)> {
        let mut modified = false;
        let mut all_deletes = true;

        for (_, layers) in self.tables.subtree(root) {
            for (_, row) in layers.range((Bound::Excluded(op_depth), Bound::Unbounded)) {
                modified = true;
                if !row.presence.is_deletion() {
                    all_deletes = false;
                }
            }
        }

        for (_, actual) in self.tables.actual_subtree(root) {
            if actual.props.is_some() {
                modified = true;
                all_deletes = false;
            }
        }

        for (path, row) in self.tables.subtree_at(root, op_depth) {
            if !row.is_visible() {
                continue;
            }
            let abspath = self.abspath(path);
            match NodeKind::of_disk(&abspath) {
                None => {
                    // missing on disk counts as a local delete
                    modified = true;
                }
                Some(disk_kind) if disk_kind != row.kind => {
                    // an obstruction of the wrong kind is an edit, not a delete
                    modified = true;
                    all_deletes = false;
                }
                Some(NodeKind::File) => {
                    if let Some(checksum) = row.checksum {
                        if Checksum::of_file(&abspath)? != checksum {
                            modified = true;
                            all_deletes = false;
                        }
                    }
                }
                Some(_) => {}
            }
        }

        Ok((modified, modified && all_deletes))
    }
}
