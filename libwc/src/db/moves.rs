use crate::error::WcGenericError;
use crate::path::WcPath;
use fallible_iterator::FallibleIterator;
use smallvec::SmallVec;

/// child-name buffer; most directories are small
pub(crate) type ChildNames = SmallVec<[&'static str; 8]>;

/// the move covering a queried path, as found by `op_depth_moved_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveInfo {
    /// destination of the queried path itself, mapped through the move
    pub moved_to: WcPath,
    /// op-root of the move source; the delete layer is rooted here and its
    /// op-depth is `src_op_root.depth()`
    pub src_op_root: WcPath,
    /// the move destination op-root
    pub dst_op_root: WcPath,
}

impl MoveInfo {
    pub fn delete_op_depth(&self) -> usize {
        self.src_op_root.depth()
    }
}

/// one recorded move, as enumerated from the node table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub src_op_root: WcPath,
    pub dst_op_root: WcPath,
    /// op-depth of the delete layer at the source
    pub op_depth: usize,
}

// The walks over the move list and over child names are pull-based iterators
// that own their row snapshot, the way a prepared statement owns its cursor;
// dropping the iterator releases the snapshot.

pub struct Moves {
    records: std::vec::IntoIter<MoveRecord>,
}

impl Moves {
    pub(crate) fn new(records: Vec<MoveRecord>) -> Self {
        Self { records: records.into_iter() }
    }
}

impl FallibleIterator for Moves {
    type Error = WcGenericError;
    type Item = MoveRecord;

    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.records.next())
    }
}

/// sorted base names of one directory level at one op-depth
pub struct Children {
    names: smallvec::IntoIter<[&'static str; 8]>,
}

impl Children {
    pub(crate) fn new(names: ChildNames) -> Self {
        Self { names: names.into_iter() }
    }
}

impl FallibleIterator for Children {
    type Error = WcGenericError;
    type Item = &'static str;

    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self.names.next())
    }
}
